use super::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

// LLM_* variables are process globals; tests in this file take turns.
static LLM_ENV: Mutex<()> = Mutex::new(());

fn lock_llm_env() -> MutexGuard<'static, ()> {
    LLM_ENV.lock().unwrap_or_else(PoisonError::into_inner)
}

unsafe fn clear_llm_env() {
    unsafe {
        std::env::remove_var("LLM_PROVIDER");
        std::env::remove_var("LLM_MODEL");
        std::env::remove_var("LLM_API_KEY_ENV");
        std::env::remove_var("LLM_BASE_URL");
        std::env::remove_var("LLM_MAX_TOKENS");
        std::env::remove_var("LLM_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("LLM_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("IRIS_TEST_LLM_KEY");
    }
}

#[test]
fn from_env_defaults_to_anthropic() {
    let _env = lock_llm_env();
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "IRIS_TEST_LLM_KEY");
        std::env::set_var("IRIS_TEST_LLM_KEY", "secret");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::Anthropic);
    assert_eq!(cfg.model, "claude-sonnet-4-5-20250929");
    assert_eq!(cfg.base_url, DEFAULT_ANTHROPIC_BASE_URL);
    assert_eq!(cfg.max_tokens, DEFAULT_LLM_MAX_TOKENS);
    assert_eq!(
        cfg.timeouts,
        Timeouts { request_secs: DEFAULT_LLM_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_LLM_CONNECT_TIMEOUT_SECS }
    );
    assert_eq!(cfg.api_key, "secret");

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_parses_openai_overrides() {
    let _env = lock_llm_env();
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_PROVIDER", "openai");
        std::env::set_var("LLM_API_KEY_ENV", "IRIS_TEST_LLM_KEY");
        std::env::set_var("IRIS_TEST_LLM_KEY", "sk-test");
        std::env::set_var("LLM_BASE_URL", "https://example.test/v1/");
        std::env::set_var("LLM_MAX_TOKENS", "256");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("LLM_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::OpenAi);
    assert_eq!(cfg.model, "gpt-4o");
    assert_eq!(cfg.base_url, "https://example.test/v1");
    assert_eq!(cfg.max_tokens, 256);
    assert_eq!(cfg.timeouts, Timeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_unknown_provider_errors() {
    let _env = lock_llm_env();
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_PROVIDER", "gemini");
        std::env::set_var("LLM_API_KEY_ENV", "IRIS_TEST_LLM_KEY");
        std::env::set_var("IRIS_TEST_LLM_KEY", "secret");
    }

    let err = LlmConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("unknown LLM_PROVIDER"));

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_missing_key_names_variable() {
    let _env = lock_llm_env();
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "IRIS_TEST_LLM_KEY");
    }

    let err = LlmConfig::from_env().unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey { ref var } if var == "IRIS_TEST_LLM_KEY"));

    unsafe { clear_llm_env() };
}
