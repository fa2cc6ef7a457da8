use super::*;
use crate::error::ErrorCode;
use crate::llm::ChatResponse;
use std::sync::Mutex;

struct MockLlm {
    reply: Mutex<Option<Result<ChatResponse, LlmError>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockLlm {
    fn replying(text: &str) -> Self {
        Self {
            reply: Mutex::new(Some(Ok(ChatResponse {
                text: text.to_string(),
                model: "mock".into(),
                stop_reason: "end_turn".into(),
                input_tokens: 1,
                output_tokens: 1,
            }))),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(err: LlmError) -> Self {
        Self { reply: Mutex::new(Some(Err(err))), prompts: Mutex::new(Vec::new()) }
    }
}

#[async_trait::async_trait]
impl LlmChat for MockLlm {
    async fn chat(&self, _max_tokens: u32, system: &str, messages: &[Message]) -> Result<ChatResponse, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), messages[0].content.clone()));
        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(LlmError::EmptyCompletion))
    }
}

#[test]
fn prompt_embeds_schema_rules_and_question() {
    let prompt = build_prompt("Tables:\nsessions(id (uuid))", "emsp", "how many sessions?");
    assert!(prompt.contains("Tables:\nsessions(id (uuid))"));
    assert!(prompt.contains("- Always prefix every table with the schema name: emsp."));
    assert!(prompt.contains("- ONLY use the tables and columns listed in the schema above."));
    assert!(prompt.contains("Question: how many sessions?"));
    assert!(prompt.ends_with("Return only SQL code, nothing else."));
}

#[test]
fn strip_fenced_sql() {
    assert_eq!(strip_code_fences("```sql\nSELECT 1;\n```"), "SELECT 1;");
}

#[test]
fn strip_bare_fences_and_whitespace() {
    assert_eq!(strip_code_fences("\n```\nSELECT *\nFROM t\n```\n"), "SELECT *\nFROM t");
}

#[test]
fn strip_leaves_plain_sql_alone() {
    assert_eq!(strip_code_fences("SELECT 1"), "SELECT 1");
}

#[tokio::test]
async fn generate_returns_cleaned_sql() {
    let llm = MockLlm::replying("```sql\nSELECT count(*) FROM emsp.sessions\n```");
    let sql = generate(&llm, 64, "Tables:", "emsp", "count sessions").await.unwrap();
    assert_eq!(sql, "SELECT count(*) FROM emsp.sessions");

    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].0, SYSTEM);
    assert!(prompts[0].1.contains("Question: count sessions"));
}

#[tokio::test]
async fn generate_empty_reply_errors() {
    let llm = MockLlm::replying("```\n```");
    let err = generate(&llm, 64, "", "emsp", "q").await.unwrap_err();
    assert!(matches!(err, LlmError::EmptyCompletion));
}

#[tokio::test]
async fn generate_propagates_llm_error() {
    let llm = MockLlm::failing(LlmError::ApiResponse { status: 529, body: "overloaded".into() });
    let err = generate(&llm, 64, "", "emsp", "q").await.unwrap_err();
    assert!(err.retryable());
}
