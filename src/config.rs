//! Typed configuration.
//!
//! The chat client is configured from CLI flags (with env fallbacks handled
//! by clap). The service reads everything from environment variables; `main`
//! loads `.env` first via `dotenvy`.

use std::path::PathBuf;

use crate::error::ErrorCode;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_DASHBOARD_ID: i64 = 1;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ALLOW_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_SCHEMA_CONTEXT_PATH: &str = "schema_context.txt";
pub const DEFAULT_SCHEMA_NAME: &str = "emsp";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: String },

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: String, value: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

/// Where the chat client sends its calls and which dashboard saves land on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub dashboard_id: i64,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            dashboard_id: DEFAULT_DASHBOARD_ID,
            timeouts: Timeouts::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

// =============================================================================
// SERVICE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetabaseConfig {
    pub url: String,
    pub session: String,
    pub database_id: i64,
    /// Also attach saved cards to the requested dashboard.
    pub attach_to_dashboard: bool,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub cors_allow_origin: String,
    pub schema_context_path: PathBuf,
    /// Schema every generated table name is prefixed with.
    pub schema_name: String,
    pub metabase: MetabaseConfig,
}

impl ServiceConfig {
    /// Build service config from environment variables.
    ///
    /// Required: `METABASE_URL`, `METABASE_SESSION`, `METABASE_DB_ID`.
    ///
    /// Optional:
    /// - `PORT`: default 8000
    /// - `CORS_ALLOW_ORIGIN`: default `http://localhost:8080`
    /// - `SCHEMA_CONTEXT_PATH`: default `schema_context.txt`
    /// - `SCHEMA_NAME`: default `emsp`
    /// - `METABASE_ATTACH_TO_DASHBOARD`: default false
    /// - `METABASE_REQUEST_TIMEOUT_SECS` / `METABASE_CONNECT_TIMEOUT_SECS`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env_parse_strict("PORT")?.unwrap_or(DEFAULT_PORT);
        let cors_allow_origin =
            std::env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| DEFAULT_CORS_ALLOW_ORIGIN.to_string());
        let schema_context_path = std::env::var("SCHEMA_CONTEXT_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_SCHEMA_CONTEXT_PATH), PathBuf::from);
        let schema_name = std::env::var("SCHEMA_NAME").unwrap_or_else(|_| DEFAULT_SCHEMA_NAME.to_string());

        let metabase = MetabaseConfig {
            url: env_required("METABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            session: env_required("METABASE_SESSION")?,
            database_id: env_parse_strict("METABASE_DB_ID")?
                .ok_or_else(|| ConfigError::Missing { var: "METABASE_DB_ID".into() })?,
            attach_to_dashboard: env_bool("METABASE_ATTACH_TO_DASHBOARD").unwrap_or(false),
            timeouts: Timeouts {
                request_secs: env_parse("METABASE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("METABASE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        };

        Ok(Self { port, cors_allow_origin, schema_context_path, schema_name, metabase })
    }
}

// =============================================================================
// ENV HELPERS
// =============================================================================

pub(crate) fn env_required(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing { var: key.into() }),
    }
}

/// Parse `key` if set; a set-but-invalid value is an error.
pub(crate) fn env_parse_strict<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid { var: key.into(), value: raw })
}

/// Parse `key` if set and valid, otherwise `default`.
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
