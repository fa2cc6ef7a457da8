//! The three calls a chat session makes, and how their failures read.
//!
//! DESIGN
//! ======
//! [`SqlBackend`] is the seam between the session and the network. The
//! production implementation is [`http::HttpBackend`]; tests swap in mocks.
//! Wire types here are shared with the service in [`crate::server`] so both
//! ends agree on field names.
//!
//! ERROR TEXT
//! ==========
//! A failure is shown to the user as, in order of preference: the `detail`
//! string from the service's failure payload, the transport error
//! description, or a fixed per-workflow default.

pub mod http;

use serde::{Deserialize, Serialize};

use crate::chat::QueryResults;
use crate::error::ErrorCode;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSqlRequest {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSqlResponse {
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSqlRequest {
    pub sql: String,
}

/// Service reply to a run: the query echoed back plus its result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSqlResponse {
    pub sql: String,
    #[serde(flatten)]
    pub results: QueryResults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSqlRequest {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_id: Option<i64>,
}

/// A Metabase question ("card"). Only `name` and `id` are interpreted; every
/// other field Metabase returns is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCard {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSqlResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub card: SavedCard,
}

/// Failure payload. `detail` is the human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The service answered with a non-success status.
    #[error("Request failed with status code {status}")]
    Status { status: u16, detail: Option<String> },

    /// No response was received.
    #[error("{0}")]
    Transport(String),

    /// The success body did not have the expected shape.
    #[error("response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// The structured `detail` from the failure payload, if the service sent one.
    #[must_use]
    pub fn remote_detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail: Some(detail), .. } if !detail.trim().is_empty() => Some(detail.as_str()),
            _ => None,
        }
    }

    /// User-facing failure text: remote detail, then transport description,
    /// then `fallback`.
    #[must_use]
    pub fn describe(&self, fallback: &str) -> String {
        if let Some(detail) = self.remote_detail() {
            return detail.to_owned();
        }
        let description = self.to_string();
        if description.trim().is_empty() { fallback.to_owned() } else { description }
    }
}

impl ErrorCode for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Status { .. } => "E_API_STATUS",
            Self::Transport(_) => "E_API_TRANSPORT",
            Self::Parse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

/// Pull `detail` out of a failure body. Non-string details (validation
/// error lists) are kept as compact JSON.
#[must_use]
pub fn parse_failure_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

/// The remote service a chat session talks to. Enables mocking in tests.
#[async_trait::async_trait]
pub trait SqlBackend: Send + Sync {
    /// Turn a natural-language question into SQL.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the call fails or the reply is malformed.
    async fn generate_sql(&self, request: &GenerateSqlRequest) -> Result<GenerateSqlResponse, ApiError>;

    /// Execute SQL and return its result table.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the call fails or the reply is malformed.
    async fn run_sql(&self, request: &RunSqlRequest) -> Result<QueryResults, ApiError>;

    /// Persist SQL as a named dashboard question.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the call fails or the reply is malformed.
    async fn save_sql(&self, request: &SaveSqlRequest) -> Result<SaveSqlResponse, ApiError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
