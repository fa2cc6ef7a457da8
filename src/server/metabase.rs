//! Metabase REST client: native queries, card creation, dashboard attach.
//!
//! Every call carries the `X-Metabase-Session` header. Response parsing is
//! split into pure functions so it can be tested without a server.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::api::SavedCard;
use crate::chat::QueryResults;
use crate::config::MetabaseConfig;
use crate::error::ErrorCode;

const SESSION_HEADER: &str = "X-Metabase-Session";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MetabaseError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    /// Metabase accepted the query but reported it as failed.
    #[error("{0}")]
    Query(String),

    #[error("response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for MetabaseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_METABASE_REQUEST",
            Self::Status { .. } => "E_METABASE_STATUS",
            Self::Query(_) => "E_METABASE_QUERY",
            Self::Parse(_) => "E_METABASE_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// The Metabase operations the service needs. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Metabase: Send + Sync {
    /// Run `sql` as an ad-hoc native query.
    async fn run_native(&self, sql: &str) -> Result<QueryResults, MetabaseError>;

    /// Save `sql` as a table-display question named `name`.
    async fn create_card(&self, name: &str, sql: &str) -> Result<SavedCard, MetabaseError>;

    /// Place an existing card on a dashboard.
    async fn add_card_to_dashboard(&self, dashboard_id: i64, card_id: i64) -> Result<(), MetabaseError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct MetabaseClient {
    http: reqwest::Client,
    base_url: String,
    session: String,
    database_id: i64,
}

impl MetabaseClient {
    /// # Errors
    ///
    /// Returns [`MetabaseError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &MetabaseConfig) -> Result<Self, MetabaseError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| MetabaseError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            session: config.session.clone(),
            database_id: config.database_id,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<String, MetabaseError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(SESSION_HEADER, &self.session)
            .json(body)
            .send()
            .await
            .map_err(|e| MetabaseError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MetabaseError::Request(e.to_string()))?;

        // `/api/dataset` answers 202 Accepted on success.
        if !status.is_success() {
            return Err(MetabaseError::Status { status: status.as_u16(), body: text });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl Metabase for MetabaseClient {
    async fn run_native(&self, sql: &str) -> Result<QueryResults, MetabaseError> {
        let body = native_query(self.database_id, sql);
        let text = self.post("/api/dataset", &body).await?;
        let results = parse_dataset_response(&text)?;
        info!(rows = results.row_count(), columns = results.columns.len(), "metabase: dataset ok");
        Ok(results)
    }

    async fn create_card(&self, name: &str, sql: &str) -> Result<SavedCard, MetabaseError> {
        let body = json!({
            "name": name,
            "dataset_query": native_query(self.database_id, sql),
            "display": "table",
            "visualization_settings": {},
        });
        let text = self.post("/api/card", &body).await?;
        let card: SavedCard = serde_json::from_str(&text).map_err(|e| MetabaseError::Parse(e.to_string()))?;
        info!(card_id = ?card.id, name = %card.name, "metabase: card created");
        Ok(card)
    }

    async fn add_card_to_dashboard(&self, dashboard_id: i64, card_id: i64) -> Result<(), MetabaseError> {
        let body = json!({ "cardId": card_id });
        self.post(&format!("/api/dashboard/{dashboard_id}/cards"), &body)
            .await?;
        info!(dashboard_id, card_id, "metabase: card attached");
        Ok(())
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

pub(crate) fn native_query(database_id: i64, sql: &str) -> Value {
    json!({
        "database": database_id,
        "type": "native",
        "native": { "query": sql },
    })
}

#[derive(Deserialize)]
struct DatasetResponse {
    #[serde(default)]
    data: Option<DatasetData>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct DatasetData {
    #[serde(default)]
    cols: Vec<DatasetColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct DatasetColumn {
    name: String,
}

/// Map a `/api/dataset` body to column names and rows.
pub(crate) fn parse_dataset_response(json: &str) -> Result<QueryResults, MetabaseError> {
    let resp: DatasetResponse = serde_json::from_str(json).map_err(|e| MetabaseError::Parse(e.to_string()))?;

    let failed = resp.status.as_deref() == Some("failed");
    let Some(data) = resp.data.filter(|_| !failed) else {
        let reason = match resp.error {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => "query failed without an error message".to_string(),
        };
        return Err(MetabaseError::Query(reason));
    };

    Ok(QueryResults {
        columns: data.cols.into_iter().map(|c| c.name).collect(),
        rows: data.rows,
    })
}

#[cfg(test)]
#[path = "metabase_test.rs"]
mod tests;
