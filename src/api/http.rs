//! `reqwest` implementation of [`SqlBackend`].
//!
//! Thin JSON-over-HTTP wrapper. Non-2xx replies become
//! [`ApiError::Status`] carrying the `detail` field of the body, if any.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    ApiError, GenerateSqlRequest, GenerateSqlResponse, RunSqlRequest, SaveSqlRequest, SaveSqlResponse, SqlBackend,
    parse_failure_detail,
};
use crate::chat::QueryResults;
use crate::config::ClientConfig;

pub const GENERATE_SQL_PATH: &str = "/generate-sql";
pub const RUN_SQL_PATH: &str = "/run-sql";
pub const SAVE_SQL_PATH: &str = "/save-sql";

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.api_url.trim_end_matches('/').to_string() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!(%url, status = status.as_u16(), body_len = text.len(), "api: response");

        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), detail: parse_failure_detail(&text) });
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl SqlBackend for HttpBackend {
    async fn generate_sql(&self, request: &GenerateSqlRequest) -> Result<GenerateSqlResponse, ApiError> {
        self.post_json(GENERATE_SQL_PATH, request).await
    }

    async fn run_sql(&self, request: &RunSqlRequest) -> Result<QueryResults, ApiError> {
        self.post_json(RUN_SQL_PATH, request).await
    }

    async fn save_sql(&self, request: &SaveSqlRequest) -> Result<SaveSqlResponse, ApiError> {
        self.post_json(SAVE_SQL_PATH, request).await
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
