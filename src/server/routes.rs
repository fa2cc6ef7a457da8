//! Route handlers for the SQL service.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use super::ServiceState;
use super::metabase::MetabaseError;
use super::sql_gen;
use crate::api::{
    ErrorBody, GenerateSqlRequest, GenerateSqlResponse, RunSqlRequest, RunSqlResponse, SaveSqlRequest,
    SaveSqlResponse,
};
use crate::error::ErrorCode;
use crate::llm::LlmError;

pub const DEFAULT_CARD_NAME: &str = "Generated Question";
pub const SAVED_MESSAGE: &str = "SQL saved as Metabase Question";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    #[error("schema context unavailable: {0}")]
    SchemaContext(#[source] std::io::Error),

    #[error("SQL generation failed: {0}")]
    Generate(#[source] LlmError),

    #[error("Metabase query failed: {0}")]
    Run(#[source] MetabaseError),

    #[error("Failed to save question: {0}")]
    Save(#[source] MetabaseError),

    #[error("Card saved but failed to attach to dashboard: {0}")]
    Attach(#[source] MetabaseError),

    #[error("Card saved without an id; cannot attach to dashboard {0}")]
    MissingCardId(i64),
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            Self::EmptyInput(_) => StatusCode::BAD_REQUEST,
            Self::SchemaContext(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Generate(_) | Self::Run(_) | Self::Save(_) | Self::Attach(_) | Self::MissingCardId(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl ErrorCode for ServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyInput(_) => "E_EMPTY_INPUT",
            Self::SchemaContext(_) => "E_SCHEMA_CONTEXT",
            Self::Generate(e) => e.error_code(),
            Self::Run(e) | Self::Save(e) | Self::Attach(e) => e.error_code(),
            Self::MissingCardId(_) => "E_MISSING_CARD_ID",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Generate(e) => e.retryable(),
            Self::Run(e) | Self::Save(e) | Self::Attach(e) => e.retryable(),
            _ => false,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(code = self.error_code(), retryable = self.retryable(), %status, error = %self, "service: request failed");
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

fn require_non_empty(value: &str, what: &'static str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::EmptyInput(what));
    }
    Ok(())
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /generate-sql`: question in, SQL out.
pub async fn generate_sql(
    State(state): State<ServiceState>,
    Json(body): Json<GenerateSqlRequest>,
) -> Result<Json<GenerateSqlResponse>, ServiceError> {
    require_non_empty(&body.question, "question")?;

    let schema_context = tokio::fs::read_to_string(&state.schema_context_path)
        .await
        .map_err(ServiceError::SchemaContext)?;

    let sql = sql_gen::generate(
        state.llm.as_ref(),
        state.max_tokens,
        &schema_context,
        &state.schema_name,
        body.question.trim(),
    )
    .await
    .map_err(ServiceError::Generate)?;

    info!(question_len = body.question.len(), sql_len = sql.len(), "service: generated sql");
    Ok(Json(GenerateSqlResponse { sql }))
}

/// `POST /run-sql`: execute via Metabase and echo the SQL with its results.
pub async fn run_sql(
    State(state): State<ServiceState>,
    Json(body): Json<RunSqlRequest>,
) -> Result<Json<RunSqlResponse>, ServiceError> {
    require_non_empty(&body.sql, "sql")?;

    let results = state
        .metabase
        .run_native(&body.sql)
        .await
        .map_err(ServiceError::Run)?;

    info!(rows = results.row_count(), "service: ran sql");
    Ok(Json(RunSqlResponse { sql: body.sql, results }))
}

/// `POST /save-sql`: save as a Metabase card, optionally on a dashboard.
pub async fn save_sql(
    State(state): State<ServiceState>,
    Json(body): Json<SaveSqlRequest>,
) -> Result<Json<SaveSqlResponse>, ServiceError> {
    require_non_empty(&body.sql, "sql")?;

    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_CARD_NAME);

    let card = state
        .metabase
        .create_card(name, &body.sql)
        .await
        .map_err(ServiceError::Save)?;

    if let Some(dashboard_id) = body.dashboard_id.filter(|_| state.attach_to_dashboard) {
        let card_id = card.id.ok_or(ServiceError::MissingCardId(dashboard_id))?;
        state
            .metabase
            .add_card_to_dashboard(dashboard_id, card_id)
            .await
            .map_err(ServiceError::Attach)?;
    }

    info!(name = %card.name, card_id = ?card.id, "service: saved sql");
    Ok(Json(SaveSqlResponse { message: Some(SAVED_MESSAGE.to_string()), card }))
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
