//! SQL service — the HTTP side of a chat session.
//!
//! DESIGN
//! ======
//! Three JSON endpoints mirror the calls in [`crate::api::SqlBackend`]:
//! `/generate-sql` asks the LLM for SQL using the schema context file,
//! `/run-sql` executes through Metabase's dataset API, and `/save-sql` stores
//! a Metabase card. Failures answer `{detail}` so clients can show the reason.
//!
//! The LLM and Metabase sit behind traits held in [`ServiceState`], so the
//! router is tested end to end with mocks.

pub mod metabase;
pub mod routes;
pub mod sql_gen;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::http::{GENERATE_SQL_PATH, RUN_SQL_PATH, SAVE_SQL_PATH};
use crate::config::ConfigError;
use crate::llm::LlmChat;
use metabase::Metabase;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct ServiceState {
    pub llm: Arc<dyn LlmChat>,
    pub metabase: Arc<dyn Metabase>,
    pub schema_context_path: PathBuf,
    pub schema_name: String,
    pub max_tokens: u32,
    /// Attach saved cards to the dashboard named in the request.
    pub attach_to_dashboard: bool,
}

/// Build the service router.
pub fn app(state: ServiceState, cors: CorsLayer) -> Router {
    Router::new()
        .route(GENERATE_SQL_PATH, post(routes::generate_sql))
        .route(RUN_SQL_PATH, post(routes::run_sql))
        .route(SAVE_SQL_PATH, post(routes::save_sql))
        .route("/healthz", get(routes::healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for a single browser origin; `*` allows any.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if `origin` is not a valid header value.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }
    let value = HeaderValue::from_str(origin.trim())
        .map_err(|_| ConfigError::Invalid { var: "CORS_ALLOW_ORIGIN".into(), value: origin.into() })?;
    Ok(layer.allow_origin(value))
}
