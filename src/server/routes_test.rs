use super::*;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

use crate::api::SavedCard;
use crate::chat::QueryResults;
use crate::llm::{ChatResponse, LlmChat, Message};
use crate::server::metabase::Metabase;
use crate::server::{ServiceState, app};

// =============================================================================
// Mocks
// =============================================================================

struct MockLlm {
    reply: String,
}

#[async_trait::async_trait]
impl LlmChat for MockLlm {
    async fn chat(&self, _max_tokens: u32, _system: &str, messages: &[Message]) -> Result<ChatResponse, LlmError> {
        if self.reply == "FAIL" {
            return Err(LlmError::ApiResponse { status: 500, body: "boom".into() });
        }
        // Only answer when the schema context made it into the prompt.
        let schema_seen = messages[0].content.contains("widgets(id (integer))");
        Ok(ChatResponse {
            text: if schema_seen { self.reply.clone() } else { "-- no schema".into() },
            model: "mock".into(),
            stop_reason: "end_turn".into(),
            input_tokens: 0,
            output_tokens: 0,
        })
    }
}

#[derive(Default)]
struct MockMetabase {
    fail_run: Option<String>,
    card_id: Option<i64>,
    cards: Mutex<Vec<(String, String)>>,
    attached: Mutex<Vec<(i64, i64)>>,
}

#[async_trait::async_trait]
impl Metabase for MockMetabase {
    async fn run_native(&self, sql: &str) -> Result<QueryResults, MetabaseError> {
        if let Some(reason) = &self.fail_run {
            return Err(MetabaseError::Query(reason.clone()));
        }
        Ok(QueryResults { columns: vec!["sql_len".into()], rows: vec![vec![json!(sql.len())]] })
    }

    async fn create_card(&self, name: &str, sql: &str) -> Result<SavedCard, MetabaseError> {
        self.cards
            .lock()
            .unwrap()
            .push((name.to_string(), sql.to_string()));
        Ok(SavedCard { name: name.to_string(), id: self.card_id, extra: serde_json::Map::new() })
    }

    async fn add_card_to_dashboard(&self, dashboard_id: i64, card_id: i64) -> Result<(), MetabaseError> {
        self.attached
            .lock()
            .unwrap()
            .push((dashboard_id, card_id));
        Ok(())
    }
}

fn schema_file() -> PathBuf {
    let path = std::env::temp_dir().join(format!("iris-schema-{}.txt", uuid::Uuid::new_v4()));
    std::fs::write(&path, "Tables:\nwidgets(id (integer))").unwrap();
    path
}

fn state_with(llm_reply: &str, metabase: Arc<MockMetabase>, attach: bool) -> ServiceState {
    ServiceState {
        llm: Arc::new(MockLlm { reply: llm_reply.to_string() }),
        metabase,
        schema_context_path: schema_file(),
        schema_name: "emsp".into(),
        max_tokens: 256,
        attach_to_dashboard: attach,
    }
}

async fn post_json(state: ServiceState, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app(state, CorsLayer::new()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// =============================================================================
// /generate-sql
// =============================================================================

#[tokio::test]
async fn generate_sql_returns_stripped_sql() {
    let state = state_with("```sql\nSELECT * FROM emsp.widgets\n```", Arc::default(), false);
    let (status, body) = post_json(state, "/generate-sql", json!({ "question": "all widgets" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "sql": "SELECT * FROM emsp.widgets" }));
}

#[tokio::test]
async fn generate_sql_rejects_blank_question() {
    let state = state_with("SELECT 1", Arc::default(), false);
    let (status, body) = post_json(state, "/generate-sql", json!({ "question": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "question must not be empty");
}

#[tokio::test]
async fn generate_sql_missing_schema_file_is_500() {
    let mut state = state_with("SELECT 1", Arc::default(), false);
    state.schema_context_path = PathBuf::from("/nonexistent/iris/schema_context.txt");
    let (status, body) = post_json(state, "/generate-sql", json!({ "question": "q" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().starts_with("schema context unavailable"));
}

#[tokio::test]
async fn generate_sql_llm_failure_is_502_with_detail() {
    let state = state_with("FAIL", Arc::default(), false);
    let (status, body) = post_json(state, "/generate-sql", json!({ "question": "q" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["detail"].as_str().unwrap().starts_with("SQL generation failed"));
}

// =============================================================================
// /run-sql
// =============================================================================

#[tokio::test]
async fn run_sql_echoes_sql_with_results() {
    let state = state_with("", Arc::default(), false);
    let (status, body) = post_json(state, "/run-sql", json!({ "sql": "SELECT 1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "sql": "SELECT 1", "columns": ["sql_len"], "rows": [[8]] }));
}

#[tokio::test]
async fn run_sql_metabase_failure_is_502() {
    let metabase = Arc::new(MockMetabase { fail_run: Some("syntax error at or near".into()), ..Default::default() });
    let state = state_with("", metabase, false);
    let (status, body) = post_json(state, "/run-sql", json!({ "sql": "SELEC 1" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["detail"], "Metabase query failed: syntax error at or near");
}

#[tokio::test]
async fn run_sql_rejects_empty_sql() {
    let state = state_with("", Arc::default(), false);
    let (status, _) = post_json(state, "/run-sql", json!({ "sql": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// /save-sql
// =============================================================================

#[tokio::test]
async fn save_sql_creates_named_card() {
    let metabase = Arc::new(MockMetabase { card_id: Some(9), ..Default::default() });
    let state = state_with("", metabase.clone(), false);
    let (status, body) = post_json(
        state,
        "/save-sql",
        json!({ "sql": "SELECT 1", "name": "Q: revenue", "dashboard_id": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], SAVED_MESSAGE);
    assert_eq!(body["card"]["name"], "Q: revenue");
    assert_eq!(body["card"]["id"], 9);
    assert_eq!(metabase.cards.lock().unwrap().as_slice(), &[("Q: revenue".to_string(), "SELECT 1".to_string())]);
    assert!(metabase.attached.lock().unwrap().is_empty());
}

#[tokio::test]
async fn save_sql_defaults_card_name() {
    let metabase = Arc::new(MockMetabase::default());
    let state = state_with("", metabase.clone(), false);
    let (status, body) = post_json(state, "/save-sql", json!({ "sql": "SELECT 1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["card"]["name"], DEFAULT_CARD_NAME);
}

#[tokio::test]
async fn save_sql_attaches_when_enabled() {
    let metabase = Arc::new(MockMetabase { card_id: Some(9), ..Default::default() });
    let state = state_with("", metabase.clone(), true);
    let (status, _) = post_json(state, "/save-sql", json!({ "sql": "SELECT 1", "dashboard_id": 4 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metabase.attached.lock().unwrap().as_slice(), &[(4, 9)]);
}

#[tokio::test]
async fn save_sql_attach_without_card_id_is_502() {
    let metabase = Arc::new(MockMetabase::default());
    let state = state_with("", metabase, true);
    let (status, body) = post_json(state, "/save-sql", json!({ "sql": "SELECT 1", "dashboard_id": 4 })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["detail"].as_str().unwrap().contains("dashboard 4"));
}

// =============================================================================
// misc
// =============================================================================

#[tokio::test]
async fn healthz_ok() {
    let state = state_with("", Arc::default(), false);
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app(state, CorsLayer::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn service_error_codes() {
    assert_eq!(ServiceError::EmptyInput("sql").error_code(), "E_EMPTY_INPUT");
    assert_eq!(ServiceError::Run(MetabaseError::Query("x".into())).error_code(), "E_METABASE_QUERY");
    assert!(ServiceError::Generate(LlmError::ApiRequest("timeout".into())).retryable());
}

#[test]
fn cors_layer_rejects_bad_origin() {
    assert!(crate::server::cors_layer("http://ok.test").is_ok());
    assert!(crate::server::cors_layer("*").is_ok());
    assert!(crate::server::cors_layer("bad\norigin").is_err());
}
