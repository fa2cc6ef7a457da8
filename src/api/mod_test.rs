use super::*;
use serde_json::json;

// =============================================================================
// describe — fallback chain
// =============================================================================

#[test]
fn describe_prefers_remote_detail() {
    let err = ApiError::Status { status: 400, detail: Some("table not found".into()) };
    assert_eq!(err.describe("Failed to generate SQL query"), "table not found");
}

#[test]
fn describe_falls_back_to_transport_message() {
    let err = ApiError::Status { status: 500, detail: None };
    assert_eq!(err.describe("Failed to execute SQL query"), "Request failed with status code 500");

    let err = ApiError::Transport("connection refused".into());
    assert_eq!(err.describe("Failed to execute SQL query"), "connection refused");
}

#[test]
fn describe_ignores_blank_detail() {
    let err = ApiError::Status { status: 502, detail: Some("   ".into()) };
    assert_eq!(err.describe("x"), "Request failed with status code 502");
}

#[test]
fn describe_uses_default_when_nothing_else() {
    let err = ApiError::Transport(String::new());
    assert_eq!(err.describe("Failed to save to Metabase"), "Failed to save to Metabase");
}

#[test]
fn retryable_statuses() {
    assert!(ApiError::Status { status: 503, detail: None }.retryable());
    assert!(ApiError::Transport("reset".into()).retryable());
    assert!(!ApiError::Status { status: 400, detail: None }.retryable());
    assert!(!ApiError::Parse("bad".into()).retryable());
}

// =============================================================================
// parse_failure_detail
// =============================================================================

#[test]
fn failure_detail_string() {
    assert_eq!(parse_failure_detail(r#"{"detail":"nope"}"#).as_deref(), Some("nope"));
}

#[test]
fn failure_detail_structured_kept_as_json() {
    let body = json!({ "detail": [{ "loc": ["body", "sql"], "msg": "field required" }] }).to_string();
    let detail = parse_failure_detail(&body).unwrap();
    assert!(detail.contains("field required"));
}

#[test]
fn failure_detail_absent_or_not_json() {
    assert_eq!(parse_failure_detail(r#"{"error":"x"}"#), None);
    assert_eq!(parse_failure_detail(r#"{"detail":null}"#), None);
    assert_eq!(parse_failure_detail("<html>bad gateway</html>"), None);
}

// =============================================================================
// Wire shapes
// =============================================================================

#[test]
fn save_request_omits_absent_fields() {
    let req = SaveSqlRequest { sql: "SELECT 1".into(), name: None, dashboard_id: None };
    assert_eq!(serde_json::to_value(&req).unwrap(), json!({ "sql": "SELECT 1" }));
}

#[test]
fn save_request_full_shape() {
    let req = SaveSqlRequest { sql: "SELECT 1".into(), name: Some("Q: one".into()), dashboard_id: Some(1) };
    assert_eq!(
        serde_json::to_value(&req).unwrap(),
        json!({ "sql": "SELECT 1", "name": "Q: one", "dashboard_id": 1 })
    );
}

#[test]
fn run_response_flattens_results() {
    let value = json!({ "sql": "SELECT 1", "columns": ["x"], "rows": [[1]] });
    let resp: RunSqlResponse = serde_json::from_value(value.clone()).unwrap();
    assert_eq!(resp.results.columns, vec!["x".to_string()]);
    assert_eq!(serde_json::to_value(&resp).unwrap(), value);
}

#[test]
fn saved_card_keeps_unknown_fields() {
    let value = json!({ "card": { "id": 7, "name": "Q: revenue", "display": "table" } });
    let resp: SaveSqlResponse = serde_json::from_value(value).unwrap();
    assert_eq!(resp.card.name, "Q: revenue");
    assert_eq!(resp.card.id, Some(7));
    assert_eq!(resp.card.extra.get("display"), Some(&json!("table")));
    assert!(resp.message.is_none());
}
