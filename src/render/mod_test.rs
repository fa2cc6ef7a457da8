use super::*;
use serde_json::json;
use time::macros::datetime;

use crate::chat::{MessageId, Resolution};

fn plain() {
    colored::control::set_override(false);
}

fn at_noon(mut message: Message) -> Message {
    message.created_at = datetime!(2025-03-04 12:34:56 UTC);
    message
}

#[test]
fn header_for_user_message_has_no_status() {
    plain();
    let msg = at_noon(Message::user("how many?"));
    assert_eq!(header(&msg, 1), "[1] You  12:34:56");
}

#[test]
fn header_marks_assistant_status() {
    plain();
    let mut msg = at_noon(Message::pending("Generating SQL query..."));
    assert_eq!(header(&msg, 2), "[2] AI Assistant  12:34:56  ...");

    msg.settle(Resolution::Failed { content: "boom".into() });
    assert!(header(&msg, 2).ends_with("✗"));
}

#[test]
fn message_shows_sql_block_and_actions() {
    plain();
    let mut msg = at_noon(Message::pending("Generating SQL query..."));
    msg.settle(Resolution::Generated {
        content: "Here's the SQL query for your question:".into(),
        sql: "SELECT 1\nFROM t".into(),
        question: "q".into(),
    });

    let text = message(&msg, 2);
    assert_eq!(
        text,
        "[2] AI Assistant  12:34:56  ✓\n\
         Here's the SQL query for your question:\n\
         Generated SQL:\n\
         \x20 SELECT 1\n\
         \x20 FROM t\n\
         /run 2 · /save 2 · /edit 2 <sql>"
    );
}

#[test]
fn message_shows_results_and_row_count() {
    plain();
    let mut msg = at_noon(Message::pending("Executing SQL query..."));
    msg.settle(Resolution::Ran {
        content: "Query executed successfully:".into(),
        results: QueryResults { columns: vec!["x".into()], rows: vec![vec![json!(1)]] },
    });

    let text = message(&msg, 3);
    assert!(text.contains("Query Results:"));
    assert!(text.contains("| x |"));
    assert!(text.ends_with("1 rows returned"));
}

#[test]
fn transcript_empty_is_welcome() {
    plain();
    let text = transcript(&[]);
    assert!(text.starts_with("Welcome to AI SQL Assistant"));
    assert!(text.contains("• Save queries to Metabase"));
}

#[test]
fn transcript_numbers_messages() {
    plain();
    let messages = vec![at_noon(Message::user("a")), at_noon(Message::pending("b"))];
    let text = transcript(&messages);
    assert!(text.starts_with("[1] You"));
    assert!(text.contains("\n\n[2] AI Assistant"));
}

#[test]
fn cell_renders_strings_bare_and_null_literally() {
    assert_eq!(cell(&json!("Pune")), "Pune");
    assert_eq!(cell(&Value::Null), "null");
    assert_eq!(cell(&json!(2.5)), "2.5");
    assert_eq!(cell(&json!(true)), "true");
}

#[test]
fn table_pads_columns() {
    let results = QueryResults {
        columns: vec!["id".into(), "city".into()],
        rows: vec![vec![json!(1), json!("Pune")], vec![json!(10), Value::Null]],
    };
    assert_eq!(
        table(&results),
        "+----+------+\n\
         | id | city |\n\
         +----+------+\n\
         | 1  | Pune |\n\
         | 10 | null |\n\
         +----+------+"
    );
}

#[test]
fn table_pads_ragged_rows() {
    let results = QueryResults { columns: vec!["a".into()], rows: vec![vec![json!(1), json!(2)]] };
    assert_eq!(table(&results), "+---+---+\n| a |   |\n+---+---+\n| 1 | 2 |\n+---+---+");
}

#[test]
fn table_without_columns() {
    assert_eq!(table(&QueryResults::default()), "(no columns)");
}

#[test]
fn notice_lines() {
    plain();
    let id = MessageId::new();
    assert_eq!(notice(&Notice::info(id, "Query returned 3 rows")), "✓ Query returned 3 rows");
    assert_eq!(
        notice(&Notice::error(id, "Save failed", "Request failed with status code 500")),
        "✗ Save failed: Request failed with status code 500"
    );
}
