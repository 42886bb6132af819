//! End-to-end Files-core exercise: `handle_files_request` against a real
//! in-memory SQLite database, mirroring the teacher's own
//! `tests/integration_tests.rs` style of standing up a temp database rather
//! than mocking the store.

use cortex_tools::tools::{handle_files_request, ToolOutcome};
use rusqlite::Connection;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn fixture_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE files (
            id INTEGER PRIMARY KEY,
            path TEXT,
            language TEXT,
            line_count_total INTEGER,
            is_test INTEGER
         );
         INSERT INTO files (path, language, line_count_total, is_test) VALUES
            ('main.go', 'go', 220, 0),
            ('util.go', 'go', 80, 0),
            ('main_test.go', 'go', 40, 1),
            ('lib.rs', 'rust', 500, 0);",
    )
    .unwrap();
    conn
}

fn expect_result(outcome: ToolOutcome) -> Value {
    match outcome {
        ToolOutcome::Result(payload) => serde_json::from_str(&payload).unwrap(),
        ToolOutcome::ErrorResult(v) => panic!("expected a result, got error-result: {v}"),
    }
}

fn expect_error(outcome: ToolOutcome) -> Value {
    match outcome {
        ToolOutcome::ErrorResult(v) => v,
        ToolOutcome::Result(payload) => panic!("expected an error-result, got: {payload}"),
    }
}

#[test]
fn simple_filtered_select_returns_matching_rows() {
    let conn = fixture_db();
    let raw = json!({
        "operation": "query",
        "query": {
            "from": "files",
            "where": { "field": "language", "operator": "=", "value": "go" },
            "order_by": [{ "field": "line_count_total", "direction": "DESC" }],
        }
    });

    let result = expect_result(handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap());
    assert_eq!(result["row_count"], 3);
    assert_eq!(result["metadata"]["source"], "files");
}

#[test]
fn aggregation_with_group_by_and_having() {
    let conn = fixture_db();
    let raw = json!({
        "operation": "query",
        "query": {
            "from": "files",
            "group_by": ["language"],
            "aggregations": [{ "function": "COUNT", "alias": "file_count" }],
            "having": { "field": "file_count", "operator": ">", "value": 1 },
        }
    });

    let result = expect_result(handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap());
    assert_eq!(result["row_count"], 1);
    assert_eq!(result["rows"][0][0], "go");
}

#[test]
fn unknown_table_is_a_caller_visible_error_result() {
    let conn = fixture_db();
    let raw = json!({ "operation": "query", "query": { "from": "secrets" } });
    let error = expect_error(handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap());
    assert!(error["error"].as_str().unwrap().contains("unknown"));
}

#[test]
fn nested_and_or_not_logic_scenario() {
    let conn = fixture_db();
    let raw = json!({
        "operation": "query",
        "query": {
            "from": "files",
            "where": {
                "and": [
                    { "field": "language", "operator": "=", "value": "go" },
                    { "not": { "field": "is_test", "operator": "=", "value": 1 } }
                ]
            }
        }
    });

    let result = expect_result(handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap());
    assert_eq!(result["row_count"], 2);
}

#[test]
fn limit_and_offset_are_respected() {
    let conn = fixture_db();
    let raw = json!({
        "operation": "query",
        "query": {
            "from": "files",
            "order_by": [{ "field": "path", "direction": "ASC" }],
            "limit": 1,
            "offset": 1,
        }
    });

    let result = expect_result(handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap());
    assert_eq!(result["row_count"], 1);
}

#[test]
fn cancellation_yields_no_result_document() {
    let conn = fixture_db();
    let raw = json!({
        "operation": "query",
        "query": { "from": "files" }
    });

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(handle_files_request(&conn, &raw, &cancel).is_err());
}
