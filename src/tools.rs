//! Tool-protocol entry points (spec §6): request dispatch for `cortex_files`
//! and `cortex_pattern`, distinguishing caller-visible structured
//! error-results from internal/opaque failures.

use crate::config::ProviderConfig;
use crate::error::{FilesError, PatternError};
use crate::files::query_def::QueryDefinition;
use crate::pattern::provider::BinaryProvider;
use crate::pattern::types::PatternRequest;
use rusqlite::Connection;
use serde_json::{json, Value as JsonValue};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// The outcome of handling a tool request.
///
/// `Ok` always means "the protocol call completed"; a caller mistake still
/// produces `Ok(ToolOutcome::ErrorResult(_))`, not an `Err`. `Err` is
/// reserved for internal failures (execution, installation, subprocess)
/// that the protocol layer should treat as opaque.
pub enum ToolOutcome {
    Result(String),
    ErrorResult(JsonValue),
}

fn error_result(message: impl Into<String>) -> ToolOutcome {
    ToolOutcome::ErrorResult(json!({ "error": message.into() }))
}

/// Handle a `cortex_files` request: `{ "operation": "query", "query": <QueryDefinition> }`.
pub fn handle_files_request(
    conn: &Connection,
    raw: &JsonValue,
    cancel: &CancellationToken,
) -> Result<ToolOutcome, FilesError> {
    let Some(object) = raw.as_object() else {
        return Ok(error_result("request must be a JSON object"));
    };

    let operation = match object.get("operation") {
        Some(JsonValue::String(s)) if !s.is_empty() => s.as_str(),
        Some(JsonValue::String(_)) => return Ok(error_result("operation must not be empty")),
        Some(_) => return Ok(error_result("operation must be a string")),
        None => return Ok(error_result("missing operation")),
    };

    if operation != "query" {
        return Ok(error_result(format!("unsupported operation: {operation}")));
    }

    let Some(query_value) = object.get("query") else {
        return Ok(error_result("missing query"));
    };

    let query: QueryDefinition = match QueryDefinition::from_value(query_value.clone()) {
        Ok(q) => q,
        Err(e) => return Ok(error_result(format!("malformed query: {e}"))),
    };

    if let Err(validation) = crate::files::validate(&query) {
        return Ok(error_result(validation.to_string()));
    }

    let built = crate::files::build(&query).map_err(|e| {
        tracing::error!(error = %e, "files request failed during query build");
        e
    })?;
    let result = crate::files::execute(conn, &built, cancel).map_err(|e| {
        tracing::error!(error = %e, "files request failed during execution");
        e
    })?;
    let payload = serde_json::to_string(&result)?;
    Ok(ToolOutcome::Result(payload))
}

/// Handle a `cortex_pattern` request: see §6.4 for the request shape.
pub async fn handle_pattern_request(
    provider: &BinaryProvider,
    raw: &JsonValue,
    project_root: &Path,
    config: &ProviderConfig,
    cancel: &CancellationToken,
) -> Result<ToolOutcome, PatternError> {
    let request: PatternRequest = match serde_json::from_value(raw.clone()) {
        Ok(r) => r,
        Err(e) => return Ok(error_result(format!("malformed pattern request: {e}"))),
    };

    let response = match crate::pattern::search(provider, &request, project_root, config, cancel).await {
        Ok(response) => response,
        Err(err @ PatternError::InvalidRequest { .. }) | Err(err @ PatternError::PathOutsideRoot { .. }) => {
            return Ok(error_result(err.to_string()));
        }
        Err(other) => {
            tracing::error!(error = %other, "pattern request failed");
            return Err(other);
        }
    };

    let payload = serde_json::to_string(&response).map_err(PatternError::OutputParse)?;
    Ok(ToolOutcome::Result(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE files (id INTEGER PRIMARY KEY, path TEXT, language TEXT, line_count_total INTEGER);
             INSERT INTO files (path, language, line_count_total) VALUES ('a.go', 'go', 120);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn missing_operation_is_an_error_result() {
        let conn = fixture_db();
        let raw = json!({ "query": { "from": "files" } });
        match handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap() {
            ToolOutcome::ErrorResult(_) => {}
            ToolOutcome::Result(_) => panic!("expected an error-result"),
        }
    }

    #[test]
    fn unsupported_operation_is_an_error_result() {
        let conn = fixture_db();
        let raw = json!({ "operation": "delete", "query": { "from": "files" } });
        match handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap() {
            ToolOutcome::ErrorResult(v) => {
                assert!(v["error"].as_str().unwrap().contains("unsupported operation"));
            }
            ToolOutcome::Result(_) => panic!("expected an error-result"),
        }
    }

    #[test]
    fn missing_query_is_an_error_result() {
        let conn = fixture_db();
        let raw = json!({ "operation": "query" });
        match handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap() {
            ToolOutcome::ErrorResult(_) => {}
            ToolOutcome::Result(_) => panic!("expected an error-result"),
        }
    }

    #[test]
    fn malformed_query_json_is_an_error_result() {
        let conn = fixture_db();
        let raw = json!({ "operation": "query", "query": { "from": 5 } });
        match handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap() {
            ToolOutcome::ErrorResult(_) => {}
            ToolOutcome::Result(_) => panic!("expected an error-result"),
        }
    }

    #[test]
    fn valid_query_returns_a_result_payload() {
        let conn = fixture_db();
        let raw = json!({
            "operation": "query",
            "query": { "from": "files", "where": { "field": "language", "operator": "=", "value": "go" } }
        });
        match handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap() {
            ToolOutcome::Result(payload) => {
                let parsed: JsonValue = serde_json::from_str(&payload).unwrap();
                assert_eq!(parsed["row_count"], 1);
            }
            ToolOutcome::ErrorResult(v) => panic!("expected a result, got error: {v}"),
        }
    }

    #[test]
    fn validation_failure_is_an_error_result_not_an_exception() {
        let conn = fixture_db();
        let raw = json!({ "operation": "query", "query": { "from": "not_a_table" } });
        match handle_files_request(&conn, &raw, &CancellationToken::new()).unwrap() {
            ToolOutcome::ErrorResult(_) => {}
            ToolOutcome::Result(_) => panic!("expected an error-result"),
        }
    }

    #[test]
    fn cancelled_token_surfaces_as_an_opaque_error_not_a_result() {
        let conn = fixture_db();
        let raw = json!({ "operation": "query", "query": { "from": "files" } });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = handle_files_request(&conn, &raw, &cancel).unwrap_err();
        assert!(matches!(err, FilesError::Cancelled));
    }
}
