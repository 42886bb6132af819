//! Executor: runs a built `(sql, args)` pair against the relational store
//! and normalises the result into a uniform row/column document.

use crate::error::FilesError;
use crate::files::sql::BuiltQuery;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Poll interval for the cancellation watcher thread. Bounds how long the
/// watcher lingers past a query's own completion, and how promptly a
/// cancellation fired mid-query is observed.
const WATCHER_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A single result row, one JSON value per column, in column order.
pub type Row = Vec<JsonValue>;

#[derive(Debug, Clone, Serialize)]
pub struct QueryMetadata {
    pub took_ms: u64,
    pub query: String,
    pub source: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub metadata: QueryMetadata,
}

/// Execute `built` against `conn`, returning a uniform `QueryResult`.
///
/// The connection is treated as externally owned: this function never
/// closes it, on any path, including errors. `rusqlite` offers no native
/// async cancellation, so `cancel` is watched from a background thread
/// that calls `Connection::interrupt` (via `InterruptHandle`, which is
/// `Send`/`Sync` by design for exactly this purpose) the moment the token
/// fires; the watcher is always joined before this function returns, so it
/// never outlives the call by more than one poll interval.
pub fn execute(
    conn: &Connection,
    built: &BuiltQuery,
    cancel: &CancellationToken,
) -> Result<QueryResult, FilesError> {
    if cancel.is_cancelled() {
        return Err(FilesError::Cancelled);
    }

    let start = Instant::now();

    let finished = Arc::new(AtomicBool::new(false));
    let watcher = {
        let finished = finished.clone();
        let watched = cancel.clone();
        let interrupt_handle = conn.get_interrupt_handle();
        std::thread::spawn(move || {
            while !finished.load(Ordering::Relaxed) {
                if watched.is_cancelled() {
                    interrupt_handle.interrupt();
                    return;
                }
                std::thread::sleep(WATCHER_POLL_INTERVAL);
            }
        })
    };

    let outcome = run(conn, built);
    finished.store(true, Ordering::Relaxed);
    let _ = watcher.join();

    match outcome {
        Ok(mut result) => {
            result.metadata.took_ms = start.elapsed().as_millis() as u64;
            Ok(result)
        }
        Err(_) if cancel.is_cancelled() => Err(FilesError::Cancelled),
        Err(e) => Err(e),
    }
}

fn run(conn: &Connection, built: &BuiltQuery) -> Result<QueryResult, FilesError> {
    let mut stmt = conn.prepare(&built.sql)?;

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let params: Vec<&dyn rusqlite::ToSql> = built.args.iter().map(|v| v as &dyn rusqlite::ToSql).collect();

    let mut rows_iter = stmt
        .query(params.as_slice())
        .map_err(FilesError::ExecutionFailed)?;

    let mut rows = Vec::new();
    loop {
        let maybe_row = rows_iter.next().map_err(|e| FilesError::RowIterationFailed {
            reason: e.to_string(),
        })?;
        let Some(row) = maybe_row else { break };

        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let value_ref = row.get_ref(i).map_err(|e| FilesError::RowScanFailed {
                reason: e.to_string(),
            })?;
            values.push(value_ref_to_json(value_ref));
        }
        rows.push(values);
    }

    let row_count = rows.len();

    Ok(QueryResult {
        columns,
        rows,
        row_count,
        metadata: QueryMetadata {
            took_ms: 0,
            query: built.sql.clone(),
            source: "files",
        },
    })
}

fn value_ref_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        ValueRef::Text(t) => JsonValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
    }
}
