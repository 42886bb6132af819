//! CLI output formatting for cortex-tools.
//!
//! The tool-protocol result (what `cortex_files`/`cortex_pattern` return to
//! an LLM caller) is always the bare `QueryResult`/`PatternResponse` JSON
//! (spec §6.3/§6.5) with no wrapper. This module formats that same payload
//! for a human running the CLI directly.

use chrono::Utc;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

const SCHEMA_VERSION: &str = "1.0.0";

/// Output format for CLI invocations.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// Compact JSON output (single line)
    Json,
    /// Pretty-printed JSON with indentation
    Pretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
            OutputFormat::Pretty => "pretty",
        };
        write!(f, "{}", value)
    }
}

/// JSON envelope used only for CLI diagnostics (errors), not the
/// tool-protocol result payload itself.
#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub schema_version: &'static str,
    pub execution_id: String,
    pub tool: &'static str,
    pub timestamp: String,
    pub data: T,
}

/// Error response structure for JSON/Pretty CLI output.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

pub fn json_response<T>(data: T) -> JsonResponse<T> {
    JsonResponse {
        schema_version: SCHEMA_VERSION,
        execution_id: execution_id(),
        tool: "cortex-tools",
        timestamp: Utc::now().to_rfc3339(),
        data,
    }
}

/// Generate a unique execution ID: `{unix_timestamp:x}-{pid:x}`.
pub fn execution_id() -> String {
    let timestamp = Utc::now().timestamp();
    let pid = std::process::id();
    format!("{:x}-{:x}", timestamp, pid)
}
