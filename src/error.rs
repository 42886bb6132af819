//! Error types for cortex-tools.
//!
//! Error codes are organized by category:
//!
//! - **CORTEX-V0xx**: query validation errors (recoverable, accumulating)
//! - **CORTEX-F0xx**: Files core translation/execution errors
//! - **CORTEX-P0xx**: Pattern core caller/installation/subprocess errors

use thiserror::Error;

/// A single validation violation against a `QueryDefinition`.
///
/// Validation never short-circuits except on an unknown `from` table
/// (downstream column checks are meaningless without a resolved table).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending field, e.g. `"where.field"` or `"aggregations[1].alias"`.
    pub field_path: String,
    /// The offending value, rendered for display.
    pub value: String,
    /// Human-readable description of the violation.
    pub message: String,
    /// Suggested remediation, when one exists.
    pub hint: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        field_path: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
        hint: Option<&str>,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            value: value.into(),
            message: message.into(),
            hint: hint.map(str::to_string),
        }
    }
}

/// Accumulated validation failures for a single `QueryDefinition`.
///
/// Never empty when returned as an `Err`: construction requires at least
/// one issue.
#[derive(Debug, Error, Clone, serde::Serialize)]
#[error("query validation failed: {}", render_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn render_issues(issues: &[ValidationIssue]) -> String {
    if issues.len() == 1 {
        issues[0].message.clone()
    } else {
        issues
            .iter()
            .enumerate()
            .map(|(i, issue)| format!("{}. {}: {}", i + 1, issue.field_path, issue.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl ValidationError {
    pub fn single(issue: ValidationIssue) -> Self {
        Self { issues: vec![issue] }
    }
}

/// Errors from the Files core: translation and execution.
#[derive(Error, Debug)]
pub enum FilesError {
    /// Request validation failed before any SQL was built.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The SQL builder refused to interpolate a malformed identifier.
    ///
    /// This should be unreachable in practice: the validator rejects
    /// unknown identifiers before the builder ever sees them. Treated as
    /// a fatal assertion rather than a recoverable error.
    #[error("CORTEX-F001: identifier safety assertion failed: {identifier:?} is not a canonical identifier")]
    UnsafeIdentifier { identifier: String },

    /// Building the final SQL text/argument list failed.
    #[error("CORTEX-F002: query build failed: {reason}")]
    BuildFailed { reason: String },

    /// The relational store rejected or failed to execute the query.
    #[error("CORTEX-F003: query execution failed: {0}")]
    ExecutionFailed(#[from] rusqlite::Error),

    /// Column names could not be read from the result set.
    #[error("CORTEX-F004: failed to get column names: {reason}")]
    ColumnNamesFailed { reason: String },

    /// A row failed to scan into the uniform row/column shape.
    #[error("CORTEX-F005: failed to scan row: {reason}")]
    RowScanFailed { reason: String },

    /// Row iteration was interrupted partway through.
    #[error("CORTEX-F006: error iterating rows: {reason}")]
    RowIterationFailed { reason: String },

    /// The caller's cancellation token fired before completion.
    #[error("CORTEX-F007: query cancelled")]
    Cancelled,

    /// Result document serialization failed.
    #[error("CORTEX-F008: result marshal failed: {0}")]
    Marshal(#[from] serde_json::Error),
}

impl FilesError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            FilesError::Validation(_) => "CORTEX-V000",
            FilesError::UnsafeIdentifier { .. } => "CORTEX-F001",
            FilesError::BuildFailed { .. } => "CORTEX-F002",
            FilesError::ExecutionFailed(_) => "CORTEX-F003",
            FilesError::ColumnNamesFailed { .. } => "CORTEX-F004",
            FilesError::RowScanFailed { .. } => "CORTEX-F005",
            FilesError::RowIterationFailed { .. } => "CORTEX-F006",
            FilesError::Cancelled => "CORTEX-F007",
            FilesError::Marshal(_) => "CORTEX-F008",
        }
    }
}

/// Errors from the Pattern core: caller input, binary lifecycle, subprocess.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Request failed local validation (unsupported language/strictness,
    /// out-of-range limit/context_lines).
    #[error("CORTEX-P001: invalid pattern request: {reason}")]
    InvalidRequest { reason: String },

    /// A `file_paths` entry escaped the project root.
    #[error("CORTEX-P002: path outside project root: {path}")]
    PathOutsideRoot { path: String },

    /// The current OS/architecture has no pinned ast-grep build.
    #[error("CORTEX-P010: unsupported platform: {os}-{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Downloading the pinned archive failed.
    #[error("CORTEX-P011: download failed: {0}")]
    DownloadFailed(#[from] reqwest::Error),

    /// The downloaded archive did not contain the expected binary, or was
    /// otherwise malformed.
    #[error("CORTEX-P012: archive malformed: {reason}")]
    ArchiveMalformed { reason: String },

    /// `--version` verification did not report the expected tool name.
    #[error("CORTEX-P013: binary verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// Filesystem operation during install failed.
    #[error("CORTEX-P014: install I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The download+extract+verify pipeline exceeded its overall deadline.
    #[error("CORTEX-P015: install timed out after {timeout_secs}s")]
    InstallTimeout { timeout_secs: u64 },

    /// The child process exited non-zero with stderr output.
    #[error("CORTEX-P020: {stderr}")]
    SubprocessFailed { stderr: String },

    /// The child process exceeded its execution deadline.
    #[error("CORTEX-P021: pattern search timed out (30s)")]
    Timeout,

    /// The caller's cancellation token fired before completion.
    #[error("CORTEX-P022: pattern search cancelled")]
    Cancelled,

    /// The child's stdout was not a valid JSON match array.
    #[error("CORTEX-P023: failed to parse pattern output: {0}")]
    OutputParse(#[from] serde_json::Error),
}

impl PatternError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            PatternError::InvalidRequest { .. } => "CORTEX-P001",
            PatternError::PathOutsideRoot { .. } => "CORTEX-P002",
            PatternError::UnsupportedPlatform { .. } => "CORTEX-P010",
            PatternError::DownloadFailed(_) => "CORTEX-P011",
            PatternError::ArchiveMalformed { .. } => "CORTEX-P012",
            PatternError::VerificationFailed { .. } => "CORTEX-P013",
            PatternError::Io(_) => "CORTEX-P014",
            PatternError::InstallTimeout { .. } => "CORTEX-P015",
            PatternError::SubprocessFailed { .. } => "CORTEX-P020",
            PatternError::Timeout => "CORTEX-P021",
            PatternError::Cancelled => "CORTEX-P022",
            PatternError::OutputParse(_) => "CORTEX-P023",
        }
    }
}
