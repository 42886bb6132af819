//! Command builder: turns a `PatternRequest` into an argv sequence.
//!
//! Never constructs a shell string — every user-controlled value becomes a
//! distinct argv entry, passed straight to the child process.

use crate::error::PatternError;
use crate::pattern::types::PatternRequest;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONTEXT_LINES: u32 = 3;
pub const MAX_CONTEXT_LINES: u32 = 10;
pub const DEFAULT_LIMIT: u32 = 50;
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 100;

/// A validated, ready-to-spawn command description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternCommand {
    pub args: Vec<String>,
    pub limit: u32,
    pub strictness: String,
}

/// Build the argv for an `ast-grep`-compatible invocation.
///
/// `project_root` must be an absolute, already-cleaned path; every entry of
/// `request.file_paths` is validated against it (§4.6 path safety) before
/// being folded into a single comma-joined `--globs` argument.
pub fn build(request: &PatternRequest, project_root: &Path) -> Result<PatternCommand, PatternError> {
    let context_lines = request.context_lines.unwrap_or(DEFAULT_CONTEXT_LINES);
    if context_lines > MAX_CONTEXT_LINES {
        return Err(PatternError::InvalidRequest {
            reason: format!("context_lines must be in [0, {MAX_CONTEXT_LINES}]"),
        });
    }

    let strictness = request.strictness.unwrap_or_default();

    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(PatternError::InvalidRequest {
            reason: format!("limit must be in [{MIN_LIMIT}, {MAX_LIMIT}]"),
        });
    }

    if request.pattern.trim().is_empty() {
        return Err(PatternError::InvalidRequest {
            reason: "pattern must not be empty".to_string(),
        });
    }

    let mut args = vec!["--pattern".to_string(), request.pattern.clone()];
    args.push("--lang".to_string());
    args.push(request.language.as_str().to_string());
    args.push("--json=compact".to_string());

    if context_lines > 0 {
        args.push("-C".to_string());
        args.push(context_lines.to_string());
    }

    args.push("--strictness".to_string());
    args.push(strictness.as_str().to_string());

    if !request.file_paths.is_empty() {
        let mut safe_paths = Vec::with_capacity(request.file_paths.len());
        for raw in &request.file_paths {
            safe_paths.push(validate_path_within_root(raw, project_root)?);
        }
        args.push("--globs".to_string());
        args.push(safe_paths.join(","));
    }

    args.push(".".to_string());

    tracing::debug!(argv = ?args, "built pattern command");
    Ok(PatternCommand { args, limit, strictness: strictness.as_str().to_string() })
}

/// Validate that `raw` (relative to `project_root`) resolves to a path
/// equal to, or a descendant of, `project_root` once joined and cleaned.
/// Returns the original relative string on success (ast-grep receives the
/// glob relative to its working directory, which is set to `project_root`).
fn validate_path_within_root(raw: &str, project_root: &Path) -> Result<String, PatternError> {
    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        return Err(PatternError::PathOutsideRoot { path: raw.to_string() });
    }

    let joined = project_root.join(candidate);
    let cleaned = clean_path(&joined);
    let clean_root = clean_path(project_root);

    if cleaned == clean_root || cleaned.starts_with(&clean_root) {
        Ok(raw.to_string())
    } else {
        Err(PatternError::PathOutsideRoot { path: raw.to_string() })
    }
}

/// Lexically clean a path: resolve `.`/`..` components without touching the
/// filesystem (equivalent to Go's `filepath.Clean`/`path.Clean`).
fn clean_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match out.last() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    _ => out.push(component),
                }
            }
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}
