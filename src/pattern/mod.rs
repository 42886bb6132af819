//! Pattern core: AST pattern search against the pinned `ast-grep` binary.
//!
//! Dependency order, leaves first: [`types`] → [`command`] → [`provider`] →
//! [`exec`] → [`transform`].

pub mod command;
pub mod exec;
pub mod provider;
pub mod transform;
pub mod types;

use crate::config::ProviderConfig;
use crate::error::PatternError;
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
pub use types::{PatternMatch, PatternRequest, PatternResponse, PatternResponseMetadata, Strictness};

/// Run one end-to-end pattern search: ensure the binary is installed, build
/// its argv, execute it under the deadline, and normalise its output.
pub async fn search(
    provider: &provider::BinaryProvider,
    request: &PatternRequest,
    project_root: &Path,
    config: &ProviderConfig,
    cancel: &CancellationToken,
) -> Result<PatternResponse, PatternError> {
    let start = Instant::now();

    let cmd = command::build(request, project_root)?;
    let binary_path = provider.ensure_installed(cancel).await?;
    let raw = exec::run(&binary_path, &cmd, project_root, config, cancel).await?;
    let (matches, total) = transform::transform(&raw.stdout, cmd.limit)?;

    Ok(PatternResponse {
        matches,
        total,
        metadata: PatternResponseMetadata {
            took_ms: start.elapsed().as_millis() as u64,
            pattern: request.pattern.clone(),
            language: request.language.as_str().to_string(),
            strictness: cmd.strictness,
        },
    })
}
