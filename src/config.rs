//! Ambient configuration: pinned tool version, cache location, timeouts.
//!
//! Kept deliberately small: process startup and full configuration loading
//! are out of scope (spec §1), but the binary provider still needs a typed
//! surface for the handful of knobs it reads from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// The ast-grep release pinned by this crate.
pub const PINNED_AST_GREP_VERSION: &str = "0.31.1";

/// Base URL template for the pinned binary archive.
pub const DOWNLOAD_BASE_URL: &str = "https://project-cortex-files.t3.storage.dev";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub version: String,
    pub cache_root: PathBuf,
    pub install_timeout: Duration,
    pub verify_timeout: Duration,
    pub exec_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            version: std::env::var("CORTEX_AST_GREP_VERSION")
                .unwrap_or_else(|_| PINNED_AST_GREP_VERSION.to_string()),
            cache_root: cache_root(),
            install_timeout: Duration::from_secs(60),
            verify_timeout: Duration::from_secs(5),
            exec_timeout: Duration::from_secs(30),
        }
    }
}

fn cache_root() -> PathBuf {
    if let Ok(home) = std::env::var("CORTEX_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cortex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cortex_home_override_wins() {
        std::env::set_var("CORTEX_HOME", "/tmp/cortex-test-home");
        let cfg = ProviderConfig::default();
        assert_eq!(cfg.cache_root, PathBuf::from("/tmp/cortex-test-home"));
        std::env::remove_var("CORTEX_HOME");
    }
}
