//! Binary provider: installs, verifies, and caches the pinned `ast-grep`
//! binary, guarded so concurrent callers trigger at most one install.

use crate::config::{ProviderConfig, DOWNLOAD_BASE_URL};
use crate::error::PatternError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const BINARY_NAME: &str = "ast-grep";

/// One of the platform tags the pinned binary is published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformTag {
    DarwinArm64,
    DarwinAmd64,
    LinuxArm64,
    LinuxAmd64,
    WindowsAmd64,
}

impl PlatformTag {
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformTag::DarwinArm64 => "darwin-arm64",
            PlatformTag::DarwinAmd64 => "darwin-amd64",
            PlatformTag::LinuxArm64 => "linux-arm64",
            PlatformTag::LinuxAmd64 => "linux-amd64",
            PlatformTag::WindowsAmd64 => "windows-amd64",
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, PlatformTag::WindowsAmd64)
    }
}

/// Detect the current platform, mapping `(os, arch)` to one of the five
/// supported tags. Any other combination is a fatal error.
pub fn detect_platform() -> Result<PlatformTag, PatternError> {
    detect_platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

fn detect_platform_for(os: &str, arch: &str) -> Result<PlatformTag, PatternError> {
    match (os, arch) {
        ("macos", "aarch64") => Ok(PlatformTag::DarwinArm64),
        ("macos", "x86_64") => Ok(PlatformTag::DarwinAmd64),
        ("linux", "aarch64") => Ok(PlatformTag::LinuxArm64),
        ("linux", "x86_64") => Ok(PlatformTag::LinuxAmd64),
        ("windows", "x86_64") => Ok(PlatformTag::WindowsAmd64),
        _ => Err(PatternError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

fn binary_filename(platform: PlatformTag) -> &'static str {
    if platform.is_windows() {
        "ast-grep.exe"
    } else {
        "ast-grep"
    }
}

fn download_url(config: &ProviderConfig, platform: PlatformTag) -> String {
    format!(
        "{base}/ast-grep-v{version}-{platform}.zip",
        base = DOWNLOAD_BASE_URL,
        version = config.version,
        platform = platform.as_str(),
    )
}

struct State {
    initialised: bool,
    path: Option<PathBuf>,
}

/// Manages a single on-disk copy of the pinned `ast-grep` binary.
pub struct BinaryProvider {
    config: ProviderConfig,
    state: Arc<Mutex<State>>,
}

impl BinaryProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(State { initialised: false, path: None })),
        }
    }

    fn cache_path(&self, platform: PlatformTag) -> PathBuf {
        self.config.cache_root.join("bin").join(binary_filename(platform))
    }

    /// Ensure the pinned binary is installed and verified, returning its
    /// resolved path. Concurrent callers observe a single install attempt;
    /// once installed, subsequent calls are lock-free-ish (the lock is held
    /// only long enough to read the flag).
    pub async fn ensure_installed(&self, cancel: &CancellationToken) -> Result<PathBuf, PatternError> {
        {
            let guard = self.state.lock().await;
            if guard.initialised {
                if let Some(path) = &guard.path {
                    return Ok(path.clone());
                }
            }
        }

        let mut guard = self.state.lock().await;
        // Re-check after acquiring the lock: another caller may have
        // finished installing while we waited.
        if guard.initialised {
            if let Some(path) = &guard.path {
                return Ok(path.clone());
            }
        }

        let platform = detect_platform()?;
        let cache_path = self.cache_path(platform);

        let resolved = if cache_path.exists() {
            match verify(&cache_path, self.config.verify_timeout, cancel).await {
                Ok(()) => {
                    tracing::info!(path = %cache_path.display(), "using cached ast-grep binary");
                    cache_path
                }
                Err(e) => {
                    tracing::warn!(path = %cache_path.display(), error = %e, "cached binary failed verification, reinstalling");
                    install(&self.config, platform, &cache_path, cancel).await?
                }
            }
        } else {
            install(&self.config, platform, &cache_path, cancel).await?
        };

        guard.initialised = true;
        guard.path = Some(resolved.clone());
        Ok(resolved)
    }
}

/// Run the download+extract+verify pipeline under `config.install_timeout`.
async fn install(
    config: &ProviderConfig,
    platform: PlatformTag,
    cache_path: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf, PatternError> {
    match tokio::time::timeout(config.install_timeout, install_attempt(config, platform, cache_path, cancel)).await {
        Ok(result) => result,
        Err(_) => Err(PatternError::InstallTimeout {
            timeout_secs: config.install_timeout.as_secs(),
        }),
    }
}

async fn install_attempt(
    config: &ProviderConfig,
    platform: PlatformTag,
    cache_path: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf, PatternError> {
    let parent = cache_path.parent().expect("cache path has a parent directory");
    tokio::fs::create_dir_all(parent).await?;

    tracing::info!(platform = platform.as_str(), "installing pinned ast-grep binary");

    let url = download_url(config, platform);
    let archive_path = parent.join(format!("ast-grep-{}.zip", std::process::id()));
    download(&url, &archive_path, cancel).await?;

    let extracted = extract_binary(&archive_path, parent, binary_filename(platform))?;
    let _ = std::fs::remove_file(&archive_path);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&extracted)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&extracted, perms)?;
    }

    // Same-filesystem rename: atomic onto the final cache path.
    std::fs::rename(&extracted, cache_path)?;

    if let Err(e) = verify(cache_path, config.verify_timeout, cancel).await {
        let _ = std::fs::remove_file(cache_path);
        return Err(PatternError::VerificationFailed {
            reason: format!("verification failed after fresh download: {e}"),
        });
    }

    tracing::info!(path = %cache_path.display(), "ast-grep installed");
    Ok(cache_path.to_path_buf())
}

async fn download(url: &str, dest: &Path, cancel: &CancellationToken) -> Result<(), PatternError> {
    let client = reqwest::Client::new();
    let request = client.get(url).send();

    let response = tokio::select! {
        result = request => result?,
        _ = cancel.cancelled() => return Err(PatternError::Cancelled),
    };
    let response = response.error_for_status()?;

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();

    use futures::StreamExt;
    loop {
        let next = stream.next();
        tokio::select! {
            chunk = next => {
                match chunk {
                    Some(chunk) => {
                        let chunk = chunk?;
                        file.write_all(&chunk).await?;
                    }
                    None => break,
                }
            }
            _ = cancel.cancelled() => return Err(PatternError::Cancelled),
        }
    }
    file.flush().await?;
    Ok(())
}

/// Extract the single archive entry whose basename matches `expected_name`
/// into `dest_dir`, returning its path.
fn extract_binary(archive_path: &Path, dest_dir: &Path, expected_name: &str) -> Result<PathBuf, PatternError> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| PatternError::ArchiveMalformed {
        reason: e.to_string(),
    })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| PatternError::ArchiveMalformed {
            reason: e.to_string(),
        })?;
        let name = entry
            .enclosed_name()
            .ok_or_else(|| PatternError::ArchiveMalformed {
                reason: "archive entry has an unsafe path".to_string(),
            })?
            .to_path_buf();
        if name.file_name().and_then(|n| n.to_str()) == Some(expected_name) {
            let out_path = dest_dir.join(format!("{expected_name}.extracted-{}", std::process::id()));
            let mut out = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
            return Ok(out_path);
        }
    }

    Err(PatternError::ArchiveMalformed {
        reason: format!("archive does not contain expected binary '{expected_name}'"),
    })
}

/// Run `<binary> --version` and require the output to mention `ast-grep`,
/// subject to `verify_timeout`.
async fn verify(path: &Path, verify_timeout: std::time::Duration, cancel: &CancellationToken) -> Result<(), PatternError> {
    let mut cmd = Command::new(path);
    cmd.arg("--version");
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| PatternError::VerificationFailed { reason: e.to_string() })?;
    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    tokio::select! {
        result = child.wait() => { result.map_err(|e| PatternError::VerificationFailed { reason: e.to_string() })?; }
        _ = tokio::time::sleep(verify_timeout) => {
            child.kill().await.ok();
            return Err(PatternError::VerificationFailed {
                reason: format!("version check timed out after {}s", verify_timeout.as_secs()),
            });
        }
        _ = cancel.cancelled() => {
            child.kill().await.ok();
            return Err(PatternError::Cancelled);
        }
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    use tokio::io::AsyncReadExt;
    stdout_pipe.read_to_end(&mut stdout).await.map_err(|e| PatternError::VerificationFailed { reason: e.to_string() })?;
    stderr_pipe.read_to_end(&mut stderr).await.map_err(|e| PatternError::VerificationFailed { reason: e.to_string() })?;

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&stdout),
        String::from_utf8_lossy(&stderr)
    );

    if combined.contains(BINARY_NAME) {
        Ok(())
    } else {
        Err(PatternError::VerificationFailed {
            reason: "output does not mention ast-grep".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_platforms() {
        assert_eq!(detect_platform_for("linux", "x86_64").unwrap(), PlatformTag::LinuxAmd64);
        assert_eq!(detect_platform_for("macos", "aarch64").unwrap(), PlatformTag::DarwinArm64);
        assert_eq!(detect_platform_for("windows", "x86_64").unwrap(), PlatformTag::WindowsAmd64);
    }

    #[test]
    fn unsupported_platform_is_fatal() {
        assert!(detect_platform_for("freebsd", "x86_64").is_err());
        assert!(detect_platform_for("linux", "mips").is_err());
    }

    #[test]
    fn download_url_uses_pinned_version_and_platform() {
        let config = ProviderConfig::default();
        let url = download_url(&config, PlatformTag::LinuxAmd64);
        assert!(url.starts_with(DOWNLOAD_BASE_URL));
        assert!(url.contains("linux-amd64"));
        assert!(url.contains(&config.version));
    }

    /// A tiny shell script, written to `dir`, that ignores its arguments and
    /// sleeps forever — used to exercise the `verify()` deadline without
    /// depending on a real `ast-grep` binary's `--version` behavior.
    fn hanging_script(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("hangs");
        std::fs::write(&path, "#!/bin/sh\nsleep 5\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn verify_times_out_on_a_hanging_binary() {
        let dir = tempfile::tempdir().unwrap();
        let script = hanging_script(dir.path());
        let cancel = CancellationToken::new();
        let err = verify(&script, std::time::Duration::from_millis(50), &cancel)
            .await
            .unwrap_err();
        match err {
            PatternError::VerificationFailed { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected VerificationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_rejects_output_missing_binary_name() {
        let cancel = CancellationToken::new();
        let err = verify(Path::new("/bin/echo"), std::time::Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PatternError::VerificationFailed { .. }));
    }

    #[tokio::test]
    async fn ensure_installed_is_single_flight_under_concurrency() {
        // Without a real network/binary in the test sandbox we only assert
        // that concurrent callers serialize through the same mutex and do
        // not panic or deadlock; the install itself will fail fast because
        // there is no reachable download endpoint, which is an acceptable
        // outcome for this invariant check.
        let config = ProviderConfig {
            cache_root: tempfile::tempdir().unwrap().into_path(),
            ..ProviderConfig::default()
        };
        let provider = Arc::new(BinaryProvider::new(config));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let provider = provider.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move { provider.ensure_installed(&cancel).await }));
        }
        for h in handles {
            let _ = h.await;
        }
    }
}
