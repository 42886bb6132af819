//! Exec driver: spawns the prepared argv against the pinned binary and
//! enforces the execution deadline (spec §4.7).

use crate::config::ProviderConfig;
use crate::error::PatternError;
use crate::pattern::command::PatternCommand;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

pub struct RawOutput {
    pub stdout: Vec<u8>,
}

/// Run the pattern-matching binary with `cmd.args`, cwd set to
/// `project_root`, subject to `config.exec_timeout`.
///
/// On timeout or cancellation the child is killed rather than left to run
/// orphaned: `Child::wait` is used (by `&mut`, not the self-consuming
/// `wait_with_output`) so the other `select!` arms still hold a handle they
/// can call `kill()` on.
pub async fn run(
    binary_path: &Path,
    cmd: &PatternCommand,
    project_root: &Path,
    config: &ProviderConfig,
    cancel: &CancellationToken,
) -> Result<RawOutput, PatternError> {
    let mut command = Command::new(binary_path);
    command.args(&cmd.args);
    command.current_dir(project_root);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    let status = tokio::select! {
        result = child.wait() => result?,
        _ = tokio::time::sleep(config.exec_timeout) => {
            child.kill().await.ok();
            return Err(PatternError::Timeout);
        }
        _ = cancel.cancelled() => {
            child.kill().await.ok();
            return Err(PatternError::Cancelled);
        }
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    stdout_pipe.read_to_end(&mut stdout).await?;
    stderr_pipe.read_to_end(&mut stderr).await?;

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        if !stderr.is_empty() {
            return Err(PatternError::SubprocessFailed { stderr });
        }
        return Err(PatternError::SubprocessFailed {
            stderr: format!("process exited with status {:?}", status.code()),
        });
    }

    Ok(RawOutput { stdout })
}
