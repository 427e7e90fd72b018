//! Local, non-interactive commands.

use std::path::Path;

use crate::error::{ExpectError, Result, SpawnError};
use crate::types::ProcessExitStatus;

/// Run `command` through `<shell> -c` with inherited stdio and wait for it.
///
/// # Errors
///
/// Returns [`ExpectError::CommandFailed`] when the command exits non-zero
/// (`128 + signal` when it was killed), or a spawn error if the shell
/// cannot be started.
pub async fn run(command: &str, cwd: Option<&Path>, shell: &str) -> Result<()> {
    tracing::info!(%command, cwd = ?cwd, "Running command");

    let mut cmd = tokio::process::Command::new(shell);
    cmd.arg("-c").arg(command);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    let status = cmd.status().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExpectError::from(SpawnError::command_not_found(shell))
        } else {
            ExpectError::io_context(format!("running '{command}'"), e)
        }
    })?;

    let status = ProcessExitStatus::from(status);
    if status.success() {
        return Ok(());
    }

    tracing::warn!(%command, %status, "Command failed");
    Err(ExpectError::command_failed(command, status.exit_code()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success() {
        run("true", None, "/bin/sh").await.unwrap();
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let err = run("exit 7", None, "/bin/sh").await.unwrap_err();
        assert!(matches!(err, ExpectError::CommandFailed { exit_code: 7, .. }));
        assert!(err.to_string().contains("exit 7"));
    }

    #[tokio::test]
    async fn signal_maps_to_sentinel() {
        let err = run("kill -9 $$", None, "/bin/sh").await.unwrap_err();
        assert_eq!(err.exit_code(), 128 + 9);
    }

    #[tokio::test]
    async fn runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        run("touch marker", Some(dir.path()), "/bin/sh").await.unwrap();
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn missing_shell() {
        let err = run("true", None, "/nonexistent/sh").await.unwrap_err();
        assert!(matches!(err, ExpectError::Spawn(SpawnError::CommandNotFound { .. })));
    }
}
