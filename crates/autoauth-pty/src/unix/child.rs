//! Child processes attached to a PTY slave.

use std::ffi::OsStr;
use std::io;
use std::os::unix::io::OwnedFd;
use std::process::Stdio;

use rustix::process::{Pid, Signal, kill_process};
use tokio::process::{Child, Command};

use crate::config::{PtyConfig, PtySignal};
use crate::error::{PtyError, Result};
use crate::status::ExitStatus;

/// Handle to a child running on a PTY.
///
/// The child is killed if the handle is dropped while it is still running.
pub struct PtyChild {
    child: Child,
    pid: u32,
    status: Option<ExitStatus>,
}

impl std::fmt::Debug for PtyChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyChild")
            .field("pid", &self.pid)
            .field("status", &self.status)
            .finish()
    }
}

impl PtyChild {
    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Check whether the child has not been reaped yet.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.status.is_none()
    }

    /// Wait for the child to exit. The status is cached once reaped.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Wait`] if `waitpid` fails.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        let status = ExitStatus::from(self.child.wait().await.map_err(PtyError::Wait)?);
        tracing::trace!(pid = self.pid, %status, "Reaped PTY child");
        self.status = Some(status);
        Ok(status)
    }

    /// Check for exit without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Wait`] if `waitpid` fails.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }

        let status = self
            .child
            .try_wait()
            .map_err(PtyError::Wait)?
            .map(ExitStatus::from);
        self.status = status;
        Ok(status)
    }

    /// Send a signal to the child.
    ///
    /// Signalling an already reaped child is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Signal`] if delivery fails.
    pub fn signal(&self, signal: PtySignal) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        let invalid = |what: &str| PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, what.to_string()));
        let pid = i32::try_from(self.pid)
            .ok()
            .and_then(Pid::from_raw)
            .ok_or_else(|| invalid("invalid pid"))?;
        let sig = Signal::from_named_raw(signal.as_unix_signal()).ok_or_else(|| invalid("invalid signal"))?;

        match kill_process(pid, sig) {
            // Exited but not yet reaped.
            Ok(()) | Err(rustix::io::Errno::SRCH) => Ok(()),
            Err(e) => Err(PtyError::Signal(io::Error::from_raw_os_error(e.raw_os_error()))),
        }
    }

    /// Kill the child with SIGKILL.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Signal`] if delivery fails.
    pub fn kill(&self) -> Result<()> {
        self.signal(PtySignal::Kill)
    }
}

/// Start `program` with the PTY slave as its stdin, stdout and stderr.
///
/// The parent's copy of `slave_fd` is closed on return so that the master
/// observes EOF once the child side is gone.
pub(crate) fn spawn_child<S, I>(slave_fd: OwnedFd, program: S, args: I, config: &PtyConfig) -> Result<PtyChild>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let program = program.as_ref();
    let spawn_err = |source: io::Error| PtyError::Spawn {
        program: program.to_string_lossy().into_owned(),
        source,
    };

    let stdin = slave_fd.try_clone().map_err(spawn_err)?;
    let stdout = slave_fd.try_clone().map_err(spawn_err)?;
    let stderr = slave_fd;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .env_clear()
        .envs(config.effective_env())
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);

    if let Some(ref dir) = config.working_directory {
        cmd.current_dir(dir);
    }

    if config.controlling_terminal {
        // SAFETY: only async-signal-safe calls between fork and exec. Stdio
        // has already been redirected, so fd 0 is the slave.
        #[allow(unsafe_code)]
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(0, libc::TIOCSCTTY, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let child = cmd.spawn().map_err(spawn_err)?;
    let pid = child
        .id()
        .ok_or_else(|| spawn_err(io::Error::other("child exited before its pid was read")))?;

    Ok(PtyChild {
        child,
        pid,
        status: None,
    })
}
