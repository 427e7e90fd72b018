//! Processes running on a pseudo-terminal.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use autoauth_pty::{PtyChild, PtyConfig, PtyError, PtyMaster, PtySignal};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::{LaunchRequest, Launcher, Process};
use crate::error::{ExpectError, Result, SpawnError};
use crate::types::ProcessExitStatus;

/// A child attached to the slave side of a PTY.
#[derive(Debug)]
pub struct PtyProcess {
    master: PtyMaster,
    child: PtyChild,
    eof: bool,
}

impl PtyProcess {
    /// Wrap a spawned child and its master.
    #[must_use]
    pub const fn new(master: PtyMaster, child: PtyChild) -> Self {
        Self {
            master,
            child,
            eof: false,
        }
    }

    async fn wait(&mut self) -> Result<ProcessExitStatus> {
        self.child.wait().await.map(Into::into).map_err(wait_error)
    }
}

fn wait_error(e: PtyError) -> ExpectError {
    match e {
        PtyError::Io(source) | PtyError::Wait(source) | PtyError::Signal(source) => {
            ExpectError::io_context("terminating process", source)
        }
        other => ExpectError::io_context("terminating process", io::Error::other(other)),
    }
}

impl Process for PtyProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.child.pid())
    }

    /// Reap an exited child at once. Otherwise hang up the terminal, give
    /// the child `grace` to exit, and kill it if it is still there.
    async fn terminate(&mut self, grace: Duration) -> Result<ProcessExitStatus> {
        if let Some(status) = self.child.try_wait().map_err(wait_error)? {
            self.master.close();
            return Ok(status.into());
        }

        // A child whose output already ended is usually about to exit.
        if self.eof {
            if let Ok(status) = tokio::time::timeout(grace, self.wait()).await {
                self.master.close();
                return status;
            }
        }

        self.master.close();
        self.child.signal(PtySignal::Hangup).map_err(wait_error)?;
        self.child.signal(PtySignal::Continue).map_err(wait_error)?;

        if let Ok(status) = tokio::time::timeout(grace, self.wait()).await {
            return status;
        }

        tracing::debug!(pid = self.child.pid(), "Child ignored hangup, killing");
        self.child.kill().map_err(wait_error)?;
        self.wait().await
    }
}

impl AsyncRead for PtyProcess {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.master).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() == before && buf.remaining() > 0 {
            this.eof = true;
        }
        poll
    }
}

impl AsyncWrite for PtyProcess {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().master).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().master).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().master).poll_shutdown(cx)
    }
}

/// Starts children on fresh PTYs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtyLauncher;

impl Launcher for PtyLauncher {
    type Process = PtyProcess;

    async fn launch(&self, request: &LaunchRequest) -> Result<PtyProcess> {
        let Some((program, args)) = request.argv.split_first() else {
            return Err(SpawnError::invalid_command("", "empty argument vector").into());
        };

        let mut builder =
            PtyConfig::builder().window_size(request.dimensions.cols, request.dimensions.rows);
        if let Some(cwd) = &request.cwd {
            builder = builder.working_directory(cwd);
        }
        for (key, value) in &request.env {
            builder = builder.env(key, value);
        }
        let config = builder.build();

        let (master, child) = autoauth_pty::spawn(program, args, &config)
            .await
            .map_err(SpawnError::from)?;
        tracing::debug!(pid = child.pid(), command = %request.command_line(), "Launched process");
        Ok(PtyProcess::new(master, child))
    }
}
