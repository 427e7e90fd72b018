//! Blocking wrapper around [`Session`].
//!
//! For callers without an async runtime. Each [`SyncSession`] owns a
//! current-thread Tokio runtime and blocks on it for every operation.
//!
//! ```no_run
//! use autoauth::{Session, SpawnOptions, SyncSession};
//!
//! # fn main() -> autoauth::Result<()> {
//! let builder = Session::builder().user("admin").node("db01").secret("hunter2");
//! let mut session = SyncSession::new(builder)?;
//! session.spawn_ssh("uptime", &SpawnOptions::new())?;
//! session.close()?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use tokio::runtime::{Builder, Runtime};

use crate::error::{ExpectError, Result};
use crate::process::{Launcher, PtyLauncher};
use crate::session::{Session, SessionBuilder, SpawnOptions};
use crate::types::ProcessExitStatus;
use crate::verdict::Verdict;

/// A [`Session`] driven from synchronous code.
#[derive(Debug)]
pub struct SyncSession<L: Launcher = PtyLauncher> {
    runtime: Runtime,
    inner: Session<L>,
}

impl<L: Launcher> SyncSession<L> {
    /// Build the session and its runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or the session cannot be created.
    pub fn new(builder: SessionBuilder<L>) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ExpectError::io_context("creating tokio runtime", e))?;
        let inner = builder.build()?;
        Ok(Self { runtime, inner })
    }

    /// The wrapped session.
    #[must_use]
    pub const fn session(&self) -> &Session<L> {
        &self.inner
    }

    /// The wrapped session, mutably.
    pub const fn session_mut(&mut self) -> &mut Session<L> {
        &mut self.inner
    }

    /// See [`Session::spawn_ssh`].
    ///
    /// # Errors
    ///
    /// [`ExpectError::Failed`] when the run does not succeed.
    pub fn spawn_ssh(&mut self, command: &str, options: &SpawnOptions) -> Result<()> {
        self.runtime.block_on(self.inner.spawn_ssh(command, options))
    }

    /// See [`Session::ssh_verdict`].
    ///
    /// # Errors
    ///
    /// Returns spawn, template, and I/O errors.
    pub fn ssh_verdict(&mut self, command: &str, options: &SpawnOptions) -> Result<Verdict> {
        self.runtime.block_on(self.inner.ssh_verdict(command, options))
    }

    /// See [`Session::spawn_scp`].
    ///
    /// # Errors
    ///
    /// [`ExpectError::Failed`] when the copy does not succeed.
    pub fn spawn_scp(&mut self, args: &str, options: &SpawnOptions) -> Result<()> {
        self.runtime.block_on(self.inner.spawn_scp(args, options))
    }

    /// See [`Session::run`].
    ///
    /// # Errors
    ///
    /// [`ExpectError::CommandFailed`] on a non-zero exit.
    pub fn run(&self, command: &str, cwd: Option<&str>) -> Result<()> {
        self.runtime.block_on(self.inner.run(command, cwd))
    }

    /// See [`Session::ssh_keygen`].
    ///
    /// # Errors
    ///
    /// [`ExpectError::CommandFailed`] on a non-zero exit.
    pub fn ssh_keygen(&self, modifier: Option<&str>) -> Result<()> {
        self.runtime.block_on(self.inner.ssh_keygen(modifier))
    }

    /// See [`Session::cd`].
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a directory.
    pub fn cd(&mut self, path: &str) -> Result<()> {
        self.inner.cd(path)
    }

    /// See [`Session::close`].
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be reaped.
    pub fn close(&mut self) -> Result<Option<ProcessExitStatus>> {
        self.runtime.block_on(self.inner.close())
    }

    /// Run any future on the session's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl<L: Launcher> Drop for SyncSession<L> {
    fn drop(&mut self) {
        if !self.inner.is_closed() {
            if let Err(e) = self.runtime.block_on(self.inner.close()) {
                tracing::warn!(error = %e, "Failed to close session on drop");
            }
        }
    }
}
