//! Unix PTY implementation.
//!
//! - PTY pair allocation via `openpt`/`grantpt`/`unlockpt`
//! - Async master I/O through tokio's `AsyncFd`
//! - Child started as a session leader with the slave as controlling terminal

mod child;
mod pty;

use std::ffi::OsStr;

pub use child::PtyChild;
pub use pty::PtyMaster;

use crate::config::PtyConfig;
use crate::error::Result;

/// Spawn `program` with `args` on a freshly allocated PTY.
///
/// Returns the master side (read the child's output, write its input)
/// and the child handle.
///
/// # Errors
///
/// Returns [`PtyError::Create`](crate::PtyError::Create) if the PTY cannot
/// be allocated and [`PtyError::Spawn`](crate::PtyError::Spawn) if the
/// program cannot be started.
pub async fn spawn<S, I>(program: S, args: I, config: &PtyConfig) -> Result<(PtyMaster, PtyChild)>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let (master, slave_path) = PtyMaster::open()?;
    master.set_window_size(config.window_size.into())?;

    let slave_fd = pty::open_slave(&slave_path)?;
    let child = child::spawn_child(slave_fd, program, args, config)?;

    tracing::debug!(pid = child.pid(), slave = %slave_path, "Spawned child on PTY");
    Ok((master, child))
}
