//! Unix PTY master.
//!
//! The master is read and written through tokio's `AsyncFd`. Once every
//! slave descriptor is closed (the child and its descendants exited) Linux
//! reports `EIO` on read; that is surfaced as end-of-file.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcgetwinsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::WindowSize;
use crate::error::{PtyError, Result};

fn create_err(e: rustix::io::Errno) -> PtyError {
    PtyError::Create(io::Error::from_raw_os_error(e.raw_os_error()))
}

/// Master side of a pseudo-terminal.
///
/// Closing the master (explicitly or on drop) hangs up the terminal, which
/// delivers SIGHUP to the session leader running on it.
pub struct PtyMaster {
    async_fd: Option<AsyncFd<OwnedFd>>,
}

impl std::fmt::Debug for PtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyMaster")
            .field("fd", &self.async_fd.as_ref().map(AsRawFd::as_raw_fd))
            .finish()
    }
}

impl PtyMaster {
    /// Allocate a new PTY pair, returning the master and the slave path.
    ///
    /// # Errors
    ///
    /// Returns an error if PTY allocation fails.
    pub fn open() -> Result<(Self, String)> {
        let master_fd =
            openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY | OpenptFlags::CLOEXEC).map_err(create_err)?;
        grantpt(&master_fd).map_err(create_err)?;
        unlockpt(&master_fd).map_err(create_err)?;

        let slave_name = ptsname(&master_fd, Vec::new()).map_err(create_err)?;
        let slave_path = slave_name
            .to_str()
            .map_err(|_| {
                PtyError::Create(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid slave path encoding",
                ))
            })?
            .to_string();

        fcntl_setfl(&master_fd, OFlags::NONBLOCK).map_err(create_err)?;
        let async_fd = AsyncFd::new(master_fd).map_err(PtyError::Create)?;

        Ok((
            Self {
                async_fd: Some(async_fd),
            },
            slave_path,
        ))
    }

    /// Check if the master is still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.async_fd.is_some()
    }

    /// Set the window size.
    ///
    /// # Errors
    ///
    /// Returns an error if the master is closed or the ioctl fails.
    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        let fd = self.async_fd.as_ref().ok_or(PtyError::Closed)?;
        let winsize = Winsize {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        tcsetwinsize(fd.get_ref(), winsize)
            .map_err(|e| PtyError::Resize(io::Error::from_raw_os_error(e.raw_os_error())))
    }

    /// Get the current window size.
    ///
    /// # Errors
    ///
    /// Returns an error if the master is closed or the ioctl fails.
    pub fn window_size(&self) -> Result<WindowSize> {
        let fd = self.async_fd.as_ref().ok_or(PtyError::Closed)?;
        let winsize = tcgetwinsize(fd.get_ref())?;
        Ok(WindowSize::new(winsize.ws_col, winsize.ws_row))
    }

    /// Close the master descriptor.
    ///
    /// Subsequent reads report EOF and writes fail with `BrokenPipe`.
    pub fn close(&mut self) {
        if self.async_fd.take().is_some() {
            tracing::trace!("Closed PTY master");
        }
    }
}

impl AsRawFd for PtyMaster {
    /// Returns -1 once the master has been closed.
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }
}

impl AsyncRead for PtyMaster {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let Some(async_fd) = self.async_fd.as_ref() else {
            return Poll::Ready(Ok(()));
        };

        loop {
            let mut guard = match async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(async_fd.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                // All slave descriptors closed: the child side hung up.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => {
                    return Poll::Ready(Err(io::Error::from_raw_os_error(e.raw_os_error())));
                }
            }
        }
    }
}

impl AsyncWrite for PtyMaster {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let Some(async_fd) = self.async_fd.as_ref() else {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "PTY closed")));
        };

        loop {
            let mut guard = match async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(e) => {
                    return Poll::Ready(Err(io::Error::from_raw_os_error(e.raw_os_error())));
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.close();
        Poll::Ready(Ok(()))
    }
}

/// Open the slave side of a PTY for handing to a child.
///
/// # Errors
///
/// Returns an error if the slave device cannot be opened.
pub(crate) fn open_slave(path: &str) -> Result<OwnedFd> {
    open(
        Path::new(path),
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(create_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_pty() {
        let (master, slave_path) = PtyMaster::open().unwrap();
        assert!(master.is_open());
        assert!(slave_path.starts_with("/dev/pts/") || slave_path.starts_with("/dev/pty"));
    }

    #[tokio::test]
    async fn window_size_round_trips() {
        let (master, _) = PtyMaster::open().unwrap();

        master.set_window_size(WindowSize::new(120, 40)).unwrap();
        assert_eq!(master.window_size().unwrap(), WindowSize::new(120, 40));
    }

    #[tokio::test]
    async fn closed_master_rejects_operations() {
        let (mut master, _) = PtyMaster::open().unwrap();
        master.close();

        assert!(!master.is_open());
        assert_eq!(master.as_raw_fd(), -1);
        assert!(matches!(master.window_size(), Err(PtyError::Closed)));
    }
}
