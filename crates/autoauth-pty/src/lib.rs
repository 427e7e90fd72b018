//! autoauth-pty: async pseudo-terminals for credential-prompting children.
//!
//! Programs such as `ssh` and `scp` refuse to read a password from a pipe;
//! they open `/dev/tty` instead. This crate allocates a PTY pair, starts the
//! child as a session leader whose controlling terminal is the slave side,
//! and hands back the master for async reading and writing together with a
//! handle that reaps the child and reports how it ended.
//!
//! # Quick Start
//!
//! ```ignore
//! use autoauth_pty::{PtyConfig, spawn};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut master, mut child) = spawn("/usr/bin/ssh", ["admin@10.0.0.5"], &PtyConfig::default()).await?;
//!
//!     let mut buf = [0u8; 1024];
//!     let n = master.read(&mut buf).await?;
//!     if String::from_utf8_lossy(&buf[..n]).contains("password:") {
//!         master.write_all(b"hunter2\n").await?;
//!     }
//!
//!     let status = child.wait().await?;
//!     println!("{status}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod status;

#[cfg(unix)]
pub mod unix;

pub use config::{PtyConfig, PtyConfigBuilder, PtySignal, WindowSize};
pub use error::{PtyError, Result};
pub use status::ExitStatus;

#[cfg(unix)]
pub use unix::{PtyChild, PtyMaster, spawn};
