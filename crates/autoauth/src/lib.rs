//! autoauth: drive password-prompting ssh/scp children and report a verdict.
//!
//! Commands that ask for credentials mid-stream cannot simply be fed from a
//! pipe: the prompts, their order, and their timing are not known up front.
//! This crate spawns such a command on a pseudo-terminal, watches its
//! output for known prompts, answers them, and reconciles what it observed
//! with the real exit status into a single [`Verdict`].
//!
//! # Layers
//!
//! - [`TemplateContext`]: `{key}` substitution for command strings.
//! - [`ProcessHandle`]: one spawned [`Process`] with idle-timeout waits.
//! - [`ResponseTable`]: ordered pattern/action entries.
//! - [`authenticate`]: the two-phase automaton.
//! - [`Session`] and [`InteractiveSession`]: ssh/scp helpers over all of
//!   the above, with [`SyncSession`] for blocking callers.
//!
//! The PTY backend is Unix-only.
//!
//! # Example
//!
//! ```no_run
//! use autoauth::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut session = Session::builder()
//!         .user("backup")
//!         .node("10.0.0.5")
//!         .secret("hunter2")
//!         .build()?;
//!
//!     let options = SpawnOptions::new().exit_code("Permission denied", 42);
//!     if let Err(e) = session.spawn_ssh("tar czf /tmp/etc.tgz /etc", &options).await {
//!         eprintln!("{e}");
//!         std::process::exit(e.exit_code());
//!     }
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod expect;
pub mod mock;
pub mod prelude;
pub mod process;
pub mod session;
pub mod sync;
pub mod table;
pub mod template;
pub mod types;
pub mod verdict;

pub use auth::{AuthOptions, DEFAULT_FAILURE_MESSAGE, authenticate};
pub use command::run;
pub use config::{BinaryConfig, CaptureMode, EnvConfig, LineEnding, SessionConfig, TimeoutConfig};
pub use error::{ExpectError, Result, SpawnError};
pub use expect::{PASSWORD_PROMPT, Pattern, SHELL_PROMPT, YES_NO_PROMPT};
pub use process::{
    LaunchRequest, Launcher, OutputSink, Process, ProcessHandle, PtyLauncher, PtyProcess, WaitOutcome,
};
pub use session::{InteractiveSession, Session, SessionBuilder, SpawnOptions};
pub use sync::SyncSession;
pub use table::{Action, EOF_EXIT_CODE, PatternEntry, ResponseTable, TIMEOUT_EXIT_CODE};
pub use template::TemplateContext;
pub use types::{Dimensions, ProcessExitStatus, SessionId};
pub use verdict::{Failure, FailureKind, Verdict};
