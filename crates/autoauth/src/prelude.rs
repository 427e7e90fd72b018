//! Convenient re-exports for common autoauth usage.
//!
//! ```
//! use autoauth::prelude::*;
//!
//! let ctx = TemplateContext::for_host("admin", "db01");
//! assert_eq!(ctx.format("{user}@{node}").unwrap(), "admin@db01");
//! ```

// Sessions
pub use crate::session::{InteractiveSession, Session, SessionBuilder, SpawnOptions};
pub use crate::sync::SyncSession;

// Automaton
pub use crate::auth::{AuthOptions, authenticate};
pub use crate::verdict::{Failure, FailureKind, Verdict};

// Processes
pub use crate::process::{LaunchRequest, Launcher, OutputSink, Process, ProcessHandle, PtyLauncher, WaitOutcome};

// Patterns and templates
pub use crate::expect::{PASSWORD_PROMPT, Pattern, SHELL_PROMPT, YES_NO_PROMPT};
pub use crate::template::TemplateContext;

// Configuration
pub use crate::config::{CaptureMode, LineEnding, SessionConfig};

// Errors and common types
pub use crate::error::{ExpectError, Result};
pub use crate::types::ProcessExitStatus;
