//! Common types for autoauth.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exit status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessExitStatus {
    /// Process exited with a code.
    Exited(i32),

    /// Process was terminated by a signal.
    Signaled(i32),

    /// Exit status could not be collected.
    Unknown,
}

impl ProcessExitStatus {
    /// Check if the process exited successfully (code 0).
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code if the process exited normally.
    #[must_use]
    pub const fn code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Get the signal number if the process was signaled.
    #[must_use]
    pub const fn signal(self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(sig),
            _ => None,
        }
    }

    /// Exit code as a shell would report it.
    ///
    /// Signal terminations map to `128 + signal`; an unknown status maps
    /// to the generic failure code `1`.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(sig) => 128 + sig,
            Self::Unknown => 1,
        }
    }
}

impl fmt::Display for ProcessExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
            Self::Unknown => write!(f, "unknown exit status"),
        }
    }
}

impl From<std::process::ExitStatus> for ProcessExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(code) = status.code() {
                Self::Exited(code)
            } else if let Some(sig) = status.signal() {
                Self::Signaled(sig)
            } else {
                Self::Unknown
            }
        }

        #[cfg(not(unix))]
        {
            status.code().map_or(Self::Unknown, Self::Exited)
        }
    }
}

impl From<autoauth_pty::ExitStatus> for ProcessExitStatus {
    fn from(status: autoauth_pty::ExitStatus) -> Self {
        match status {
            autoauth_pty::ExitStatus::Exited(code) => Self::Exited(code),
            autoauth_pty::ExitStatus::Signaled(sig) => Self::Signaled(sig),
        }
    }
}

/// Terminal dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in columns.
    pub cols: u16,

    /// Height in rows.
    pub rows: u16,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Standard 80x24 terminal.
    pub const STANDARD: Self = Self::new(80, 24);
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl From<(u16, u16)> for Dimensions {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self::new(cols, rows)
    }
}

impl From<Dimensions> for (u16, u16) {
    fn from(dims: Dimensions) -> Self {
        (dims.cols, dims.rows)
    }
}

/// A unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new session ID.
    #[must_use]
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_checks() {
        assert!(ProcessExitStatus::Exited(0).success());
        assert!(!ProcessExitStatus::Exited(1).success());
        assert!(!ProcessExitStatus::Signaled(9).success());
        assert!(!ProcessExitStatus::Unknown.success());

        assert_eq!(ProcessExitStatus::Exited(42).code(), Some(42));
        assert_eq!(ProcessExitStatus::Signaled(9).signal(), Some(9));
        assert_eq!(ProcessExitStatus::Signaled(9).code(), None);
    }

    #[test]
    fn exit_code_sentinels() {
        assert_eq!(ProcessExitStatus::Exited(5).exit_code(), 5);
        assert_eq!(ProcessExitStatus::Signaled(1).exit_code(), 129);
        assert_eq!(ProcessExitStatus::Unknown.exit_code(), 1);
    }

    #[test]
    fn from_pty_status() {
        let status: ProcessExitStatus = autoauth_pty::ExitStatus::Signaled(15).into();
        assert_eq!(status, ProcessExitStatus::Signaled(15));
    }

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("session-"));
    }
}
