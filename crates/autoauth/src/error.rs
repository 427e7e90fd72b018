//! Error types for autoauth.
//!
//! Operational errors (spawn failures, template mistakes, I/O) live in
//! [`ExpectError`]. An authentication run that completes but does not
//! succeed is not an error of the automaton itself: it yields a
//! [`Failure`](crate::verdict::Failure), which session helpers surface as
//! [`ExpectError::Failed`].

use std::time::Duration;

use thiserror::Error;

use crate::verdict::Failure;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Context lines to show before/after truncation point.
const CONTEXT_LINES: usize = 3;

/// Format buffer content for display, truncating if necessary.
pub(crate) fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    let lines: Vec<&str> = buffer.lines().collect();
    let total_lines = lines.len();

    if buffer.len() <= MAX_BUFFER_DISPLAY || total_lines <= CONTEXT_LINES * 2 {
        return format!(
            "┌─ buffer ({} bytes, {} lines) ─────────────\n│ {}\n└────────────────────────────────────────",
            buffer.len(),
            total_lines,
            lines.join("\n│ ")
        );
    }

    let tail_lines = &lines[total_lines - CONTEXT_LINES * 2..];
    let hidden = total_lines - tail_lines.len();

    format!(
        "┌─ buffer ({} bytes, {} lines) ─────────────\n│ ... ({} lines hidden)\n│ {}\n└────────────────────────────────────────",
        buffer.len(),
        total_lines,
        hidden,
        tail_lines.join("\n│ ")
    )
}

fn format_timeout_error(duration: Duration, pattern: &str, buffer: &str) -> String {
    let buffer_snippet = format_buffer_snippet(buffer);

    format!(
        "timeout after {duration:?} without output matching any pattern\n\
         \n\
         Pattern: '{pattern}'\n\
         \n\
         {buffer_snippet}"
    )
}

fn format_eof_error(buffer: &str) -> String {
    let buffer_snippet = format_buffer_snippet(buffer);

    format!(
        "end of file reached before any pattern matched\n\
         \n\
         {buffer_snippet}"
    )
}

/// The main error type for autoauth operations.
#[derive(Debug, Error)]
pub enum ExpectError {
    /// Failed to spawn a process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A template referenced a key the context does not define.
    #[error("template '{template}' references undefined key '{key}'")]
    MissingKey {
        /// The undefined key.
        key: String,
        /// The template being formatted.
        template: String,
    },

    /// A template has an unbalanced or empty placeholder.
    #[error("malformed template '{template}' at byte {position}: {reason}")]
    MalformedTemplate {
        /// The template being formatted.
        template: String,
        /// Byte offset of the offending brace.
        position: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Input was sent to a process that has already terminated.
    #[error("process is not running")]
    ProcessClosed,

    /// The session was closed, either explicitly or after a mandatory
    /// authentication failed.
    #[error("session is closed")]
    SessionClosed,

    /// Idle timeout in an interactive expect.
    #[error("{}", format_timeout_error(*duration, pattern, buffer))]
    Timeout {
        /// The idle timeout that elapsed.
        duration: Duration,
        /// The patterns that were being searched for.
        pattern: String,
        /// Buffer contents at the time of timeout.
        buffer: String,
    },

    /// Output ended during an interactive expect.
    #[error("{}", format_eof_error(buffer))]
    Eof {
        /// Buffer contents when EOF was reached.
        buffer: String,
    },

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// A non-interactive command exited unsuccessfully.
    #[error("command failed with exit code {exit_code}: {command}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Its exit code (`128 + signal` when killed by a signal).
        exit_code: i32,
    },

    /// An authenticated command did not succeed.
    #[error("{0}")]
    Failed(Box<Failure>),
}

/// Errors related to process spawning.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Command not found.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found.
        command: String,
    },

    /// PTY allocation failed.
    #[error("failed to allocate PTY: {reason}")]
    PtyAllocation {
        /// The reason for the failure.
        reason: String,
    },

    /// The command line could not be split, or its program could not be executed.
    #[error("invalid command line '{command}': {reason}")]
    InvalidCommand {
        /// The offending command line.
        command: String,
        /// Why it was rejected.
        reason: String,
    },

    /// General I/O error during spawn.
    #[error("I/O error during spawn: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for autoauth operations.
pub type Result<T> = std::result::Result<T, ExpectError>;

impl ExpectError {
    /// Create a timeout error with the given details.
    pub fn timeout(duration: Duration, pattern: impl Into<String>, buffer: impl Into<String>) -> Self {
        Self::Timeout {
            duration,
            pattern: pattern.into(),
            buffer: buffer.into(),
        }
    }

    /// Create an EOF error.
    pub fn eof(buffer: impl Into<String>) -> Self {
        Self::Eof {
            buffer: buffer.into(),
        }
    }

    /// Create a missing key error.
    pub fn missing_key(key: impl Into<String>, template: impl Into<String>) -> Self {
        Self::MissingKey {
            key: key.into(),
            template: template.into(),
        }
    }

    /// Create a malformed template error.
    pub fn malformed_template(template: impl Into<String>, position: usize, reason: impl Into<String>) -> Self {
        Self::MalformedTemplate {
            template: template.into(),
            position,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, exit_code: i32) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O result with context.
    pub fn with_io_context<T>(result: std::io::Result<T>, context: impl Into<String>) -> Result<T> {
        result.map_err(|e| Self::io_context(context, e))
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is an EOF error.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Check if this is an authentication or command failure report.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Get the failure report, if this error carries one.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Exit code to surface to a caller of a session command.
    ///
    /// `1` for errors that carry no more specific code.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Failed(failure) => failure.exit_code(),
            Self::CommandFailed { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }

    /// Get the buffer contents if this error contains them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::Eof { buffer } => Some(buffer),
            Self::Failed(failure) => Some(failure.transcript()),
            _ => None,
        }
    }
}

impl From<Failure> for ExpectError {
    fn from(failure: Failure) -> Self {
        Self::Failed(Box::new(failure))
    }
}

impl SpawnError {
    /// Create a command not found error.
    pub fn command_not_found(command: impl Into<String>) -> Self {
        Self::CommandNotFound {
            command: command.into(),
        }
    }

    /// Create a PTY allocation error.
    pub fn pty_allocation(reason: impl Into<String>) -> Self {
        Self::PtyAllocation {
            reason: reason.into(),
        }
    }

    /// Create an invalid command error.
    pub fn invalid_command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

impl From<autoauth_pty::PtyError> for SpawnError {
    fn from(err: autoauth_pty::PtyError) -> Self {
        use autoauth_pty::PtyError;

        match err {
            PtyError::Spawn { program, source } if source.kind() == std::io::ErrorKind::NotFound => {
                Self::command_not_found(program)
            }
            PtyError::Spawn { program, source } => Self::invalid_command(program, source.to_string()),
            PtyError::Create(e) => Self::pty_allocation(e.to_string()),
            PtyError::Io(source) => Self::Io(source),
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::FailureKind;

    #[test]
    fn timeout_display_includes_pattern_and_buffer() {
        let err = ExpectError::timeout(Duration::from_secs(5), "password:", "Enter username: admin\n");
        let msg = err.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("password:"));
        assert!(msg.contains("admin"));
        assert!(err.is_timeout());
        assert!(!err.is_eof());
    }

    #[test]
    fn eof_display_empty_buffer() {
        let err = ExpectError::eof("");
        assert!(err.to_string().contains("empty buffer"));
        assert_eq!(err.buffer(), Some(""));
    }

    #[test]
    fn large_buffer_is_truncated() {
        let large_buffer: String = (0..50).fold(String::new(), |mut acc, i| {
            use std::fmt::Write;
            let _ = writeln!(acc, "Line {i}: Some content here");
            acc
        });

        let snippet = format_buffer_snippet(&large_buffer);
        assert!(snippet.contains("lines hidden"));
        assert!(snippet.contains("Line 49"));
        assert!(!snippet.contains("Line 10:"));
    }

    #[test]
    fn missing_key_names_key_and_template() {
        let err = ExpectError::missing_key("node", "ssh {user}@{node}");
        let msg = err.to_string();
        assert!(msg.contains("'node'"));
        assert!(msg.contains("ssh {user}@{node}"));
    }

    #[test]
    fn exit_code_defaults_to_one() {
        assert_eq!(ExpectError::ProcessClosed.exit_code(), 1);
        assert_eq!(ExpectError::command_failed("false", 7).exit_code(), 7);

        let failure = Failure::new(FailureKind::HandshakeFailed, "denied", "ssh n", 42);
        let err = ExpectError::from(failure);
        assert!(err.is_failure());
        assert_eq!(err.exit_code(), 42);
    }

    #[test]
    fn io_with_context() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "access denied",
        ));
        let err = ExpectError::with_io_context(result, "writing private log").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("writing private log"));
        assert!(msg.contains("access denied"));
    }

    #[test]
    fn pty_not_found_maps_to_command_not_found() {
        let err = autoauth_pty::PtyError::Spawn {
            program: "/usr/bin/nope".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let spawn = SpawnError::from(err);
        assert!(matches!(spawn, SpawnError::CommandNotFound { ref command } if command == "/usr/bin/nope"));
    }

    #[test]
    fn pty_exec_failure_keeps_program() {
        let err = autoauth_pty::PtyError::Spawn {
            program: "/srv/bin/backup.sh".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied"),
        };
        let spawn = SpawnError::from(err);
        assert!(matches!(spawn, SpawnError::InvalidCommand { ref command, .. } if command == "/srv/bin/backup.sh"));

        let msg = ExpectError::from(spawn).to_string();
        assert!(msg.contains("/srv/bin/backup.sh"));
        assert!(msg.contains("Permission denied"));
    }
}
