//! Outcome of an authentication run.

use std::fmt;

use serde::Serialize;

use crate::error::{ExpectError, Result, format_buffer_snippet};

/// Why an authenticated command did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The handshake ended before the credential was sent: the stream ended
    /// while a password was mandatory, the watch timed out, or a caller
    /// exit-code pattern fired.
    HandshakeFailed,

    /// A second password prompt appeared after the credential was sent.
    InvalidCredential,

    /// The process went quiet after the credential was sent.
    Timeout,

    /// The process ran and exited unsuccessfully.
    CommandFailed,
}

impl FailureKind {
    /// Short lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HandshakeFailed => "handshake failed",
            Self::InvalidCredential => "invalid credential",
            Self::Timeout => "timeout",
            Self::CommandFailed => "command failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic record of a failed run.
///
/// Built once at the point of failure, capturing the transcript and the
/// private log by value before the process handle is released. The
/// supplied secret is kept for auditing, sent or not, but left out of
/// [`Display`] and of the JSON form.
///
/// [`Display`]: fmt::Display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    kind: FailureKind,
    message: String,
    command_line: String,
    secret_offered: bool,
    #[serde(skip)]
    secret: Option<String>,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal: Option<i32>,
    transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log: Option<String>,
}

impl Failure {
    /// Create a failure with an empty transcript.
    pub fn new(kind: FailureKind, message: impl Into<String>, command_line: impl Into<String>, exit_code: i32) -> Self {
        Self {
            kind,
            message: message.into(),
            command_line: command_line.into(),
            secret_offered: false,
            secret: None,
            exit_code,
            signal: None,
            transcript: String::new(),
            log: None,
        }
    }

    /// Keep the supplied secret for audit, whether or not it was sent.
    #[must_use]
    pub fn with_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    /// Record whether the secret was sent to the process.
    #[must_use]
    pub const fn with_secret_offered(mut self, offered: bool) -> Self {
        self.secret_offered = offered;
        self
    }

    /// Record the terminating signal.
    #[must_use]
    pub const fn with_signal(mut self, signal: Option<i32>) -> Self {
        self.signal = signal;
        self
    }

    /// Attach the output seen before close.
    #[must_use]
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    /// Attach the private log contents.
    #[must_use]
    pub fn with_log(mut self, log: Option<String>) -> Self {
        self.log = log;
        self
    }

    /// Failure kind.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The command line that was run.
    #[must_use]
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Whether a credential was sent.
    #[must_use]
    pub const fn secret_offered(&self) -> bool {
        self.secret_offered
    }

    /// The credential that was sent, if any.
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Exit code, `128 + signal` when the process was killed by a signal.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Terminating signal, if known.
    #[must_use]
    pub const fn signal(&self) -> Option<i32> {
        self.signal
    }

    /// Output consumed by the last wait plus whatever was left unread.
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Private log contents, when output was captured to one.
    #[must_use]
    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ExpectError::config(format!("serializing failure: {e}")))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(f)?;
        writeln!(f, "Command: {}", self.command_line)?;
        writeln!(f, "Secret offered: {}", self.secret_offered)?;
        writeln!(f, "Exit code: {}", self.exit_code)?;
        if let Some(signal) = self.signal {
            writeln!(f, "Signal: {signal}")?;
        }
        writeln!(f)?;
        let output = self.log.as_deref().unwrap_or(&self.transcript);
        write!(f, "{}", format_buffer_snippet(output))
    }
}

impl std::error::Error for Failure {}

/// Final outcome of one automaton run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The process exited with status 0 and nothing went wrong.
    Success,

    /// Something went wrong; see the report.
    Failure(Box<Failure>),
}

impl Verdict {
    /// Check for success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The failure report, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Success => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Exit code: `0` on success.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.failure().map_or(0, Failure::exit_code)
    }

    /// Turn a failure into [`ExpectError::Failed`].
    ///
    /// # Errors
    ///
    /// Returns the failure as an error.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::Failure(failure) => Err(ExpectError::Failed(failure)),
        }
    }
}

impl From<Failure> for Verdict {
    fn from(failure: Failure) -> Self {
        Self::Failure(Box::new(failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Failure {
        Failure::new(
            FailureKind::InvalidCredential,
            "invalid credential",
            "/usr/bin/ssh admin@db01 uptime",
            255,
        )
        .with_secret(Some("hunter2".to_string()))
        .with_secret_offered(true)
        .with_transcript("admin@db01's password: \nPermission denied, please try again.\n")
    }

    #[test]
    fn display_hides_secret() {
        let failure = sample();
        let text = failure.to_string();
        assert!(text.starts_with("invalid credential"));
        assert!(text.contains("Command: /usr/bin/ssh admin@db01 uptime"));
        assert!(text.contains("Secret offered: true"));
        assert!(text.contains("Exit code: 255"));
        assert!(text.contains("Permission denied"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("Signal:"));
        assert_eq!(failure.secret(), Some("hunter2"));
    }

    #[test]
    fn display_prefers_log() {
        let failure = sample().with_log(Some("full log line\n".to_string()));
        let text = failure.to_string();
        assert!(text.contains("full log line"));
        assert!(!text.contains("please try again"));
    }

    #[test]
    fn json_omits_secret() {
        let json = sample().with_signal(Some(9)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "invalid_credential");
        assert_eq!(value["secret_offered"], true);
        assert_eq!(value["signal"], 9);
        assert!(value.get("secret").is_none());
        assert!(value.get("log").is_none());
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn verdict_into_result() {
        assert!(Verdict::Success.into_result().is_ok());
        assert_eq!(Verdict::Success.exit_code(), 0);

        let verdict = Verdict::from(sample());
        assert!(!verdict.is_success());
        assert_eq!(verdict.exit_code(), 255);
        let err = verdict.into_result().unwrap_err();
        assert_eq!(err.failure().map(Failure::kind), Some(FailureKind::InvalidCredential));
    }

    #[test]
    fn secret_kept_when_not_offered() {
        let failure = Failure::new(FailureKind::HandshakeFailed, "refused", "ssh n", 42)
            .with_secret(Some("hunter2".to_string()));
        assert!(!failure.secret_offered());
        assert_eq!(failure.secret(), Some("hunter2"));
        assert!(failure.to_string().contains("Secret offered: false"));
    }

    #[test]
    fn secret_offered_without_secret() {
        let failure = Failure::new(FailureKind::CommandFailed, "boom", "ssh n", 1).with_secret_offered(true);
        assert!(failure.secret_offered());
        assert!(failure.secret().is_none());
    }
}
