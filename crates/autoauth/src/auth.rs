//! The authentication automaton.
//!
//! A run has two phases. The handshake watches the output against a
//! [`ResponseTable`] until the secret is sent, the stream ends, the watch
//! times out, or a caller exit-code pattern fires. After the secret has
//! been sent, a second wait looks for signs of trouble (a repeated password
//! prompt, silence) before the process is closed and its real exit status
//! decides the [`Verdict`].
//!
//! ```no_run
//! use autoauth::prelude::*;
//!
//! # async fn example() -> autoauth::Result<()> {
//! let request = LaunchRequest::new(vec!["/usr/bin/ssh".into(), "admin@db01".into(), "uptime".into()], None);
//! let process = PtyLauncher.launch(&request).await?;
//! let mut handle = ProcessHandle::new(process, request.argv, None, OutputSink::Stdout);
//!
//! let options = AuthOptions::new().secret("hunter2").password_mandatory(true);
//! authenticate(&mut handle, &options).await?.into_result()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use crate::config::DEFAULT_TIMEOUT;
use crate::error::Result;
use crate::expect::Pattern;
use crate::process::{Process, ProcessHandle, WaitOutcome};
use crate::table::{Action, EOF_EXIT_CODE, ResponseTable, TIMEOUT_EXIT_CODE};
use crate::verdict::{Failure, FailureKind, Verdict};

/// Message used when the caller gives none.
pub const DEFAULT_FAILURE_MESSAGE: &str = "command failed";

const EOF_MESSAGE: &str = "stream ended before the password could be sent";
const TIMEOUT_MESSAGE: &str = "timed out before the password could be sent";
const NO_SECRET_MESSAGE: &str = "password requested but no secret is configured";
const INVALID_CREDENTIAL_MESSAGE: &str = "invalid credential";
const NOT_DONE_MESSAGE: &str = "process timed out after the password was sent";

/// Inputs to one automaton run.
#[derive(Clone)]
pub struct AuthOptions {
    secret: Option<String>,
    password_mandatory: bool,
    commands: Vec<(Pattern, String)>,
    exit_codes: Vec<(Pattern, i32)>,
    timeout: Duration,
    failure_message: String,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthOptions {
    /// Options with no secret, an optional password, and the default
    /// timeout and failure message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            secret: None,
            password_mandatory: false,
            commands: Vec::new(),
            exit_codes: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }

    /// Set the secret sent at the password prompt.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set or clear the secret.
    #[must_use]
    pub fn secret_opt(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    /// Fail when the stream ends before the password was sent.
    #[must_use]
    pub const fn password_mandatory(mut self, mandatory: bool) -> Self {
        self.password_mandatory = mandatory;
        self
    }

    /// Answer `pattern` with `response` and keep watching.
    #[must_use]
    pub fn command(mut self, pattern: Pattern, response: impl Into<String>) -> Self {
        self.commands.push((pattern, response.into()));
        self
    }

    /// End the handshake with `code` when `pattern` appears.
    #[must_use]
    pub fn exit_code(mut self, pattern: Pattern, code: i32) -> Self {
        self.exit_codes.push((pattern, code));
        self
    }

    /// Set the idle timeout of each wait.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the message reported for caller exit codes and failed commands.
    #[must_use]
    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    /// Check whether a secret is configured.
    #[must_use]
    pub const fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Get the idle timeout.
    #[must_use]
    pub const fn get_timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("password_mandatory", &self.password_mandatory)
            .field("commands", &self.commands.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .field("exit_codes", &self.exit_codes)
            .field("timeout", &self.timeout)
            .field("failure_message", &self.failure_message)
            .finish()
    }
}

/// How the handshake ended.
enum Handshake {
    SecretSent,
    /// Stream ended with no password required.
    Finished,
    Aborted { code: i32, message: String },
}

/// What the post-handshake wait suggested.
#[derive(Clone, Copy)]
enum Suspicion {
    WrongPassword,
    NotDone,
}

/// Drive `handle` through the handshake and reconcile its exit status.
///
/// The process is closed exactly once on every path, including when a
/// send or read fails midway.
///
/// # Errors
///
/// Returns an error for I/O failures while talking to the process. An
/// unsuccessful run is not an error; it is a [`Verdict::Failure`].
pub async fn authenticate<P: Process>(handle: &mut ProcessHandle<P>, options: &AuthOptions) -> Result<Verdict> {
    match run(handle, options).await {
        Ok(verdict) => Ok(verdict),
        Err(e) => {
            if let Err(close_err) = handle.close().await {
                tracing::warn!(error = %close_err, "Failed to close process after error");
            }
            Err(e)
        }
    }
}

async fn run<P: Process>(handle: &mut ProcessHandle<P>, options: &AuthOptions) -> Result<Verdict> {
    let command_line = handle.command_line();

    match handshake(handle, options).await? {
        Handshake::Aborted { code, message } => {
            let transcript = handle.take_transcript();
            handle.close().await?;
            let log = handle.read_log();

            tracing::warn!(command = %command_line, exit_code = code, %message, "Handshake failed");
            let failure = Failure::new(FailureKind::HandshakeFailed, message, command_line, code)
                .with_secret(options.secret.clone())
                .with_transcript(transcript)
                .with_log(log);
            Ok(failure.into())
        }
        Handshake::SecretSent => reconcile(handle, options, command_line, true).await,
        Handshake::Finished => reconcile(handle, options, command_line, false).await,
    }
}

async fn handshake<P: Process>(handle: &mut ProcessHandle<P>, options: &AuthOptions) -> Result<Handshake> {
    let table = ResponseTable::handshake(&options.commands, &options.exit_codes);
    let patterns = table.patterns();

    loop {
        match handle.await_pattern(&patterns, options.timeout).await? {
            WaitOutcome::Matched { index, .. } => {
                let Some(entry) = table.entry(index) else {
                    continue;
                };
                tracing::debug!(%entry, "Handshake entry matched");

                match &entry.action {
                    Action::RespondWithSecret => {
                        let Some(secret) = &options.secret else {
                            return Ok(Handshake::Aborted {
                                code: 1,
                                message: NO_SECRET_MESSAGE.to_string(),
                            });
                        };
                        handle.send_line(secret).await?;
                        return Ok(Handshake::SecretSent);
                    }
                    Action::RespondWith(response) => handle.send_line(response).await?,
                    Action::Terminate(code) => {
                        return Ok(Handshake::Aborted {
                            code: *code,
                            message: options.failure_message.clone(),
                        });
                    }
                }
            }
            WaitOutcome::Eof { .. } if !options.password_mandatory => {
                tracing::debug!("Output ended with no password prompt");
                return Ok(Handshake::Finished);
            }
            WaitOutcome::Eof { .. } => {
                return Ok(Handshake::Aborted {
                    code: EOF_EXIT_CODE,
                    message: EOF_MESSAGE.to_string(),
                });
            }
            WaitOutcome::Timeout { .. } => {
                return Ok(Handshake::Aborted {
                    code: TIMEOUT_EXIT_CODE,
                    message: TIMEOUT_MESSAGE.to_string(),
                });
            }
        }
    }
}

async fn reconcile<P: Process>(
    handle: &mut ProcessHandle<P>,
    options: &AuthOptions,
    command_line: String,
    secret_sent: bool,
) -> Result<Verdict> {
    // The secret is never sent twice.
    let suspicion = match handle.await_pattern(&[Pattern::password_prompt()], options.timeout).await? {
        WaitOutcome::Matched { .. } => Some(Suspicion::WrongPassword),
        WaitOutcome::Timeout { .. } => Some(Suspicion::NotDone),
        WaitOutcome::Eof { .. } => None,
    };

    let transcript = handle.take_transcript();
    let status = handle.close().await?;

    if status.success() {
        tracing::info!(command = %command_line, secret_sent, "Authenticated command succeeded");
        return Ok(Verdict::Success);
    }

    let (kind, message) = match suspicion {
        Some(Suspicion::WrongPassword) => (FailureKind::InvalidCredential, INVALID_CREDENTIAL_MESSAGE.to_string()),
        Some(Suspicion::NotDone) => (FailureKind::Timeout, NOT_DONE_MESSAGE.to_string()),
        None => (FailureKind::CommandFailed, options.failure_message.clone()),
    };
    tracing::warn!(command = %command_line, %status, %kind, "Authenticated command failed");

    let failure = Failure::new(kind, message, command_line, status.exit_code())
        .with_secret(options.secret.clone())
        .with_secret_offered(secret_sent)
        .with_signal(status.signal())
        .with_transcript(transcript)
        .with_log(handle.read_log());
    Ok(failure.into())
}
