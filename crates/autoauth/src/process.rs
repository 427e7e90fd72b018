//! Spawned processes and pattern waits over their output.
//!
//! A [`Process`] is anything that can be read from, written to, and
//! terminated: the PTY backend in production, a scripted mock in tests.
//! [`ProcessHandle`] owns one process together with its argument vector,
//! working directory, output sink, and match buffer, and offers the
//! operations the automaton is built from:
//!
//! - [`send_line`](ProcessHandle::send_line)
//! - [`await_pattern`](ProcessHandle::await_pattern), an idle-timeout wait
//!   returning a [`WaitOutcome`]
//! - [`close`](ProcessHandle::close), idempotent termination and reaping
//! - [`read_remaining`](ProcessHandle::read_remaining)

mod pty;
mod sink;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub use pty::{PtyLauncher, PtyProcess};
pub use sink::OutputSink;

use crate::config::{DEFAULT_BUFFER_SIZE, DEFAULT_CLOSE_TIMEOUT, LineEnding, SessionConfig};
use crate::error::{ExpectError, Result};
use crate::expect::{Matcher, Pattern};
use crate::types::{Dimensions, ProcessExitStatus};

/// Size of each read from the process.
const READ_CHUNK: usize = 4096;

/// A running child the automaton can drive.
pub trait Process: AsyncRead + AsyncWrite + Unpin + Send {
    /// OS process id, if there is one.
    fn pid(&self) -> Option<u32>;

    /// Stop the process if it is still running and reap it.
    ///
    /// `grace` bounds how long a hung-up child may take to exit before it
    /// is killed.
    fn terminate(&mut self, grace: Duration) -> impl Future<Output = Result<ProcessExitStatus>> + Send;
}

/// Everything needed to start one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Working directory, or the caller's when `None`.
    pub cwd: Option<PathBuf>,
    /// Terminal size.
    pub dimensions: Dimensions,
    /// Variables added to the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl LaunchRequest {
    /// Create a request with default terminal size and environment.
    #[must_use]
    pub fn new(argv: Vec<String>, cwd: Option<PathBuf>) -> Self {
        Self {
            argv,
            cwd,
            dimensions: Dimensions::default(),
            env: BTreeMap::new(),
        }
    }

    /// The argument vector rendered as a shell-quoted command line.
    #[must_use]
    pub fn command_line(&self) -> String {
        shell_words::join(&self.argv)
    }
}

/// Starts processes for a session.
pub trait Launcher: Send + Sync {
    /// The kind of process this launcher starts.
    type Process: Process;

    /// Start the process described by `request`.
    fn launch(&self, request: &LaunchRequest) -> impl Future<Output = Result<Self::Process>> + Send;
}

/// Result of [`ProcessHandle::await_pattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A pattern matched. Output up to the end of the match is consumed.
    Matched {
        /// Index of the matching pattern in the list passed to the wait.
        index: usize,
        /// Output preceding the match.
        before: String,
        /// The matched text.
        matched: String,
        /// Unconsumed output after the match.
        after: String,
    },

    /// The output stream ended. All remaining output is consumed.
    Eof {
        /// Output that arrived without matching.
        buffer: String,
    },

    /// No output arrived for a full timeout period. Nothing is consumed.
    Timeout {
        /// Unconsumed output at the time of the timeout.
        buffer: String,
    },
}

impl WaitOutcome {
    /// Check if a pattern matched.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// Check if the stream ended.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Check if the wait timed out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Index of the matched pattern.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::Matched { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// One spawned process, exclusively owned by the session that spawned it.
pub struct ProcessHandle<P: Process> {
    process: P,
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    sink: OutputSink,
    matcher: Matcher,
    line_ending: LineEnding,
    close_grace: Duration,
    eof: bool,
    status: Option<ProcessExitStatus>,
    /// Output consumed by the most recent wait.
    last_consumed: String,
}

impl<P: Process> ProcessHandle<P> {
    /// Wrap a started process.
    pub fn new(process: P, argv: Vec<String>, cwd: Option<PathBuf>, sink: OutputSink) -> Self {
        Self {
            process,
            argv,
            cwd,
            sink,
            matcher: Matcher::new(DEFAULT_BUFFER_SIZE),
            line_ending: LineEnding::default(),
            close_grace: DEFAULT_CLOSE_TIMEOUT,
            eof: false,
            status: None,
            last_consumed: String::new(),
        }
    }

    /// Apply line ending, close grace period, and buffer size from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &SessionConfig) -> Self {
        self.line_ending = config.line_ending;
        self.close_grace = config.timeout.close;
        self.matcher = Matcher::new(config.buffer_size);
        self
    }

    /// The argument vector.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The argument vector rendered as a command line.
    #[must_use]
    pub fn command_line(&self) -> String {
        shell_words::join(&self.argv)
    }

    /// The working directory the process was started in.
    #[must_use]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// OS process id.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Check whether the handle has not been closed.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.status.is_none()
    }

    /// Check whether the output stream has ended.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.eof
    }

    /// Terminal status, once closed.
    #[must_use]
    pub const fn status(&self) -> Option<ProcessExitStatus> {
        self.status
    }

    /// The output sink.
    #[must_use]
    pub const fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Get the underlying process.
    #[must_use]
    pub const fn process(&self) -> &P {
        &self.process
    }

    /// Write `text` followed by the configured line ending.
    ///
    /// # Errors
    ///
    /// [`ExpectError::ProcessClosed`] if the handle has been closed or the
    /// terminal is gone.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        if self.status.is_some() {
            return Err(ExpectError::ProcessClosed);
        }

        let data = format!("{text}{}", self.line_ending.as_str());
        let write = async {
            self.process.write_all(data.as_bytes()).await?;
            self.process.flush().await
        };
        write.await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                ExpectError::ProcessClosed
            } else {
                ExpectError::io_context("writing to process", e)
            }
        })?;

        tracing::debug!(pid = ?self.pid(), bytes = data.len(), "Sent line");
        Ok(())
    }

    /// Wait until one of `patterns` matches, the output ends, or no output
    /// arrives for `timeout`.
    ///
    /// The timeout restarts whenever output arrives. Output read while
    /// waiting is copied to the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the process or writing to the sink
    /// fails.
    pub async fn await_pattern(&mut self, patterns: &[Pattern], timeout: Duration) -> Result<WaitOutcome> {
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if let Some(result) = self.matcher.try_match_any(patterns) {
                let consumed = self.matcher.consume_match(&result);
                tracing::debug!(
                    pid = ?self.pid(),
                    index = result.pattern_index,
                    pattern = %patterns[result.pattern_index],
                    "Pattern matched"
                );

                self.last_consumed = format!("{}{}", consumed.before, consumed.matched);
                return Ok(WaitOutcome::Matched {
                    index: result.pattern_index,
                    before: consumed.before,
                    matched: consumed.matched,
                    after: consumed.after,
                });
            }

            if self.eof || self.status.is_some() {
                let buffer = self.matcher.take_all();
                tracing::debug!(pid = ?self.pid(), "Output ended");
                // A repeated wait at end of stream keeps the last transcript.
                if !buffer.is_empty() {
                    self.last_consumed.clone_from(&buffer);
                }
                return Ok(WaitOutcome::Eof { buffer });
            }

            match tokio::time::timeout(timeout, self.process.read(&mut buf)).await {
                Ok(Ok(0)) => self.eof = true,
                Ok(Ok(n)) => {
                    ExpectError::with_io_context(self.sink.write(&buf[..n]), "copying process output")?;
                    self.matcher.append(&buf[..n]);
                }
                Ok(Err(e)) => return Err(ExpectError::io_context("reading from process", e)),
                Err(_) => {
                    tracing::debug!(pid = ?self.pid(), ?timeout, "Wait timed out");
                    self.last_consumed.clear();
                    return Ok(WaitOutcome::Timeout {
                        buffer: self.matcher.buffer_str().to_string(),
                    });
                }
            }
        }
    }

    /// Remove and return output that no wait has consumed.
    pub fn read_remaining(&mut self) -> String {
        self.matcher.take_all()
    }

    /// Output consumed by the last wait that consumed any, followed by
    /// everything unconsumed.
    ///
    /// Drains the buffer.
    pub fn take_transcript(&mut self) -> String {
        let mut transcript = std::mem::take(&mut self.last_consumed);
        transcript.push_str(&self.read_remaining());
        transcript
    }

    /// Contents of the private log, if output goes to one (best effort).
    pub fn read_log(&mut self) -> Option<String> {
        self.sink.read_log()
    }

    /// Terminate and reap the process.
    ///
    /// Only the first call reaches the process; later calls return the
    /// recorded status.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be reaped. The handle is
    /// still marked closed, with [`ProcessExitStatus::Unknown`].
    pub async fn close(&mut self) -> Result<ProcessExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        let result = self.process.terminate(self.close_grace).await;
        let status = *result.as_ref().unwrap_or(&ProcessExitStatus::Unknown);
        self.status = Some(status);

        if let Err(e) = self.sink.flush() {
            tracing::warn!(error = %e, "Failed to flush process output");
        }

        match result {
            Ok(status) => {
                tracing::debug!(pid = ?self.pid(), %status, "Process closed");
                Ok(status)
            }
            Err(e) => {
                tracing::warn!(pid = ?self.pid(), error = %e, "Failed to reap process");
                Err(e)
            }
        }
    }
}

impl<P: Process> std::fmt::Debug for ProcessHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("argv", &self.argv)
            .field("cwd", &self.cwd)
            .field("pid", &self.pid())
            .field("eof", &self.eof)
            .field("status", &self.status)
            .finish()
    }
}
