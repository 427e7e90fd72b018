//! Scripted processes for driving sessions without a real child.
//!
//! A [`Script`] is a list of steps replayed through [`AsyncRead`]: output
//! chunks, pauses until the next line is written, and end of stream. After
//! the last step the process hangs, producing neither output nor EOF, until
//! it is terminated.
//!
//! ```
//! use autoauth::mock::Script;
//!
//! let (process, probe) = Script::new()
//!     .output("Password: ")
//!     .await_line()
//!     .output("welcome\n")
//!     .eof()
//!     .exit(0)
//!     .build();
//! # drop(process);
//! assert!(probe.sent_lines().is_empty());
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::{Result, SpawnError};
use crate::process::{LaunchRequest, Launcher, Process};
use crate::types::ProcessExitStatus;

/// Status reported for a script without an explicit exit: hung up.
const HANGUP: ProcessExitStatus = ProcessExitStatus::Signaled(1);

#[derive(Debug)]
enum Step {
    Output(Vec<u8>),
    AwaitLine,
    Eof,
}

#[derive(Debug, Default)]
struct State {
    steps: VecDeque<Step>,
    partial: Vec<u8>,
    sent: Vec<String>,
    unread_lines: usize,
    terminate_calls: usize,
    closed: bool,
    waker: Option<Waker>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for a [`ScriptedProcess`].
#[derive(Debug, Default)]
pub struct Script {
    steps: VecDeque<Step>,
    exit: Option<ProcessExitStatus>,
    fail_writes: bool,
}

impl Script {
    /// An empty script: the process hangs at once.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit text.
    #[must_use]
    pub fn output(self, text: impl Into<String>) -> Self {
        self.output_bytes(text.into().into_bytes())
    }

    /// Emit raw bytes.
    #[must_use]
    pub fn output_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.steps.push_back(Step::Output(bytes.into()));
        self
    }

    /// Pause until a line has been written.
    #[must_use]
    pub fn await_line(mut self) -> Self {
        self.steps.push_back(Step::AwaitLine);
        self
    }

    /// End the output stream. Later steps are never reached.
    #[must_use]
    pub fn eof(mut self) -> Self {
        self.steps.push_back(Step::Eof);
        self
    }

    /// Exit with `code` when terminated.
    #[must_use]
    pub const fn exit(mut self, code: i32) -> Self {
        self.exit = Some(ProcessExitStatus::Exited(code));
        self
    }

    /// Report `status` when terminated.
    #[must_use]
    pub const fn exit_status(mut self, status: ProcessExitStatus) -> Self {
        self.exit = Some(status);
        self
    }

    /// Make every write fail.
    #[must_use]
    pub const fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Create the process and a probe observing it.
    #[must_use]
    pub fn build(self) -> (ScriptedProcess, ScriptProbe) {
        let state = Arc::new(Mutex::new(State {
            steps: self.steps,
            ..State::default()
        }));
        let process = ScriptedProcess {
            state: Arc::clone(&state),
            exit: self.exit.unwrap_or(HANGUP),
            fail_writes: self.fail_writes,
        };
        (process, ScriptProbe { state })
    }
}

/// A [`Process`] replaying a [`Script`].
#[derive(Debug)]
pub struct ScriptedProcess {
    state: Arc<Mutex<State>>,
    exit: ProcessExitStatus,
    fail_writes: bool,
}

impl Process for ScriptedProcess {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn terminate(&mut self, _grace: Duration) -> impl Future<Output = Result<ProcessExitStatus>> + Send {
        let mut state = lock(&self.state);
        state.terminate_calls += 1;
        state.closed = true;
        std::future::ready(Ok(self.exit))
    }
}

impl AsyncRead for ScriptedProcess {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        loop {
            if state.closed {
                return Poll::Ready(Ok(()));
            }
            match state.steps.front_mut() {
                Some(Step::Output(bytes)) => {
                    let n = bytes.len().min(buf.remaining());
                    buf.put_slice(&bytes[..n]);
                    bytes.drain(..n);
                    if bytes.is_empty() {
                        state.steps.pop_front();
                    }
                    return Poll::Ready(Ok(()));
                }
                Some(Step::AwaitLine) if state.unread_lines > 0 => {
                    state.unread_lines -= 1;
                    state.steps.pop_front();
                }
                Some(Step::Eof) => return Poll::Ready(Ok(())),
                Some(Step::AwaitLine) | None => {
                    state.waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
            }
        }
    }
}

impl AsyncWrite for ScriptedProcess {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::Error::other("scripted write failure")));
        }

        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.closed {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }

        state.partial.extend_from_slice(buf);
        while let Some(pos) = state.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = state.partial.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            state.sent.push(line.trim_end_matches(['\r', '\n']).to_string());
            state.unread_lines += 1;
        }
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Observes a [`ScriptedProcess`] after it has been handed off.
#[derive(Debug, Clone)]
pub struct ScriptProbe {
    state: Arc<Mutex<State>>,
}

impl ScriptProbe {
    /// Lines written to the process, without line endings.
    #[must_use]
    pub fn sent_lines(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }

    /// How many times the process was terminated.
    #[must_use]
    pub fn terminate_calls(&self) -> usize {
        lock(&self.state).terminate_calls
    }

    /// Check whether the process has been terminated.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

#[derive(Debug, Default)]
struct LauncherState {
    queue: VecDeque<ScriptedProcess>,
    requests: Vec<LaunchRequest>,
}

/// A [`Launcher`] handing out scripted processes in order.
///
/// Launching with an empty queue fails with a command-not-found error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl ScriptedLauncher {
    /// A launcher with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script, returning its probe.
    pub fn push(&self, script: Script) -> ScriptProbe {
        let (process, probe) = script.build();
        lock(&self.state).queue.push_back(process);
        probe
    }

    /// Every request seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<LaunchRequest> {
        lock(&self.state).requests.clone()
    }
}

impl Launcher for ScriptedLauncher {
    type Process = ScriptedProcess;

    fn launch(&self, request: &LaunchRequest) -> impl Future<Output = Result<ScriptedProcess>> + Send {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());
        let result: Result<ScriptedProcess> = state.queue.pop_front().ok_or_else(|| {
            let program = request.argv.first().cloned().unwrap_or_default();
            SpawnError::command_not_found(program).into()
        });
        std::future::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn output_is_gated_on_lines() {
        let (mut process, probe) = Script::new()
            .output("Password: ")
            .await_line()
            .output("ok\n")
            .eof()
            .build();

        let mut buf = [0u8; 64];
        let n = process.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Password: ");

        let pending = tokio::time::timeout(Duration::from_millis(20), process.read(&mut buf)).await;
        assert!(pending.is_err());

        process.write_all(b"secret\n").await.unwrap();
        let n = process.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ok\n");
        assert_eq!(process.read(&mut buf).await.unwrap(), 0);
        assert_eq!(probe.sent_lines(), vec!["secret"]);
    }

    #[tokio::test]
    async fn terminate_counts_and_closes() {
        let (mut process, probe) = Script::new().exit(5).build();

        assert_eq!(process.terminate(Duration::ZERO).await.unwrap(), ProcessExitStatus::Exited(5));
        assert_eq!(probe.terminate_calls(), 1);
        assert!(probe.is_closed());

        let mut buf = [0u8; 8];
        assert_eq!(process.read(&mut buf).await.unwrap(), 0);
        assert!(process.write_all(b"late\n").await.is_err());
    }

    #[tokio::test]
    async fn unscripted_exit_is_hangup() {
        let (mut process, _) = Script::new().build();
        assert_eq!(process.terminate(Duration::ZERO).await.unwrap(), HANGUP);
    }

    #[tokio::test]
    async fn launcher_hands_out_in_order() {
        let launcher = ScriptedLauncher::new();
        let first = launcher.push(Script::new().exit(0));
        launcher.push(Script::new().exit(1));

        let request = LaunchRequest::new(vec!["ssh".into()], None);
        let mut process = launcher.launch(&request).await.unwrap();
        process.terminate(Duration::ZERO).await.unwrap();
        assert_eq!(first.terminate_calls(), 1);

        launcher.launch(&request).await.unwrap();
        assert!(launcher.launch(&request).await.is_err());
        assert_eq!(launcher.requests().len(), 3);
    }
}
