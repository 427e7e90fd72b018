//! Sessions that keep a process open for scripted exchanges.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::log::PrivateLog;
use super::state::SessionCore;
use super::{SpawnOptions, create_log, open_sink};
use crate::config::{CaptureMode, SessionConfig};
use crate::error::{ExpectError, Result, SpawnError};
use crate::expect::{Pattern, describe};
use crate::process::{Launcher, ProcessHandle, PtyLauncher, WaitOutcome};
use crate::template::TemplateContext;
use crate::types::{ProcessExitStatus, SessionId};
use crate::verdict::{Failure, FailureKind};

/// A session whose process stays open between calls.
///
/// Output is echoed to stdout unless the configuration says otherwise.
///
/// ```no_run
/// use autoauth::prelude::*;
///
/// # async fn example() -> autoauth::Result<()> {
/// let mut session = Session::builder().user("admin").node("db01").build_interactive()?;
/// session.spawn_ssh(&SpawnOptions::new()).await?;
///
/// if session.expect(&[PASSWORD_PROMPT, SHELL_PROMPT], None).await? == 0 {
///     session.send("hunter2").await?;
/// }
/// session.expect(&[SHELL_PROMPT], None).await?;
/// session.send("uptime").await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct InteractiveSession<L: Launcher = PtyLauncher> {
    core: SessionCore<L>,
    capture: CaptureMode,
    log: Option<PrivateLog>,
    closed: bool,
}

impl<L: Launcher> InteractiveSession<L> {
    pub(crate) fn new(
        context: TemplateContext,
        config: SessionConfig,
        working_dir: Option<PathBuf>,
        launcher: L,
    ) -> Result<Self> {
        let capture = config.capture.unwrap_or(CaptureMode::Inherit);
        let log = create_log(capture)?;
        Ok(Self {
            core: SessionCore::new(context, config, working_dir, launcher),
            capture,
            log,
            closed: false,
        })
    }

    /// Session identifier, used in log events.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.core.id()
    }

    /// The template context.
    #[must_use]
    pub const fn context(&self) -> &TemplateContext {
        self.core.context()
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        self.core.config()
    }

    /// The launcher processes are started with.
    #[must_use]
    pub const fn launcher(&self) -> &L {
        self.core.launcher()
    }

    /// The session working directory.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.core.working_dir()
    }

    /// The current process.
    #[must_use]
    pub const fn process(&self) -> Option<&ProcessHandle<L::Process>> {
        self.core.handle()
    }

    /// Check whether the session has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Overlay template parameters.
    pub fn update_parameters<I, K, V>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.core.update_parameters(updates);
    }

    /// Format a template with the session context.
    ///
    /// # Errors
    ///
    /// See [`TemplateContext::format`].
    pub fn format(&self, template: &str) -> Result<String> {
        self.core.format(template)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(ExpectError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Set the session working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the formatted path is not a directory.
    pub fn cd(&mut self, path: &str) -> Result<()> {
        self.ensure_open()?;
        self.core.cd(path)
    }

    /// Run a formatted command locally through the shell.
    ///
    /// # Errors
    ///
    /// [`ExpectError::CommandFailed`] on a non-zero exit.
    pub async fn run(&self, command: &str, cwd: Option<&str>) -> Result<()> {
        self.ensure_open()?;
        self.core.run(command, cwd).await
    }

    /// Run `ssh-keygen <modifier> "{node}"`, `-R` by default.
    ///
    /// # Errors
    ///
    /// [`ExpectError::CommandFailed`] on a non-zero exit.
    pub async fn ssh_keygen(&self, modifier: Option<&str>) -> Result<()> {
        self.ensure_open()?;
        self.core.ssh_keygen(modifier).await
    }

    async fn spawn(&mut self, argv: Vec<String>, cwd: Option<PathBuf>) -> Result<()> {
        self.ensure_open()?;
        let sink = open_sink(self.capture, self.log.as_ref())?;
        self.core.spawn(argv, cwd, sink).await
    }

    /// Open an ssh shell on the node.
    ///
    /// Uses the modifier, user, and node of `options`.
    ///
    /// # Errors
    ///
    /// Returns spawn and template errors.
    pub async fn spawn_ssh(&mut self, options: &SpawnOptions) -> Result<()> {
        let mut argv = vec![self.core.config().binaries.ssh.clone()];
        argv.extend(options.destination_args(&self.core)?);
        self.spawn(argv, None).await
    }

    /// Start an executable. The formatted command is split into words; no
    /// shell is involved, so pipes and wildcards are passed through as-is.
    ///
    /// # Errors
    ///
    /// Returns spawn and template errors.
    pub async fn spawn_sh(&mut self, command: &str, cwd: Option<&str>) -> Result<()> {
        let argv = self.core.split(command)?;
        if argv.is_empty() {
            return Err(SpawnError::invalid_command(command, "empty command").into());
        }
        let cwd = self.core.child_dir(cwd)?;
        self.spawn(argv, cwd).await
    }

    /// Start `ssh-copy-id <user>@<node>`.
    ///
    /// Uses the user and node of `options`, and its modifier only when one
    /// is given.
    ///
    /// # Errors
    ///
    /// Returns spawn and template errors.
    pub async fn spawn_ssh_copy_id(&mut self, options: &SpawnOptions) -> Result<()> {
        let mut argv = vec![self.core.config().binaries.ssh_copy_id.clone()];
        if let Some(modifier) = &options.modifier {
            argv.extend(self.core.split(modifier)?);
        }
        argv.push(options.destination(&self.core)?);
        self.spawn(argv, None).await
    }

    /// Send a formatted line to the process.
    ///
    /// # Errors
    ///
    /// [`ExpectError::ProcessClosed`] if nothing is running.
    pub async fn send(&mut self, command: &str) -> Result<()> {
        self.ensure_open()?;
        let line = self.core.format(command)?;
        self.core.handle_mut()?.send_line(&line).await
    }

    /// Wait for one of the regex `patterns`, returning the index of the one
    /// that matched. `timeout` defaults to the configured idle timeout.
    ///
    /// # Errors
    ///
    /// [`ExpectError::Eof`] or [`ExpectError::Timeout`] when nothing
    /// matched, [`ExpectError::Regex`] for an invalid pattern.
    pub async fn expect(&mut self, patterns: &[&str], timeout: Option<Duration>) -> Result<usize> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::regex(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let timeout = timeout.unwrap_or(self.core.config().timeout.default);

        match self.expect_patterns(&patterns, timeout).await? {
            WaitOutcome::Matched { index, .. } => Ok(index),
            WaitOutcome::Eof { buffer } => Err(ExpectError::eof(buffer)),
            WaitOutcome::Timeout { buffer } => Err(ExpectError::timeout(timeout, describe(&patterns), buffer)),
        }
    }

    /// Wait for one of `patterns`, returning the raw outcome.
    ///
    /// # Errors
    ///
    /// [`ExpectError::ProcessClosed`] if nothing is running, or an I/O
    /// error.
    pub async fn expect_patterns(&mut self, patterns: &[Pattern], timeout: Duration) -> Result<WaitOutcome> {
        self.ensure_open()?;
        self.core.handle_mut()?.await_pattern(patterns, timeout).await
    }

    /// Drain output no wait has consumed.
    ///
    /// # Errors
    ///
    /// [`ExpectError::ProcessClosed`] if nothing was spawned.
    pub fn read_remaining(&mut self) -> Result<String> {
        Ok(self.core.handle_mut()?.read_remaining())
    }

    /// Close the process and build the error describing why.
    ///
    /// The returned error is [`ExpectError::Failed`] carrying the command
    /// line, transcript, and `secret` (when one was sent).
    pub async fn fail(&mut self, message: &str, exit_code: i32, secret: Option<&str>) -> ExpectError {
        let log = self.log.as_ref();
        let (command_line, transcript, signal) = match self.core.handle_mut() {
            Ok(handle) => {
                let transcript = handle.take_transcript();
                let status = handle.close().await.unwrap_or(ProcessExitStatus::Unknown);
                (handle.command_line(), transcript, status.signal())
            }
            Err(_) => (String::new(), String::new(), None),
        };
        tracing::warn!(session = %self.core.id(), command = %command_line, exit_code, %message, "Interactive command failed");

        Failure::new(FailureKind::CommandFailed, message, command_line, exit_code)
            .with_secret(secret.map(str::to_string))
            .with_secret_offered(secret.is_some())
            .with_signal(signal)
            .with_transcript(transcript)
            .with_log(log.and_then(PrivateLog::read))
            .into()
    }

    /// Close the process and remove the private log, if any.
    ///
    /// Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be reaped.
    pub async fn close(&mut self) -> Result<Option<ProcessExitStatus>> {
        if self.closed {
            return Ok(self.core.handle().and_then(ProcessHandle::status));
        }
        self.closed = true;

        let status = self.core.close_process().await;
        if let Some(log) = self.log.take() {
            ExpectError::with_io_context(log.close(), "removing private log")?;
        }
        tracing::debug!(session = %self.core.id(), "Session closed");
        status
    }
}

impl<L: Launcher> fmt::Debug for InteractiveSession<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractiveSession")
            .field("id", &self.core.id())
            .field("capture", &self.capture)
            .field("working_dir", &self.core.working_dir())
            .field("process", &self.core.handle())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::{PASSWORD_PROMPT, SHELL_PROMPT};
    use crate::mock::{Script, ScriptedLauncher};
    use crate::session::SessionBuilder;

    fn session() -> InteractiveSession<ScriptedLauncher> {
        SessionBuilder::new()
            .user("admin")
            .node("db01")
            .param("greeting", "hello")
            .launcher(ScriptedLauncher::new())
            .config(SessionConfig::new().capture(CaptureMode::Discard))
            .build_interactive()
            .unwrap()
    }

    #[tokio::test]
    async fn expect_returns_matched_index() {
        let mut session = session();
        let probe = session.launcher().push(
            Script::new()
                .output("admin@db01's password: ")
                .await_line()
                .output("Last login: today\r\nadmin@db01:~$ ")
                .await_line()
                .output("hello\r\n"),
        );

        session.spawn_ssh(&SpawnOptions::new()).await.unwrap();
        assert_eq!(session.expect(&[SHELL_PROMPT, PASSWORD_PROMPT], None).await.unwrap(), 1);
        session.send("hunter2").await.unwrap();
        assert_eq!(session.expect(&[SHELL_PROMPT, PASSWORD_PROMPT], None).await.unwrap(), 0);
        session.send("echo {greeting}").await.unwrap();

        assert_eq!(probe.sent_lines(), vec!["hunter2", "echo hello"]);
        assert_eq!(
            session.launcher().requests()[0].argv,
            vec!["/usr/bin/ssh", "-o", "LogLevel=Error", "admin@db01"]
        );
    }

    #[tokio::test]
    async fn expect_eof_and_timeout_are_errors() {
        let mut session = session();
        session.launcher().push(Script::new().output("bye\n").eof());
        session.launcher().push(Script::new().output("waiting"));

        session.spawn_sh("/bin/true", None).await.unwrap();
        let err = session.expect(&["never"], None).await.unwrap_err();
        assert!(err.is_eof());
        assert_eq!(err.buffer(), Some("bye\n"));

        session.spawn_sh("/bin/true", None).await.unwrap();
        let err = session
            .expect(&["never"], Some(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn spawn_sh_splits_without_shell() {
        let mut session = session();
        session.launcher().push(Script::new());

        session.spawn_sh("/usr/bin/env 'A B' {node}", Some("/tmp")).await.unwrap();
        let request = &session.launcher().requests()[0];
        assert_eq!(request.argv, vec!["/usr/bin/env", "A B", "db01"]);
        assert_eq!(request.cwd, Some(PathBuf::from("/tmp")));
    }

    #[tokio::test]
    async fn ssh_copy_id_destination() {
        let mut session = session();
        session.launcher().push(Script::new());

        session
            .spawn_ssh_copy_id(&SpawnOptions::new().user("root"))
            .await
            .unwrap();
        assert_eq!(session.launcher().requests()[0].argv, vec!["ssh-copy-id", "root@db01"]);
    }

    #[tokio::test]
    async fn fail_closes_and_reports() {
        let mut session = session();
        let probe = session
            .launcher()
            .push(Script::new().output("Permission denied (publickey).\r\n"));

        session.spawn_ssh(&SpawnOptions::new()).await.unwrap();
        let err = session.expect(&["denied"], None).await;
        assert_eq!(err.unwrap(), 0);

        let err = session.fail("login refused", 42, Some("hunter2")).await;
        let failure = err.failure().unwrap();
        assert_eq!(failure.exit_code(), 42);
        assert_eq!(failure.kind(), FailureKind::CommandFailed);
        assert!(failure.secret_offered());
        assert!(failure.transcript().contains("Permission denied"));
        assert!(!err.to_string().contains("hunter2"));
        assert_eq!(probe.terminate_calls(), 1);
    }

    #[tokio::test]
    async fn send_without_process() {
        let mut session = session();
        let err = session.send("uptime").await.unwrap_err();
        assert!(matches!(err, ExpectError::ProcessClosed));
    }
}
