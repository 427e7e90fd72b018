//! Sessions: a template context, a secret, and one process at a time.
//!
//! [`Session`] runs one authenticated command per spawn (`ssh user@node
//! cmd`, `scp ...`) and reports the outcome. [`InteractiveSession`] keeps
//! a spawned process open for `send`/`expect` exchanges.
//!
//! ```no_run
//! use autoauth::prelude::*;
//!
//! # async fn example() -> autoauth::Result<()> {
//! let mut session = Session::builder()
//!     .user("admin")
//!     .node("db01")
//!     .secret("hunter2")
//!     .param("dir", "/var/backups")
//!     .build()?;
//!
//! session.spawn_ssh("ls {dir}", &SpawnOptions::new()).await?;
//! session.spawn_scp("{user}@{node}:{dir}/*.sql .", &SpawnOptions::new()).await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod interactive;
mod log;
mod state;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use builder::SessionBuilder;
pub use interactive::InteractiveSession;

use self::log::PrivateLog;
use self::state::SessionCore;
use crate::auth::{AuthOptions, DEFAULT_FAILURE_MESSAGE, authenticate};
use crate::config::{CaptureMode, SessionConfig};
use crate::error::{ExpectError, Result};
use crate::expect::Pattern;
use crate::process::{Launcher, OutputSink, ProcessHandle, PtyLauncher};
use crate::template::{NODE_KEY, TemplateContext, USER_KEY};
use crate::types::{ProcessExitStatus, SessionId};
use crate::verdict::Verdict;

/// Per-spawn overrides for [`Session`] and [`InteractiveSession`].
///
/// Text fields are templates formatted with the session's context. Extra
/// patterns are regular expressions and are not formatted.
#[derive(Clone, Default)]
pub struct SpawnOptions {
    modifier: Option<String>,
    user: Option<String>,
    node: Option<String>,
    secret: Option<String>,
    failure_message: Option<String>,
    exit_codes: Vec<(String, i32)>,
    commands: Vec<(String, String)>,
    cwd: Option<String>,
    timeout: Option<Duration>,
}

impl SpawnOptions {
    /// Options that use the session's defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configured modifier.
    #[must_use]
    pub fn modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    /// Contact a different user than `{user}`.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Contact a different node than `{node}`.
    #[must_use]
    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Use a temporary secret for this spawn only.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Message reported when the command fails.
    #[must_use]
    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = Some(message.into());
        self
    }

    /// End the handshake with `code` when `pattern` appears.
    #[must_use]
    pub fn exit_code(mut self, pattern: impl Into<String>, code: i32) -> Self {
        self.exit_codes.push((pattern.into(), code));
        self
    }

    /// Answer `pattern` with `command` during the handshake.
    #[must_use]
    pub fn command(mut self, pattern: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push((pattern.into(), command.into()));
        self
    }

    /// Working directory of the child (file copies only).
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Idle timeout of each wait.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Formatted `<user>@<node>`.
    fn destination<L: Launcher>(&self, core: &SessionCore<L>) -> Result<String> {
        core.format(&format!(
            "{}@{}",
            self.user.as_deref().unwrap_or("{user}"),
            self.node.as_deref().unwrap_or("{node}")
        ))
    }

    /// `<modifier...> <user>@<node>` arguments for ssh.
    fn destination_args<L: Launcher>(&self, core: &SessionCore<L>) -> Result<Vec<String>> {
        let modifier = self.modifier.as_deref().unwrap_or(&core.config().modifier);
        let mut args = core.split(modifier)?;
        args.push(self.destination(core)?);
        Ok(args)
    }
}

impl fmt::Debug for SpawnOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnOptions")
            .field("modifier", &self.modifier)
            .field("user", &self.user)
            .field("node", &self.node)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("failure_message", &self.failure_message)
            .field("exit_codes", &self.exit_codes)
            .field("commands", &self.commands.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .field("cwd", &self.cwd)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sink for the next process according to the capture mode.
fn open_sink(capture: CaptureMode, log: Option<&PrivateLog>) -> Result<OutputSink> {
    match (capture, log) {
        (CaptureMode::PrivateLog, Some(log)) => ExpectError::with_io_context(log.sink(), "opening private log"),
        (CaptureMode::Inherit, _) => Ok(OutputSink::Stdout),
        _ => Ok(OutputSink::Discard),
    }
}

/// Create the private log when the capture mode asks for one.
fn create_log(capture: CaptureMode) -> Result<Option<PrivateLog>> {
    if capture == CaptureMode::PrivateLog {
        ExpectError::with_io_context(PrivateLog::new(), "creating private log").map(Some)
    } else {
        Ok(None)
    }
}

/// A session that runs one authenticated command per spawn.
///
/// Output goes to a private log by default and only surfaces in failure
/// reports. With a mandatory password, a failed spawn closes the session;
/// later calls return [`ExpectError::SessionClosed`].
pub struct Session<L: Launcher = PtyLauncher> {
    core: SessionCore<L>,
    secret: Option<String>,
    password_mandatory: bool,
    capture: CaptureMode,
    log: Option<PrivateLog>,
    closed: bool,
}

impl Session<PtyLauncher> {
    /// Start building a session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }
}

impl<L: Launcher> Session<L> {
    pub(crate) fn new(
        context: TemplateContext,
        secret: Option<String>,
        password_mandatory: bool,
        config: SessionConfig,
        working_dir: Option<PathBuf>,
        launcher: L,
    ) -> Result<Self> {
        let capture = config.capture.unwrap_or(CaptureMode::PrivateLog);
        let log = create_log(capture)?;
        Ok(Self {
            core: SessionCore::new(context, config, working_dir, launcher),
            secret,
            password_mandatory,
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

    /// The session working directory, if set with [`cd`](Self::cd).
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.core.working_dir()
    }

    /// Path of the private log, while it exists.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(PrivateLog::path)
    }

    /// Check whether a password is required.
    #[must_use]
    pub const fn password_mandatory(&self) -> bool {
        self.password_mandatory
    }

    /// Check whether the session has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// The current process, if one has been spawned.
    #[must_use]
    pub const fn process(&self) -> Option<&ProcessHandle<L::Process>> {
        self.core.handle()
    }

    /// Replace the stored secret.
    pub fn update_secret(&mut self, secret: impl Into<String>) {
        self.secret = Some(secret.into());
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

    /// Set the working directory for later commands of this session.
    ///
    /// Relative paths resolve against the current session directory.
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

    /// Run `ssh-keygen <modifier> "{node}"`; the default `-R` forgets the
    /// node's host key.
    ///
    /// # Errors
    ///
    /// [`ExpectError::CommandFailed`] on a non-zero exit.
    pub async fn ssh_keygen(&self, modifier: Option<&str>) -> Result<()> {
        self.ensure_open()?;
        self.core.ssh_keygen(modifier).await
    }

    /// Run `command` on the node over ssh, answering the password prompt.
    ///
    /// # Errors
    ///
    /// [`ExpectError::Failed`] when the run does not succeed, besides
    /// spawn, template, and I/O errors.
    pub async fn spawn_ssh(&mut self, command: &str, options: &SpawnOptions) -> Result<()> {
        self.ssh_verdict(command, options).await?.into_result()
    }

    /// Like [`spawn_ssh`](Self::spawn_ssh), returning the verdict instead
    /// of turning a failure into an error.
    ///
    /// # Errors
    ///
    /// Returns spawn, template, and I/O errors.
    pub async fn ssh_verdict(&mut self, command: &str, options: &SpawnOptions) -> Result<Verdict> {
        self.ensure_open()?;

        let mut argv = vec![self.core.config().binaries.ssh.clone()];
        argv.extend(options.destination_args(&self.core)?);
        argv.push(self.core.format(command)?);

        self.spawn_and_authenticate(argv, None, options).await
    }

    /// Copy files with scp through the shell, so wildcards in `args` are
    /// expanded. Runs in `options.cwd`, if given.
    ///
    /// # Errors
    ///
    /// [`ExpectError::Failed`] when the copy does not succeed, besides
    /// spawn, template, and I/O errors.
    pub async fn spawn_scp(&mut self, args: &str, options: &SpawnOptions) -> Result<()> {
        self.scp_verdict(args, options).await?.into_result()
    }

    /// Like [`spawn_scp`](Self::spawn_scp), returning the verdict.
    ///
    /// # Errors
    ///
    /// Returns spawn, template, and I/O errors.
    pub async fn scp_verdict(&mut self, args: &str, options: &SpawnOptions) -> Result<Verdict> {
        self.ensure_open()?;

        let config = self.core.config();
        let modifier = self.core.format(options.modifier.as_deref().unwrap_or(&config.modifier))?;
        let script = format!("{} {} {}", config.binaries.scp, modifier, self.core.format(args)?);
        let argv = vec![config.binaries.shell.clone(), "-c".to_string(), script];
        let cwd = self.core.child_dir(options.cwd.as_deref())?;

        self.spawn_and_authenticate(argv, cwd, options).await
    }

    fn auth_options(&self, options: &SpawnOptions) -> Result<AuthOptions> {
        let mut auth = AuthOptions::new()
            .secret_opt(options.secret.clone().or_else(|| self.secret.clone()))
            .password_mandatory(self.password_mandatory)
            .timeout(options.timeout.unwrap_or(self.core.config().timeout.default))
            .failure_message(options.failure_message.as_deref().unwrap_or(DEFAULT_FAILURE_MESSAGE));

        for (pattern, command) in &options.commands {
            auth = auth.command(Pattern::regex(pattern)?, self.core.format(command)?);
        }
        for (pattern, code) in &options.exit_codes {
            auth = auth.exit_code(Pattern::regex(pattern)?, *code);
        }
        Ok(auth)
    }

    async fn spawn_and_authenticate(
        &mut self,
        argv: Vec<String>,
        cwd: Option<PathBuf>,
        options: &SpawnOptions,
    ) -> Result<Verdict> {
        let auth = self.auth_options(options)?;
        let sink = open_sink(self.capture, self.log.as_ref())?;
        self.core.spawn(argv, cwd, sink).await?;

        let result = authenticate(self.core.handle_mut()?, &auth).await;
        let failed = !result.as_ref().is_ok_and(Verdict::is_success);
        if failed && self.password_mandatory {
            tracing::info!(session = %self.id(), "Closing session after failed mandatory authentication");
            if let Err(e) = self.close().await {
                tracing::warn!(session = %self.id(), error = %e, "Failed to close session");
            }
        }
        result
    }

    /// Close the current process and remove the private log.
    ///
    /// Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be reaped or the log
    /// could not be removed. The session is closed either way.
    pub async fn close(&mut self) -> Result<Option<ProcessExitStatus>> {
        if self.closed {
            return Ok(self.core.handle().and_then(ProcessHandle::status));
        }
        self.closed = true;

        let status = self.core.close_process().await;
        if let Some(log) = self.log.take() {
            ExpectError::with_io_context(log.close(), "removing private log")?;
        }
        tracing::debug!(session = %self.id(), "Session closed");
        status
    }
}

impl<L: Launcher> fmt::Debug for Session<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.core.id())
            .field("user", &self.core.context().get(USER_KEY))
            .field("node", &self.core.context().get(NODE_KEY))
            .field("password_mandatory", &self.password_mandatory)
            .field("capture", &self.capture)
            .field("working_dir", &self.core.working_dir())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Script, ScriptedLauncher};

    fn session(mandatory: bool) -> Session<ScriptedLauncher> {
        Session::builder()
            .user("admin")
            .node("db01")
            .secret("hunter2")
            .password_mandatory(mandatory)
            .launcher(ScriptedLauncher::new())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn ssh_argv_layout() {
        let mut session = session(true);
        session
            .launcher()
            .push(Script::new().output("Password: ").await_line().eof().exit(0));

        session
            .spawn_ssh("ls {node}", &SpawnOptions::new().modifier("-p 2222 -o LogLevel=Error"))
            .await
            .unwrap();

        let requests = session.launcher().requests();
        assert_eq!(
            requests[0].argv,
            vec!["/usr/bin/ssh", "-p", "2222", "-o", "LogLevel=Error", "admin@db01", "ls db01"]
        );
    }

    #[tokio::test]
    async fn scp_goes_through_shell() {
        let mut session = session(true);
        session
            .launcher()
            .push(Script::new().output("Password: ").await_line().eof().exit(0));

        session
            .spawn_scp("{user}@{node}:/tmp/*.log .", &SpawnOptions::new().cwd("/srv"))
            .await
            .unwrap();

        let request = &session.launcher().requests()[0];
        assert_eq!(
            request.argv,
            vec![
                "/bin/sh",
                "-c",
                "/usr/bin/scp -o LogLevel=Error admin@db01:/tmp/*.log ."
            ]
        );
        assert_eq!(request.cwd, Some(PathBuf::from("/srv")));
    }

    #[tokio::test]
    async fn temporary_secret_overrides() {
        let mut session = session(true);
        let probe = session
            .launcher()
            .push(Script::new().output("Password: ").await_line().eof().exit(0));

        session
            .spawn_ssh("true", &SpawnOptions::new().secret("one-time"))
            .await
            .unwrap();
        assert_eq!(probe.sent_lines(), vec!["one-time"]);
    }

    #[tokio::test]
    async fn private_log_is_removed_on_close() {
        let mut session = session(false);
        let path = session.log_path().unwrap().to_path_buf();
        assert!(path.exists());

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(!path.exists());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn closed_session_rejects_calls() {
        let mut session = session(false);
        session.close().await.unwrap();

        let err = session.spawn_ssh("true", &SpawnOptions::new()).await.unwrap_err();
        assert!(matches!(err, ExpectError::SessionClosed));
        assert!(matches!(session.cd("/"), Err(ExpectError::SessionClosed)));
    }

    #[test]
    fn spawn_options_debug_redacts() {
        let options = SpawnOptions::new().secret("hunter2").command("Token:", "s3cr3t");
        let debug = format!("{options:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cr3t"));
    }
}
