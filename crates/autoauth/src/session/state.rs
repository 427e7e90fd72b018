//! State shared by both session kinds.

use std::io;
use std::path::{Path, PathBuf};

use crate::command;
use crate::config::{SessionConfig, resolve_dir};
use crate::error::{ExpectError, Result, SpawnError};
use crate::process::{LaunchRequest, Launcher, OutputSink, ProcessHandle};
use crate::template::TemplateContext;
use crate::types::{ProcessExitStatus, SessionId};

pub(crate) struct SessionCore<L: Launcher> {
    id: SessionId,
    context: TemplateContext,
    config: SessionConfig,
    working_dir: Option<PathBuf>,
    launcher: L,
    handle: Option<ProcessHandle<L::Process>>,
}

impl<L: Launcher> SessionCore<L> {
    pub(crate) fn new(context: TemplateContext, config: SessionConfig, working_dir: Option<PathBuf>, launcher: L) -> Self {
        Self {
            id: SessionId::new(),
            context,
            config,
            working_dir,
            launcher,
            handle: None,
        }
    }

    pub(crate) const fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) const fn context(&self) -> &TemplateContext {
        &self.context
    }

    pub(crate) const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub(crate) const fn launcher(&self) -> &L {
        &self.launcher
    }

    pub(crate) fn format(&self, template: &str) -> Result<String> {
        self.context.format(template)
    }

    pub(crate) fn update_parameters<I, K, V>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.context.merge(updates);
    }

    /// Split a formatted template into arguments.
    pub(crate) fn split(&self, template: &str) -> Result<Vec<String>> {
        let formatted = self.format(template)?;
        shell_words::split(&formatted)
            .map_err(|e| SpawnError::invalid_command(formatted.clone(), e.to_string()).into())
    }

    /// Working directory for a child: `cwd` formatted and resolved against
    /// the session directory, or the session directory itself.
    pub(crate) fn child_dir(&self, cwd: Option<&str>) -> Result<Option<PathBuf>> {
        match cwd {
            Some(cwd) => Ok(Some(resolve_dir(self.working_dir(), &self.format(cwd)?))),
            None => Ok(self.working_dir.clone()),
        }
    }

    pub(crate) fn cd(&mut self, path: &str) -> Result<()> {
        let dir = resolve_dir(self.working_dir(), &self.format(path)?);
        let context = || format!("changing directory to {}", dir.display());

        let metadata = ExpectError::with_io_context(std::fs::metadata(&dir), context())?;
        if !metadata.is_dir() {
            return Err(ExpectError::io_context(context(), io::Error::other("not a directory")));
        }

        tracing::debug!(session = %self.id, dir = %dir.display(), "Changed working directory");
        self.working_dir = Some(dir);
        Ok(())
    }

    pub(crate) async fn run(&self, template: &str, cwd: Option<&str>) -> Result<()> {
        let command = self.format(template)?;
        let cwd = self.child_dir(cwd)?;
        command::run(&command, cwd.as_deref(), &self.config.binaries.shell).await
    }

    pub(crate) async fn ssh_keygen(&self, modifier: Option<&str>) -> Result<()> {
        let template = format!(
            "{} {} \"{{node}}\"",
            self.config.binaries.ssh_keygen,
            modifier.unwrap_or("-R")
        );
        self.run(&template, None).await
    }

    /// Close the current process, if any, and start a new one.
    pub(crate) async fn spawn(&mut self, argv: Vec<String>, cwd: Option<PathBuf>, sink: OutputSink) -> Result<()> {
        if let Err(e) = self.close_process().await {
            tracing::warn!(session = %self.id, error = %e, "Failed to close previous process");
        }
        self.handle = None;

        let request = LaunchRequest {
            argv,
            cwd,
            dimensions: self.config.dimensions,
            env: self.config.env.clone(),
        };
        tracing::info!(session = %self.id, command = %request.command_line(), "Spawning process");

        let process = self.launcher.launch(&request).await?;
        let handle = ProcessHandle::new(process, request.argv, request.cwd, sink).with_config(&self.config);
        self.handle = Some(handle);
        Ok(())
    }

    pub(crate) const fn handle(&self) -> Option<&ProcessHandle<L::Process>> {
        self.handle.as_ref()
    }

    pub(crate) fn handle_mut(&mut self) -> Result<&mut ProcessHandle<L::Process>> {
        self.handle.as_mut().ok_or(ExpectError::ProcessClosed)
    }

    pub(crate) async fn close_process(&mut self) -> Result<Option<ProcessExitStatus>> {
        match &mut self.handle {
            Some(handle) => handle.close().await.map(Some),
            None => Ok(None),
        }
    }
}
