//! Builder for sessions.

use std::fmt;
use std::path::PathBuf;

use super::{InteractiveSession, Session};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::process::{Launcher, PtyLauncher};
use crate::template::{NODE_KEY, TemplateContext, USER_KEY};

/// Builder for [`Session`] and [`InteractiveSession`].
///
/// The password is mandatory unless
/// [`password_mandatory(false)`](Self::password_mandatory) is set.
pub struct SessionBuilder<L = PtyLauncher> {
    context: TemplateContext,
    secret: Option<String>,
    password_mandatory: bool,
    config: SessionConfig,
    working_dir: Option<PathBuf>,
    launcher: L,
}

impl SessionBuilder {
    /// Create a builder with default configuration and the PTY launcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: TemplateContext::new(),
            secret: None,
            password_mandatory: true,
            config: SessionConfig::default(),
            working_dir: None,
            launcher: PtyLauncher,
        }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> SessionBuilder<L> {
    /// Set the `{user}` parameter.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.context.insert(USER_KEY, user);
        self
    }

    /// Set the `{node}` parameter.
    #[must_use]
    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.context.insert(NODE_KEY, node);
        self
    }

    /// Set the secret sent at password prompts.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Whether a run must see a password prompt to succeed.
    #[must_use]
    pub const fn password_mandatory(mut self, mandatory: bool) -> Self {
        self.password_mandatory = mandatory;
        self
    }

    /// Set one template parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Set several template parameters.
    #[must_use]
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.context.merge(params);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the initial working directory.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Start processes with `launcher` instead.
    #[must_use]
    pub fn launcher<M: Launcher>(self, launcher: M) -> SessionBuilder<M> {
        SessionBuilder {
            context: self.context,
            secret: self.secret,
            password_mandatory: self.password_mandatory,
            config: self.config,
            working_dir: self.working_dir,
            launcher,
        }
    }
}

impl<L: Launcher> SessionBuilder<L> {
    /// Build a command session.
    ///
    /// # Errors
    ///
    /// Returns an error if the private log cannot be created.
    pub fn build(self) -> Result<Session<L>> {
        Session::new(
            self.context,
            self.secret,
            self.password_mandatory,
            self.config,
            self.working_dir,
            self.launcher,
        )
    }

    /// Build an interactive session. The secret and the mandatory flag are
    /// not used by interactive sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured private log cannot be created.
    pub fn build_interactive(self) -> Result<InteractiveSession<L>> {
        InteractiveSession::new(self.context, self.config, self.working_dir, self.launcher)
    }
}

impl<L> fmt::Debug for SessionBuilder<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("context", &self.context)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("password_mandatory", &self.password_mandatory)
            .field("config", &self.config)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}
