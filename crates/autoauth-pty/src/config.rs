//! Configuration types for PTY creation.
//!
//! [`PtyConfig`] describes how a child is placed on its terminal: working
//! directory, environment, window size, and whether the slave becomes the
//! controlling terminal. [`PtySignal`] names the signals the crate sends.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Configuration for spawning a child on a new PTY.
///
/// # Example
///
/// ```
/// use autoauth_pty::PtyConfig;
///
/// let config = PtyConfig::builder()
///     .working_directory("/srv/deploy")
///     .env("LC_ALL", "C")
///     .window_size(132, 40)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Working directory for the child process.
    pub working_directory: Option<PathBuf>,

    /// Start from an empty environment instead of inheriting the parent's.
    pub env_clear: bool,

    /// Variables added on top of the base environment.
    pub env_add: HashMap<OsString, OsString>,

    /// Variables removed from the base environment.
    pub env_remove: Vec<OsString>,

    /// Initial window size (columns, rows).
    pub window_size: (u16, u16),

    /// Make the slave the child's controlling terminal (`setsid` + `TIOCSCTTY`).
    ///
    /// Required for programs that open `/dev/tty` to prompt for passwords.
    pub controlling_terminal: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            working_directory: None,
            env_clear: false,
            env_add: HashMap::new(),
            env_remove: Vec::new(),
            window_size: (80, 24),
            controlling_terminal: true,
        }
    }
}

impl PtyConfig {
    /// Create a new builder for `PtyConfig`.
    #[must_use]
    pub fn builder() -> PtyConfigBuilder {
        PtyConfigBuilder::default()
    }

    /// Compute the environment the child will see.
    #[must_use]
    pub fn effective_env(&self) -> HashMap<OsString, OsString> {
        let mut env: HashMap<OsString, OsString> = if self.env_clear {
            HashMap::new()
        } else {
            std::env::vars_os().collect()
        };

        env.extend(self.env_add.clone());
        for key in &self.env_remove {
            env.remove(key);
        }

        env
    }
}

/// Builder for [`PtyConfig`].
#[derive(Debug, Clone, Default)]
pub struct PtyConfigBuilder {
    config: PtyConfig,
}

impl PtyConfigBuilder {
    /// Set the working directory for the child process.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(path.into());
        self
    }

    /// Do not inherit the parent environment.
    #[must_use]
    pub const fn env_clear(mut self) -> Self {
        self.config.env_clear = true;
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config.env_add.insert(key.into(), value.into());
        self
    }

    /// Remove an environment variable.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.config.env_remove.push(key.into());
        self
    }

    /// Set the initial window size.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.config.window_size = (cols, rows);
        self
    }

    /// Set whether the slave becomes the controlling terminal.
    #[must_use]
    pub const fn controlling_terminal(mut self, value: bool) -> Self {
        self.config.controlling_terminal = value;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PtyConfig {
        self.config
    }
}

/// Signals sent to PTY children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PtySignal {
    /// SIGHUP: the terminal went away.
    Hangup,
    /// SIGINT: Ctrl+C.
    Interrupt,
    /// SIGTERM: polite termination request.
    Terminate,
    /// SIGKILL: cannot be caught.
    Kill,
    /// SIGCONT: resume a stopped child so it can see a pending signal.
    Continue,
}

impl PtySignal {
    /// Get the Unix signal number.
    #[cfg(unix)]
    #[must_use]
    pub const fn as_unix_signal(self) -> i32 {
        match self {
            Self::Hangup => libc::SIGHUP,
            Self::Interrupt => libc::SIGINT,
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
            Self::Continue => libc::SIGCONT,
        }
    }
}

/// Window size for the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl WindowSize {
    /// Create a new window size.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl From<(u16, u16)> for WindowSize {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self::new(cols, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = PtyConfig::builder()
            .working_directory("/tmp")
            .env("FOO", "bar")
            .window_size(120, 40)
            .build();

        assert_eq!(config.working_directory, Some(PathBuf::from("/tmp")));
        assert_eq!(config.window_size, (120, 40));
        assert!(config.env_add.contains_key(&OsString::from("FOO")));
    }

    #[test]
    fn effective_env_applies_add_and_remove() {
        let config = PtyConfig::builder()
            .env_clear()
            .env("KEEP", "1")
            .env("DROP", "2")
            .env_remove("DROP")
            .build();

        let env = config.effective_env();
        assert_eq!(env.len(), 1);
        assert_eq!(env.get(&OsString::from("KEEP")), Some(&OsString::from("1")));
    }

    #[cfg(unix)]
    #[test]
    fn signal_numbers() {
        assert_eq!(PtySignal::Hangup.as_unix_signal(), libc::SIGHUP);
        assert_eq!(PtySignal::Kill.as_unix_signal(), libc::SIGKILL);
    }
}
