//! Configuration types for autoauth.
//!
//! [`SessionConfig`] gathers the knobs a session needs: timeouts, the
//! binaries used to build command lines, the default ssh/scp modifier,
//! terminal geometry, and how child output is captured. It can be built in
//! code, loaded from TOML, and overridden from `AUTOAUTH_*` environment
//! variables (see [`EnvConfig`]).
//!
//! ```toml
//! modifier = "-o LogLevel=Error -o ConnectTimeout=10"
//! capture = "private_log"
//!
//! [timeout]
//! default = 120
//! close = 2.5
//!
//! [binaries]
//! ssh = "/usr/local/bin/ssh"
//! ```

mod env;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use env::{DEFAULT_PREFIX, EnvConfig};

use crate::error::{ExpectError, Result};
use crate::types::Dimensions;

/// Default idle timeout for each wait (600 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default grace period between hang-up and kill on close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default ssh/scp modifier.
pub const DEFAULT_MODIFIER: &str = "-o LogLevel=Error";

/// Default output buffer size (1 MB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Configuration for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Timeout configuration.
    pub timeout: TimeoutConfig,

    /// Programs used to build command lines.
    pub binaries: BinaryConfig,

    /// Extra ssh/scp arguments, split with shell quoting rules.
    pub modifier: String,

    /// Terminal dimensions.
    pub dimensions: Dimensions,

    /// Line ending appended by `send_line`.
    pub line_ending: LineEnding,

    /// Where child output goes. `None` picks the session kind's default:
    /// private log for [`Session`](crate::Session), console for
    /// [`InteractiveSession`](crate::InteractiveSession).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureMode>,

    /// Maximum bytes of unconsumed output kept for matching.
    pub buffer_size: usize,

    /// Extra environment variables for spawned children.
    pub env: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: TimeoutConfig::default(),
            binaries: BinaryConfig::default(),
            modifier: DEFAULT_MODIFIER.to_string(),
            dimensions: Dimensions::default(),
            line_ending: LineEnding::default(),
            capture: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            env: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Create a default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`] on invalid TOML or unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ExpectError::config(e.to_string()))
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read and
    /// [`ExpectError::Config`] if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = ExpectError::with_io_context(
            std::fs::read_to_string(path),
            format!("reading config file {}", path.display()),
        )?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by `AUTOAUTH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        EnvConfig::default().apply(&mut config)?;
        Ok(config)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ExpectError::config(e.to_string()))
    }

    /// Set the idle timeout for each wait.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout.default = timeout;
        self
    }

    /// Set the grace period before a hung-up child is killed.
    #[must_use]
    pub const fn close_timeout(mut self, timeout: Duration) -> Self {
        self.timeout.close = timeout;
        self
    }

    /// Set the ssh/scp modifier.
    #[must_use]
    pub fn modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = modifier.into();
        self
    }

    /// Set the terminal dimensions.
    #[must_use]
    pub const fn dimensions(mut self, cols: u16, rows: u16) -> Self {
        self.dimensions = Dimensions::new(cols, rows);
        self
    }

    /// Set the line ending style.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Set the capture mode.
    #[must_use]
    pub const fn capture(mut self, capture: CaptureMode) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Set the output buffer size.
    #[must_use]
    pub const fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Replace the binaries.
    #[must_use]
    pub fn binaries(mut self, binaries: BinaryConfig) -> Self {
        self.binaries = binaries;
        self
    }

    /// Add an environment variable for children.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Configuration for timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Idle timeout for each wait, in seconds in TOML.
    #[serde(with = "duration_secs")]
    pub default: Duration,

    /// Grace period after hang-up before the child is killed.
    #[serde(with = "duration_secs")]
    pub close: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_TIMEOUT,
            close: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Programs used to build command lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinaryConfig {
    /// Remote shell client.
    pub ssh: String,
    /// File copy client, run through [`shell`](Self::shell).
    pub scp: String,
    /// Known-hosts editor.
    pub ssh_keygen: String,
    /// Public key installer.
    pub ssh_copy_id: String,
    /// Shell used for `scp` and non-interactive commands.
    pub shell: String,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            ssh: "/usr/bin/ssh".to_string(),
            scp: "/usr/bin/scp".to_string(),
            ssh_keygen: "ssh-keygen".to_string(),
            ssh_copy_id: "ssh-copy-id".to_string(),
            shell: "/bin/sh".to_string(),
        }
    }
}

/// Line ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,

    /// Windows-style line ending (CRLF).
    CrLf,

    /// Carriage return, what a terminal sends for Enter.
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }
}

/// Where a spawned child's output is copied as it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Echo live to the caller's stdout.
    Inherit,
    /// Write to the session's private log file, surfaced on failure.
    PrivateLog,
    /// Keep only the in-memory match buffer.
    Discard,
}

/// Working directory a process is started in, relative paths resolved
/// against `base`.
pub(crate) fn resolve_dir(base: Option<&Path>, path: &str) -> PathBuf {
    let path = Path::new(path);
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout.default, Duration::from_secs(600));
        assert_eq!(config.modifier, "-o LogLevel=Error");
        assert_eq!(config.binaries.ssh, "/usr/bin/ssh");
        assert_eq!(config.dimensions, Dimensions::new(80, 24));
        assert!(config.capture.is_none());
    }

    #[test]
    fn builder_setters() {
        let config = SessionConfig::new()
            .timeout(Duration::from_secs(5))
            .close_timeout(Duration::from_millis(200))
            .modifier("-p 2222")
            .capture(CaptureMode::Discard)
            .line_ending(LineEnding::Cr);

        assert_eq!(config.timeout.default, Duration::from_secs(5));
        assert_eq!(config.timeout.close, Duration::from_millis(200));
        assert_eq!(config.modifier, "-p 2222");
        assert_eq!(config.capture, Some(CaptureMode::Discard));
        assert_eq!(config.line_ending.as_str(), "\r");
    }

    #[test]
    fn toml_partial_overrides() {
        let config = SessionConfig::from_toml_str(
            r#"
            modifier = "-o StrictHostKeyChecking=no"
            capture = "inherit"

            [timeout]
            default = 30
            close = 0.5

            [binaries]
            ssh = "/opt/bin/ssh"
            "#,
        )
        .unwrap();

        assert_eq!(config.modifier, "-o StrictHostKeyChecking=no");
        assert_eq!(config.capture, Some(CaptureMode::Inherit));
        assert_eq!(config.timeout.default, Duration::from_secs(30));
        assert_eq!(config.timeout.close, Duration::from_millis(500));
        assert_eq!(config.binaries.ssh, "/opt/bin/ssh");
        assert_eq!(config.binaries.scp, "/usr/bin/scp");
    }

    #[test]
    fn toml_unknown_field_is_rejected() {
        let err = SessionConfig::from_toml_str("retries = 3").unwrap_err();
        assert!(matches!(err, ExpectError::Config { .. }));
    }

    #[test]
    fn toml_negative_timeout_is_rejected() {
        assert!(SessionConfig::from_toml_str("[timeout]\ndefault = -1").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let config = SessionConfig::new().timeout(Duration::from_secs(42)).env("LC_ALL", "C");
        let text = config.to_toml_string().unwrap();
        assert_eq!(SessionConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn resolve_relative_dir() {
        let base = Path::new("/srv");
        assert_eq!(resolve_dir(Some(base), "data"), PathBuf::from("/srv/data"));
        assert_eq!(resolve_dir(Some(base), "/tmp"), PathBuf::from("/tmp"));
        assert_eq!(resolve_dir(None, "data"), PathBuf::from("data"));
    }
}
