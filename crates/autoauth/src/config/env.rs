//! Environment-based configuration.

use std::collections::HashMap;
use std::time::Duration;

use super::{CaptureMode, SessionConfig};
use crate::error::{ExpectError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "AUTOAUTH";

/// Snapshot of prefixed environment variables.
///
/// | variable | field |
/// |---|---|
/// | `AUTOAUTH_TIMEOUT` | `timeout.default` (seconds) |
/// | `AUTOAUTH_CLOSE_TIMEOUT` | `timeout.close` (seconds) |
/// | `AUTOAUTH_MODIFIER` | `modifier` |
/// | `AUTOAUTH_CAPTURE` | `capture` (`inherit`, `private_log`, `discard`) |
/// | `AUTOAUTH_SSH`, `AUTOAUTH_SCP`, `AUTOAUTH_SHELL` | `binaries.*` |
/// | `AUTOAUTH_SSH_KEYGEN`, `AUTOAUTH_SSH_COPY_ID` | `binaries.*` |
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
    vars: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Read the process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Use an explicit set of variables instead of the process environment.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(&self.var_name(name)).map(String::as_str)
    }

    /// Get a duration given in (possibly fractional) seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`] if the value is not a non-negative number.
    pub fn duration_secs(&self, name: &str) -> Result<Option<Duration>> {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .map(Some)
            .ok_or_else(|| {
                ExpectError::config(format!("{} must be a number of seconds, got '{raw}'", self.var_name(name)))
            })
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Apply every recognized variable to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`] for unparsable values.
    pub fn apply(&self, config: &mut SessionConfig) -> Result<()> {
        if let Some(timeout) = self.duration_secs("timeout")? {
            config.timeout.default = timeout;
        }
        if let Some(close) = self.duration_secs("close_timeout")? {
            config.timeout.close = close;
        }
        if let Some(modifier) = self.get("modifier") {
            config.modifier = modifier.to_string();
        }
        if let Some(capture) = self.get("capture") {
            config.capture = Some(match capture.to_lowercase().as_str() {
                "inherit" => CaptureMode::Inherit,
                "private_log" | "private-log" => CaptureMode::PrivateLog,
                "discard" => CaptureMode::Discard,
                other => {
                    return Err(ExpectError::config(format!(
                        "{} must be inherit, private_log or discard, got '{other}'",
                        self.var_name("capture")
                    )));
                }
            });
        }

        let binaries = &mut config.binaries;
        for (name, slot) in [
            ("ssh", &mut binaries.ssh),
            ("scp", &mut binaries.scp),
            ("shell", &mut binaries.shell),
            ("ssh_keygen", &mut binaries.ssh_keygen),
            ("ssh_copy_id", &mut binaries.ssh_copy_id),
        ] {
            if let Some(value) = self.get(name) {
                *slot = value.to_string();
            }
        }

        tracing::trace!(prefix = %self.prefix, "Applied environment configuration");
        Ok(())
    }
}
