//! Patterns matched against process output.

use std::fmt;

use regex::Regex;

/// Case-insensitive password prompt at the end of the output.
pub const PASSWORD_PROMPT: &str = r"(?i)password:\s*$";

/// Host-key confirmation prompt at the end of the output.
pub const YES_NO_PROMPT: &str = r"\(yes/no(/\[fingerprint\])?\)\?\s*$";

/// A `$ ` or `# ` shell prompt at the end of the output.
pub const SHELL_PROMPT: &str = r"[$#] $";

/// A pattern that can be matched against process output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact string.
    Literal(String),

    /// Match a regular expression.
    Regex(Regex),
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    /// The built-in password prompt.
    #[must_use]
    pub fn password_prompt() -> Self {
        Self::builtin(PASSWORD_PROMPT)
    }

    /// The built-in `(yes/no)?` host-key confirmation prompt.
    #[must_use]
    pub fn yes_no_prompt() -> Self {
        Self::builtin(YES_NO_PROMPT)
    }

    /// The built-in shell prompt.
    #[must_use]
    pub fn shell_prompt() -> Self {
        Self::builtin(SHELL_PROMPT)
    }

    fn builtin(source: &str) -> Self {
        // Built-in sources always compile.
        Regex::new(source).map_or_else(|_| Self::Literal(source.to_string()), Self::Regex)
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.as_str(),
        }
    }

    /// Find the first match in `text`, returning its byte range.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        match self {
            Self::Literal(s) => text.find(s.as_str()).map(|pos| (pos, pos + s.len())),
            Self::Regex(r) => r.find(text).map(|m| (m.start(), m.end())),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.as_str()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

/// Join pattern sources for diagnostics.
pub(crate) fn describe(patterns: &[Pattern]) -> String {
    patterns.iter().map(Pattern::as_str).collect::<Vec<_>>().join(" | ")
}
