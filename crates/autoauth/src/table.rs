//! The pattern-response table driving the handshake.

use std::fmt;

use crate::expect::Pattern;

/// Exit code used when the stream ends before a terminal action.
pub const EOF_EXIT_CODE: i32 = 2;

/// Exit code used when the handshake watch times out.
pub const TIMEOUT_EXIT_CODE: i32 = 3;

/// What to do when an entry's pattern matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a line and keep watching.
    RespondWith(String),

    /// Send the secret and end the handshake.
    RespondWithSecret,

    /// End the handshake with an exit code.
    Terminate(i32),
}

/// A pattern paired with the action it triggers.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    /// What to look for.
    pub pattern: Pattern,
    /// What to do about it.
    pub action: Action,
}

impl PatternEntry {
    /// Create an entry.
    #[must_use]
    pub const fn new(pattern: Pattern, action: Action) -> Self {
        Self { pattern, action }
    }
}

impl fmt::Display for PatternEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            // Responses may be typed input; only the pattern is shown.
            Action::RespondWith(_) => write!(f, "'{}' -> respond", self.pattern),
            Action::RespondWithSecret => write!(f, "'{}' -> secret", self.pattern),
            Action::Terminate(code) => write!(f, "'{}' -> exit {code}", self.pattern),
        }
    }
}

/// Ordered entries; lower index wins ties.
#[derive(Debug, Clone, Default)]
pub struct ResponseTable {
    entries: Vec<PatternEntry>,
}

impl ResponseTable {
    /// An empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// The handshake table: password prompt, host-key confirmation, then
    /// caller commands and caller exit codes in the order given.
    #[must_use]
    pub fn handshake(commands: &[(Pattern, String)], exit_codes: &[(Pattern, i32)]) -> Self {
        let mut table = Self::new()
            .with_entry(Pattern::password_prompt(), Action::RespondWithSecret)
            .with_entry(Pattern::yes_no_prompt(), Action::RespondWith("yes".to_string()));
        for (pattern, command) in commands {
            table.push(PatternEntry::new(pattern.clone(), Action::RespondWith(command.clone())));
        }
        for (pattern, code) in exit_codes {
            table.push(PatternEntry::new(pattern.clone(), Action::Terminate(*code)));
        }
        table
    }

    /// Append an entry.
    #[must_use]
    pub fn with_entry(mut self, pattern: Pattern, action: Action) -> Self {
        self.push(PatternEntry::new(pattern, action));
        self
    }

    /// Append an entry in place.
    pub fn push(&mut self, entry: PatternEntry) {
        self.entries.push(entry);
    }

    /// The patterns in priority order, for a wait.
    #[must_use]
    pub fn patterns(&self) -> Vec<Pattern> {
        self.iter().map(|e| e.pattern.clone()).collect()
    }

    /// Get an entry by index.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&PatternEntry> {
        self.entries.get(index)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &PatternEntry> {
        self.entries.iter()
    }
}
