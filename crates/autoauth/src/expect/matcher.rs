//! Pattern matching engine over the output buffer.

use super::buffer::OutputBuffer;
use super::pattern::Pattern;

/// Where a pattern matched in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the pattern that matched.
    pub pattern_index: usize,
    /// Start position in the buffer.
    pub start: usize,
    /// End position in the buffer.
    pub end: usize,
}

/// Text split around a consumed match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumed {
    /// Text preceding the match.
    pub before: String,
    /// The matched text.
    pub matched: String,
    /// Text after the match, still in the buffer.
    pub after: String,
}

/// Accumulates output and finds patterns in it.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    buffer: OutputBuffer,
}

impl Matcher {
    /// Create a new matcher with the specified buffer size.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: OutputBuffer::new(buffer_size),
        }
    }

    /// Append data to the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.append(data);
    }

    /// Get the current buffer contents.
    #[must_use]
    pub fn buffer_str(&self) -> &str {
        self.buffer.as_str()
    }

    /// Find the best match among `patterns`.
    ///
    /// The match that starts earliest in the buffer wins. When two patterns
    /// match at the same position, the one listed first wins.
    #[must_use]
    pub fn try_match_any(&self, patterns: &[Pattern]) -> Option<MatchResult> {
        let text = self.buffer.as_str();
        let mut best: Option<MatchResult> = None;

        for (idx, pattern) in patterns.iter().enumerate() {
            if let Some((start, end)) = pattern.find(text) {
                let result = MatchResult {
                    pattern_index: idx,
                    start,
                    end,
                };
                match best {
                    Some(current) if current.start <= start => {}
                    _ => best = Some(result),
                }
            }
        }

        best
    }

    /// Remove everything up to the end of `result` from the buffer.
    pub fn consume_match(&mut self, result: &MatchResult) -> Consumed {
        let before = self.buffer.consume(result.start);
        let matched = self.buffer.consume(result.end - result.start);
        let after = self.buffer.as_str().to_string();

        Consumed {
            before,
            matched,
            after,
        }
    }

    /// Remove and return everything in the buffer.
    pub fn take_all(&mut self) -> String {
        self.buffer.take_all()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<Pattern> {
        vec![
            Pattern::password_prompt(),
            Pattern::yes_no_prompt(),
            Pattern::literal("Permission denied"),
        ]
    }

    #[test]
    fn no_match_leaves_buffer() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"Connecting...\n");
        assert!(matcher.try_match_any(&patterns()).is_none());
        assert_eq!(matcher.buffer_str(), "Connecting...\n");
    }

    #[test]
    fn earliest_match_wins() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"Permission denied, please try again.\nPassword: ");

        let result = matcher.try_match_any(&patterns()).unwrap();
        assert_eq!(result.pattern_index, 2);
        assert_eq!(result.start, 0);
    }

    #[test]
    fn ties_go_to_lower_index() {
        let patterns = vec![Pattern::literal("login"), Pattern::literal("log")];
        let mut matcher = Matcher::new(1024);
        matcher.append(b"login: ");

        let result = matcher.try_match_any(&patterns).unwrap();
        assert_eq!(result.pattern_index, 0);
    }

    #[test]
    fn consume_splits_buffer() {
        let patterns = vec![Pattern::literal("yes/no")];
        let mut matcher = Matcher::new(1024);
        matcher.append(b"continue (yes/no)? ");

        let result = matcher.try_match_any(&patterns).unwrap();
        let consumed = matcher.consume_match(&result);
        assert_eq!(consumed.before, "continue (");
        assert_eq!(consumed.matched, "yes/no");
        assert_eq!(consumed.after, ")? ");
        assert_eq!(matcher.buffer_str(), ")? ");
    }

    #[test]
    fn consumed_output_is_not_rematched() {
        let patterns = vec![Pattern::password_prompt()];
        let mut matcher = Matcher::new(1024);
        matcher.append(b"Password: ");

        let result = matcher.try_match_any(&patterns).unwrap();
        matcher.consume_match(&result);
        assert!(matcher.try_match_any(&patterns).is_none());
    }
}
