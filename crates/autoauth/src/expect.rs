//! Pattern matching over process output.
//!
//! - [`Pattern`]: literal or regex, plus the built-in prompts
//! - [`OutputBuffer`]: incremental UTF-8 decoding with a size bound
//! - [`Matcher`]: earliest-match selection across an ordered pattern list

mod buffer;
mod matcher;
mod pattern;

pub use buffer::{DEFAULT_CAPACITY, OutputBuffer};
pub use matcher::{Consumed, MatchResult, Matcher};
pub(crate) use pattern::describe;
pub use pattern::{PASSWORD_PROMPT, Pattern, SHELL_PROMPT, YES_NO_PROMPT};
