//! Placeholder substitution for command strings.
//!
//! A [`TemplateContext`] maps keys to values; [`TemplateContext::format`]
//! replaces every `{key}` in a template with its value. `{{` and `}}` are
//! literal braces. Nothing else is interpreted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ExpectError, Result};

/// Key for the remote user name.
pub const USER_KEY: &str = "user";

/// Key for the remote node address.
pub const NODE_KEY: &str = "node";

/// Per-session substitution parameters.
///
/// # Example
///
/// ```
/// use autoauth::TemplateContext;
///
/// let ctx = TemplateContext::for_host("deploy", "10.0.0.5");
/// assert_eq!(ctx.format("ssh {user}@{node}").unwrap(), "ssh deploy@10.0.0.5");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context holding `user` and `node`.
    #[must_use]
    pub fn for_host(user: impl Into<String>, node: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.insert(USER_KEY, user);
        ctx.insert(NODE_KEY, node);
        ctx
    }

    /// Set a single key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Overlay `updates`; keys already present are overwritten.
    pub fn merge<I, K, V>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in updates {
            self.insert(key, value);
        }
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Check whether a key is defined.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of defined keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no keys are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the defined keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Substitute every `{key}` in `template`.
    ///
    /// Values are inserted verbatim and are not themselves expanded.
    ///
    /// # Errors
    ///
    /// [`ExpectError::MissingKey`] if a referenced key is undefined and
    /// [`ExpectError::MalformedTemplate`] on an unbalanced brace or an empty
    /// placeholder. No partial output is produced in either case.
    pub fn format(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template.char_indices().peekable();

        while let Some((pos, c)) = rest.next() {
            match c {
                '{' if rest.peek().is_some_and(|&(_, next)| next == '{') => {
                    rest.next();
                    out.push('{');
                }
                '{' => {
                    let start = pos + 1;
                    let Some(len) = template[start..].find(['{', '}']) else {
                        return Err(ExpectError::malformed_template(template, pos, "unclosed '{'"));
                    };
                    let end = start + len;
                    if template.as_bytes()[end] == b'{' {
                        return Err(ExpectError::malformed_template(template, end, "'{' inside placeholder"));
                    }

                    let key = &template[start..end];
                    if key.is_empty() {
                        return Err(ExpectError::malformed_template(template, pos, "empty placeholder"));
                    }
                    let value = self
                        .get(key)
                        .ok_or_else(|| ExpectError::missing_key(key, template))?;
                    out.push_str(value);

                    while rest.peek().is_some_and(|&(i, _)| i <= end) {
                        rest.next();
                    }
                }
                '}' if rest.peek().is_some_and(|&(_, next)| next == '}') => {
                    rest.next();
                    out.push('}');
                }
                '}' => {
                    return Err(ExpectError::malformed_template(template, pos, "single '}'"));
                }
                _ => out.push(c),
            }
        }

        Ok(out)
    }

    /// Format an optional template, passing `None` through.
    ///
    /// # Errors
    ///
    /// Same as [`format`](Self::format).
    pub fn format_opt(&self, template: Option<&str>) -> Result<Option<String>> {
        template.map(|t| self.format(t)).transpose()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Self::new();
        ctx.merge(iter);
        ctx
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for TemplateContext {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.merge(iter);
    }
}
