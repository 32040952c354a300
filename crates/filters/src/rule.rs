use std::fmt;

use crate::FilterAction;

/// Pattern matching every path, used as the trailing catch-all exclude.
pub const MATCH_ALL: &str = "*";

const WILDCARDS: [char; 3] = ['*', '?', '['];

/// One line of filter syntax: an action plus the pattern it applies to.
///
/// Rendering through [`fmt::Display`] yields the exact text written to a
/// filter file, for example `+ sub/b.txt` or `- *`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FilterRule {
    pub(crate) action: FilterAction,
    pub(crate) pattern: String,
}

impl FilterRule {
    /// Creates an include rule for `pattern`.
    #[must_use]
    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Include,
            pattern: pattern.into(),
        }
    }

    /// Creates an exclude rule for `pattern`.
    #[must_use]
    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Exclude,
            pattern: pattern.into(),
        }
    }

    /// Creates the catch-all exclude (`- *`).
    #[must_use]
    pub fn exclude_all() -> Self {
        Self::exclude(MATCH_ALL)
    }

    /// Returns the rule action.
    #[must_use]
    pub const fn action(&self) -> FilterAction {
        self.action
    }

    /// Returns the pattern text associated with the rule.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Anchors the pattern to the root of the transfer if it is not already.
    #[must_use]
    pub fn anchor_to_root(mut self) -> Self {
        if !self.pattern.starts_with('/') {
            self.pattern.insert(0, '/');
        }
        self
    }

    /// Re-roots a literal include pattern beneath the top-level directory `top`.
    ///
    /// `sub/b.txt` anchored under `src` becomes `/src/sub/b.txt`. The result is
    /// escaped as one pattern: a wildcard anywhere in `top` or in the existing
    /// pattern makes every backslash and wildcard of the whole line literal.
    #[must_use]
    pub fn anchor_under(mut self, top: &str) -> Self {
        let relative = self.pattern.trim_start_matches('/');
        // Escaped patterns are exactly the ones still carrying a wildcard.
        let relative_escaped = relative.contains(WILDCARDS);
        let mut anchored = String::with_capacity(top.len() + relative.len() + 2);
        anchored.push('/');
        if relative_escaped {
            anchored.push_str(&escape_all(top));
        } else {
            anchored.push_str(top);
        }
        if !relative.is_empty() {
            anchored.push('/');
            anchored.push_str(relative);
        }
        self.pattern = if relative_escaped {
            anchored
        } else {
            escape_literal(&anchored)
        };
        self
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.marker(), self.pattern)
    }
}

/// Escapes a literal path pattern so wildcard characters match themselves.
///
/// The external tool treats backslashes as escapes only in patterns that
/// contain a wildcard, so the decision is made for the whole pattern: without
/// `*`, `?` or `[` it is returned untouched, otherwise every backslash and
/// wildcard is escaped.
#[must_use]
pub fn escape_literal(pattern: &str) -> String {
    if pattern.contains(WILDCARDS) {
        escape_all(pattern)
    } else {
        pattern.to_owned()
    }
}

fn escape_all(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        if ch == '\\' || WILDCARDS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
