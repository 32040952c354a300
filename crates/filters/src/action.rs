use std::fmt;

/// Polarity of a filter line in the external tool's rule syntax.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FilterAction {
    /// Let the matching path through (`+` marker).
    Include,
    /// Skip the matching path (`-` marker).
    Exclude,
}

impl FilterAction {
    /// Returns the single-character marker written at the start of a filter line.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Include => '+',
            Self::Exclude => '-',
        }
    }
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Include => f.write_str("include"),
            Self::Exclude => f.write_str("exclude"),
        }
    }
}
