//! Mapping from command-line verbosity flags to tracing levels.

use tracing_subscriber::filter::LevelFilter;

/// How much diagnostic output the process emits.
///
/// Ordered from quietest to chattiest, so `>=` comparisons read naturally.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Verbosity {
    /// `-q`: errors only.
    Quiet,
    /// No flag: warnings and errors.
    #[default]
    Normal,
    /// `-v`: one line per synchronisation.
    Verbose,
    /// `-vv`: commands, rule counts and exit statuses.
    Debug,
    /// `-vvv` and beyond: every rule written to a filter file.
    Trace,
}

impl Verbosity {
    /// Derives the verbosity from the number of `-v` flags and the `-q` flag.
    ///
    /// `-q` wins over any number of `-v` flags.
    #[must_use]
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Most verbose level that passes when `RUST_LOG` is not set.
    #[must_use]
    pub const fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_count_maps_to_levels() {
        assert_eq!(Verbosity::from_flags(0, false).level(), LevelFilter::WARN);
        assert_eq!(Verbosity::from_flags(1, false).level(), LevelFilter::INFO);
        assert_eq!(Verbosity::from_flags(2, false).level(), LevelFilter::DEBUG);
        assert_eq!(Verbosity::from_flags(3, false).level(), LevelFilter::TRACE);
        assert_eq!(Verbosity::from_flags(9, false), Verbosity::Trace);
    }

    #[test]
    fn quiet_overrides_verbose() {
        assert_eq!(Verbosity::from_flags(3, true), Verbosity::Quiet);
        assert_eq!(Verbosity::Quiet.level(), LevelFilter::ERROR);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Debug < Verbosity::Trace);
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }
}
