//! Installs the process-wide tracing subscriber.

use std::io;

use tracing_subscriber::EnvFilter;

use crate::Verbosity;

/// Environment variable whose directives override the verbosity flags.
pub const LOG_ENV: &str = "RUST_LOG";

/// Builds the event filter for `verbosity`.
///
/// `directives` uses the `RUST_LOG` syntax; unparsable directives are
/// skipped. Targets it names are filtered as it says, everything else falls
/// back to the verbosity level.
#[must_use]
pub fn build_filter(verbosity: Verbosity, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(verbosity.level().into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Initialise tracing for the process.
///
/// Events are written to standard error so they never mix with the tool
/// output forwarded on standard output. Returns `false` when a global
/// subscriber was already installed, which leaves the existing one in place.
///
/// # Example
///
/// ```
/// use logging::{Verbosity, init_tracing};
///
/// init_tracing(Verbosity::from_flags(1, false));
/// tracing::info!(target: "mirror::cmd", "sync finished");
/// ```
pub fn init_tracing(verbosity: Verbosity) -> bool {
    let directives = std::env::var(LOG_ENV).ok();
    let filter = build_filter(verbosity, directives.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbosity >= Verbosity::Debug)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn filter_defaults_to_verbosity_level() {
        let filter = build_filter(Verbosity::Debug, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = build_filter(Verbosity::Quiet, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn directives_can_raise_a_single_target() {
        let filter = build_filter(Verbosity::Normal, Some("mirror::cmd=trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn invalid_directives_are_ignored() {
        let filter = build_filter(Verbosity::Verbose, Some("mirror::cmd=loudest"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn second_initialisation_is_harmless() {
        let _ = init_tracing(Verbosity::Normal);
        assert!(!init_tracing(Verbosity::Trace));
    }
}
