use std::io;
use std::path::PathBuf;

use engine::{ConfigError, SyncError};
use thiserror::Error;

/// Exit status for a successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for invalid usage or configuration.
pub const EXIT_USAGE: i32 = 1;
/// Exit status when the external tool could not be started.
pub const EXIT_LAUNCH: i32 = 2;
/// Exit status when a transfer failed; the tool's own "partial transfer" code.
pub const EXIT_TRANSFER: i32 = 23;

/// Failures surfaced by the command-line front end.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command line could not be parsed.
    #[error("{0}")]
    Usage(String),
    /// A mapping file could not be read.
    #[error("failed to read mapping file '{}': {source}", path.display())]
    ReadConfig {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A mapping file is not valid.
    #[error("invalid mapping file '{}': {source}", path.display())]
    ParseConfig {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A mapping's settings were rejected.
    #[error("mapping '{name}': {source}")]
    Mapping {
        /// Mapping name.
        name: String,
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// Two mappings share a name.
    #[error("mapping name '{0}' is used more than once")]
    DuplicateMapping(String),
    /// A requested mapping does not exist.
    #[error("no mapping named '{0}'")]
    UnknownMapping(String),
    /// A synchronisation could not reach a verdict.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// The filesystem watcher could not be started.
    #[error("failed to start filesystem watcher: {0}")]
    Watcher(#[source] notify::Error),
    /// A source directory could not be watched.
    #[error("failed to watch '{}': {source}", path.display())]
    Watch {
        /// Directory being watched.
        path: PathBuf,
        /// Underlying watcher error.
        #[source]
        source: notify::Error,
    },
}

impl CliError {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Sync(error) if error.is_launch_failure() => EXIT_LAUNCH,
            Self::Sync(SyncError::Io { .. }) => EXIT_TRANSFER,
            _ => EXIT_USAGE,
        }
    }
}
