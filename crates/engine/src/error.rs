use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use filters::FilterError;
use thiserror::Error;

/// Invalid configuration detected while building a [`SyncConfig`](crate::SyncConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The source does not exist or is not a directory.
    #[error("source '{0}' must be an existing directory")]
    SourceNotDirectory(PathBuf),
    /// The source's final component cannot be written to a UTF-8 filter file.
    #[error("source '{0}' has a name that is not valid UTF-8")]
    NonUtf8Source(PathBuf),
    /// The source's final component contains a line break.
    #[error("source {0:?} has a name containing a line break")]
    LineBreakInSource(PathBuf),
    /// The destination is neither a local directory nor a remote endpoint.
    #[error("destination '{0}' must be an existing directory or a host:path endpoint")]
    InvalidDestination(String),
    /// Excludes were given as a pattern-to-transform mapping.
    #[error("excludes must be a list of patterns, not a mapping")]
    MappingExcludes,
    /// The configured tool path is empty.
    #[error("rsync binary path must not be empty")]
    EmptyBinary,
}

/// Errors that abort a synchronisation before a verdict is reached.
///
/// A tool that runs and exits non-zero is not an error: it is reported
/// through [`SyncOutcome::success`](crate::SyncOutcome::success).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Filter rules could not be generated or written.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// The external tool could not be started.
    #[error("failed to launch rsync binary '{}': {source}. {diagnostic}", binary.to_string_lossy())]
    Launch {
        /// Binary that was attempted.
        binary: OsString,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
        /// Hint describing how to fix the environment.
        diagnostic: String,
    },
    /// Reading, forwarding or waiting on the child process failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Reports whether the error comes from the environment rather than the transfer.
    #[must_use]
    pub const fn is_launch_failure(&self) -> bool {
        matches!(self, Self::Launch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn launch_error_names_binary_and_hint() {
        let error = SyncError::Launch {
            binary: OsString::from("/opt/rsync"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
            diagnostic: String::from("install rsync"),
        };
        let rendered = error.to_string();

        assert!(rendered.contains("/opt/rsync"));
        assert!(rendered.contains("missing"));
        assert!(rendered.contains("install rsync"));
        assert!(error.is_launch_failure());
        assert!(error.source().is_some());
    }

    #[test]
    fn config_errors_are_transparent() {
        let error = SyncError::from(ConfigError::MappingExcludes);
        assert_eq!(error.to_string(), ConfigError::MappingExcludes.to_string());
        assert!(!error.is_launch_failure());
    }

    #[test]
    fn io_error_keeps_context() {
        let error = SyncError::io("failed to forward stdout", io::Error::other("closed"));
        assert_eq!(error.to_string(), "failed to forward stdout: closed");
    }
}
