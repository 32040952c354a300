use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while generating filter rules or materialising them on disk.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A removed path lies outside the configured source root.
    #[error("removed path '{path}' is outside source root '{root}'")]
    OutsideRoot {
        /// The offending path.
        path: PathBuf,
        /// The configured source root.
        root: PathBuf,
    },
    /// A removed path climbs out of the source root with `..`.
    #[error("removed path '{0}' contains a parent-directory component")]
    ParentComponent(PathBuf),
    /// A removed path cannot be represented in the UTF-8 filter file.
    #[error("removed path '{0}' is not valid UTF-8")]
    NonUtf8(PathBuf),
    /// A removed path contains a line break and cannot be written as one rule.
    #[error("removed path {0:?} contains a line break")]
    LineBreak(PathBuf),
    /// Creating or writing the temporary filter file failed.
    #[error("failed to write filter file: {0}")]
    Write(#[source] io::Error),
}
