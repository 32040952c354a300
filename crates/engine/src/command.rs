use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::SyncConfig;

/// Flags every invocation starts with: archive mode and verbose output.
pub const BASE_FLAGS: [&str; 2] = ["-a", "-v"];
/// Flag asking the tool to delete extraneous destination entries.
pub const DELETE_FLAG: &str = "--delete";
/// Flag pointing the tool at the filter file.
pub const FILTER_FILE_FLAG: &str = "--exclude-from";
/// Flag asking the tool not to modify anything.
pub const DRY_RUN_FLAG: &str = "--dry-run";

/// Which of the three synchronisation shapes an invocation uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Strategy {
    /// Mirror the whole tree, always deleting extraneous entries.
    Full,
    /// Transfer added and changed files; delete only when configured.
    Incremental,
    /// Propagate removals; only the removed paths pass the filter.
    Removal,
}

impl Strategy {
    /// Reports whether the strategy passes the delete flag for `config`.
    #[must_use]
    pub const fn deletes(self, config: &SyncConfig) -> bool {
        match self {
            Self::Full | Self::Removal => true,
            Self::Incremental => config.delete(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Incremental => f.write_str("incremental"),
            Self::Removal => f.write_str("removal"),
        }
    }
}

/// Assembles the argument vector for one invocation of the tool.
///
/// Layout: base flags, configured extra flags, then the mandatory
/// strategy flags (delete, filter file, dry run), then source and
/// destination. Mandatory flags come after the pass-through flags so a
/// pass-through flag can never shadow them.
#[derive(Clone, Copy, Debug)]
pub struct CommandBuilder<'a> {
    config: &'a SyncConfig,
}

impl<'a> CommandBuilder<'a> {
    /// Creates a builder bound to `config`.
    #[must_use]
    pub const fn new(config: &'a SyncConfig) -> Self {
        Self { config }
    }

    /// Returns the arguments (without the program name) for `strategy`.
    #[must_use]
    pub fn build(&self, strategy: Strategy, filter_file: &Path) -> Vec<OsString> {
        let config = self.config;
        let mut args: Vec<OsString> = Vec::with_capacity(config.extra_args().len() + 8);

        args.extend(BASE_FLAGS.iter().map(OsString::from));
        args.extend(config.extra_args().iter().cloned());

        if strategy.deletes(config) {
            args.push(OsString::from(DELETE_FLAG));
        }
        args.push(OsString::from(FILTER_FILE_FLAG));
        args.push(filter_file.as_os_str().to_os_string());
        if config.dry_run() {
            args.push(OsString::from(DRY_RUN_FLAG));
        }

        args.push(config.source().as_os_str().to_os_string());
        args.push(config.destination().as_os_str().to_os_string());
        args
    }
}
