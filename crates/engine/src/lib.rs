#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` mirrors a local directory tree to a local or remote destination
//! by driving an external `rsync` binary. It owns the three synchronisation
//! strategies, the argument layout handed to the tool, and the subprocess
//! loop that streams the tool's output back to the caller.
//!
//! # Design
//!
//! - [`SyncConfig`] is the validated, immutable description of one mapping.
//!   It is built through [`SyncConfig::builder`], which checks the source,
//!   classifies the [`Destination`] and resolves the tool binary.
//! - [`CommandBuilder`] turns a [`Strategy`] and a filter-file path into the
//!   argument vector.
//! - [`ProcessRunner`] spawns the tool with standard input closed and
//!   forwards stdout and stderr chunk by chunk. The verdict is derived from
//!   the exit status alone.
//! - [`SyncEngine`] ties the pieces together: rules from
//!   [`filters::FilterSetBuilder`], a scoped [`filters::FilterFile`], the
//!   command, the run. [`ChangeSet`] batches watcher observations for
//!   [`SyncEngine::apply`].
//!
//! # Invariants
//!
//! - Full and removal syncs always pass `--delete`; incremental syncs pass
//!   it only when the mapping enables deletion.
//! - Every invocation carries `--exclude-from`, and the file it names is
//!   removed once the invocation finishes, whatever the outcome.
//! - Pass-through flags precede the mandatory flags.
//! - The source operand never ends in a separator, so the tool recreates
//!   the source directory itself beneath the destination.
//!
//! # Errors
//!
//! [`SyncError`] is returned when a verdict could not be reached: invalid
//! configuration, unrepresentable removed paths, a binary that cannot be
//! launched, or I/O failures while streaming. A tool that runs and fails is
//! reported through [`SyncOutcome::success`] instead.
//!
//! # Examples
//!
//! ```no_run
//! use engine::{SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::builder("/srv/site", "backup-host:/mirror")
//!     .exclude(".git/")
//!     .build()?;
//! let engine = SyncEngine::new(config);
//!
//! let mut stdout = std::io::stdout().lock();
//! let mut stderr = std::io::stderr().lock();
//! let outcome = engine.run_on_removal(["/srv/site/old.html"], &mut stdout, &mut stderr)?;
//! assert!(outcome.success());
//! # Ok::<(), engine::SyncError>(())
//! ```

mod binary;
mod command;
mod config;
mod engine;
mod error;
mod runner;

pub use binary::{DEFAULT_RSYNC_BINARY, RSYNC_BINARY_ENV, describe_missing_binary, resolve_binary};
pub use command::{
    BASE_FLAGS, CommandBuilder, DELETE_FLAG, DRY_RUN_FLAG, FILTER_FILE_FLAG, Strategy,
};
pub use config::{Destination, Excludes, SyncConfig, SyncConfigBuilder, is_remote_endpoint};
pub use engine::{ChangeSet, SyncEngine};
pub use error::{ConfigError, SyncError};
pub use runner::{KILL_GRACE, MAX_EXIT_CODE, ProcessRunner, SyncOutcome};
