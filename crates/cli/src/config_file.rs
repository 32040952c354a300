//! JSON mapping files.
//!
//! ```json
//! {
//!   "rsync": "/usr/bin/rsync",
//!   "timeout_secs": 600,
//!   "mappings": [
//!     { "name": "site", "group": "web", "source": "./site",
//!       "destination": "host:/srv/site", "excludes": ["*.tmp"] }
//!   ]
//! }
//! ```
//!
//! Relative local paths are resolved against the directory holding the file.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::{Excludes, SyncConfig, is_remote_endpoint};
use serde::Deserialize;

use crate::CliError;

/// Top-level contents of a mapping file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorFile {
    /// Tool binary used by every mapping.
    #[serde(default)]
    pub rsync: Option<PathBuf>,
    /// Per-invocation time limit, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Source-to-destination mappings.
    pub mappings: Vec<MappingEntry>,
}

/// One mapping as written in the file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingEntry {
    /// Unique name used by `--mapping`.
    pub name: String,
    /// Group shared with related mappings.
    #[serde(default)]
    pub group: Option<String>,
    /// Local source directory.
    pub source: PathBuf,
    /// Local directory or remote endpoint.
    pub destination: String,
    /// Delete on incremental syncs too.
    #[serde(default)]
    pub delete: bool,
    /// Flags passed through to the tool.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Static exclude patterns.
    #[serde(default)]
    pub excludes: Excludes,
    /// Starting this mapping also starts the rest of its group.
    #[serde(default)]
    pub run_group_on_start: bool,
}

/// Settings applied on top of every mapping in a file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// Tool binary; wins over the file's `rsync`.
    pub rsync: Option<PathBuf>,
    /// Time limit; wins over the file's `timeout_secs`.
    pub timeout: Option<Duration>,
    /// Ask the tool for a dry run.
    pub dry_run: bool,
}

/// A validated mapping ready to run.
#[derive(Clone, Debug)]
pub struct Mapping {
    /// Unique name.
    pub name: String,
    /// Group, if any.
    pub group: Option<String>,
    /// Whether starting this mapping starts its group.
    pub run_group_on_start: bool,
    /// Validated settings.
    pub config: SyncConfig,
}

impl MirrorFile {
    /// Reads and parses `path`.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| CliError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses mapping-file text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Validates every mapping, resolving relative local paths under `base`.
    pub fn into_mappings(self, base: &Path, overrides: &Overrides) -> Result<Vec<Mapping>, CliError> {
        let rsync = overrides.rsync.clone().or(self.rsync);
        let timeout = overrides
            .timeout
            .or_else(|| self.timeout_secs.map(Duration::from_secs));

        let mut names = HashSet::new();
        let mut mappings = Vec::with_capacity(self.mappings.len());
        for entry in self.mappings {
            if !names.insert(entry.name.clone()) {
                return Err(CliError::DuplicateMapping(entry.name));
            }

            let source = base.join(&entry.source);
            let destination = if is_remote_endpoint(&entry.destination) {
                OsString::from(&entry.destination)
            } else {
                base.join(&entry.destination).into_os_string()
            };

            let mut builder = SyncConfig::builder(source, destination)
                .delete(entry.delete)
                .dry_run(overrides.dry_run)
                .extra_args(entry.extra_args)
                .excludes(entry.excludes)
                .timeout(timeout);
            if let Some(rsync) = &rsync {
                builder = builder.rsync_binary(rsync.clone());
            }
            let config = builder.build().map_err(|source| CliError::Mapping {
                name: entry.name.clone(),
                source,
            })?;

            tracing::debug!(
                target: "mirror::config",
                mapping = %entry.name,
                group = entry.group.as_deref().unwrap_or("-"),
                "loaded mapping"
            );
            mappings.push(Mapping {
                name: entry.name,
                group: entry.group,
                run_group_on_start: entry.run_group_on_start,
                config,
            });
        }
        Ok(mappings)
    }
}
