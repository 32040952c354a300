use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::ConfigError;
use crate::binary::resolve_binary;

/// Where the mirror is written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Destination {
    /// A directory on the local filesystem.
    Local(PathBuf),
    /// A `host:path`, `host::module` or `rsync://` endpoint handled by the tool.
    Remote(String),
}

impl Destination {
    /// Classifies and validates a destination operand.
    ///
    /// Remote endpoints are accepted without touching the filesystem. Anything
    /// else must name an existing local directory.
    pub fn parse(raw: impl AsRef<OsStr>) -> Result<Self, ConfigError> {
        let raw = raw.as_ref();
        if let Some(text) = raw.to_str() {
            if is_remote_endpoint(text) {
                return Ok(Self::Remote(text.to_owned()));
            }
        }

        let path = PathBuf::from(raw);
        if path.is_dir() {
            Ok(Self::Local(path))
        } else {
            Err(ConfigError::InvalidDestination(
                raw.to_string_lossy().into_owned(),
            ))
        }
    }

    /// Reports whether the destination is reached over the network.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Returns the operand passed to the external tool.
    #[must_use]
    pub fn as_os_str(&self) -> &OsStr {
        match self {
            Self::Local(path) => path.as_os_str(),
            Self::Remote(endpoint) => OsStr::new(endpoint),
        }
    }

    /// Returns the local directory, if any.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }
}

/// Returns `true` when `text` has the shape of a remote endpoint.
///
/// The rule follows the tool's own operand parsing: `rsync://` URLs, or a
/// non-empty host part followed by a colon that appears before any `/`.
#[must_use]
pub fn is_remote_endpoint(text: &str) -> bool {
    if text.starts_with("rsync://") {
        return true;
    }
    match text.find(':') {
        Some(0) | None => false,
        Some(colon) => !text[..colon].contains('/'),
    }
}

/// Exclude configuration as it appears in a mapping file.
///
/// Only [`Excludes::List`] is usable. The mapping shape is accepted by the
/// deserialiser so it can be rejected with a clear message instead of a
/// generic type error.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Excludes {
    /// Ordered exclude patterns.
    List(Vec<String>),
    /// Pattern-to-transform mapping; always rejected.
    Mapping(BTreeMap<String, IgnoredAny>),
}

impl Default for Excludes {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// Immutable settings for one source-to-destination mapping.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    source: PathBuf,
    transfer_top: Option<String>,
    destination: Destination,
    delete: bool,
    dry_run: bool,
    extra_args: Vec<OsString>,
    excludes: Vec<String>,
    rsync_binary: OsString,
    timeout: Option<Duration>,
}

impl SyncConfig {
    /// Starts a builder for the given source and destination operands.
    pub fn builder(
        source: impl Into<PathBuf>,
        destination: impl Into<OsString>,
    ) -> SyncConfigBuilder {
        SyncConfigBuilder {
            source: source.into(),
            destination: destination.into(),
            delete: false,
            dry_run: false,
            extra_args: Vec::new(),
            excludes: Excludes::default(),
            rsync_binary: None,
            timeout: None,
        }
    }

    /// Source directory, without a trailing separator.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Name of the directory the tool creates at the destination, if any.
    ///
    /// `None` when the source is `/`, `.` or `..`, whose contents are
    /// transferred directly.
    #[must_use]
    pub fn transfer_top(&self) -> Option<&str> {
        self.transfer_top.as_deref()
    }

    /// Validated destination.
    #[must_use]
    pub const fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Whether incremental syncs also delete extraneous destination entries.
    #[must_use]
    pub const fn delete(&self) -> bool {
        self.delete
    }

    /// Whether the tool is asked for a dry run.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Raw flags passed through to the tool.
    #[must_use]
    pub fn extra_args(&self) -> &[OsString] {
        &self.extra_args
    }

    /// Static exclude patterns, in configured order.
    #[must_use]
    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Tool binary to execute.
    #[must_use]
    pub fn rsync_binary(&self) -> &OsStr {
        &self.rsync_binary
    }

    /// Optional limit on how long one invocation may run.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Builder for [`SyncConfig`]; validation happens in [`build`](Self::build).
#[derive(Clone, Debug)]
pub struct SyncConfigBuilder {
    source: PathBuf,
    destination: OsString,
    delete: bool,
    dry_run: bool,
    extra_args: Vec<OsString>,
    excludes: Excludes,
    rsync_binary: Option<OsString>,
    timeout: Option<Duration>,
}

impl SyncConfigBuilder {
    /// Deletes extraneous destination entries on incremental syncs too.
    #[must_use]
    pub fn delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }

    /// Asks the tool for a dry run.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Appends raw flags passed through to the tool.
    #[must_use]
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Replaces the exclude configuration.
    #[must_use]
    pub fn excludes(mut self, excludes: Excludes) -> Self {
        self.excludes = excludes;
        self
    }

    /// Appends one exclude pattern.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        match &mut self.excludes {
            Excludes::List(patterns) => patterns.push(pattern.into()),
            Excludes::Mapping(_) => {}
        }
        self
    }

    /// Uses an explicit tool binary instead of the environment/default lookup.
    #[must_use]
    pub fn rsync_binary(mut self, binary: impl Into<OsString>) -> Self {
        self.rsync_binary = Some(binary.into());
        self
    }

    /// Limits how long one invocation may run.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the settings and produces a [`SyncConfig`].
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let source = strip_trailing_separators(&self.source);
        if !source.is_dir() {
            return Err(ConfigError::SourceNotDirectory(self.source));
        }
        let transfer_top = match source.components().next_back() {
            Some(Component::Normal(name)) => Some(
                name.to_str()
                    .ok_or_else(|| ConfigError::NonUtf8Source(source.clone()))?
                    .to_owned(),
            ),
            _ => None,
        };
        if transfer_top
            .as_deref()
            .is_some_and(|top| top.contains(['\n', '\r']))
        {
            return Err(ConfigError::LineBreakInSource(source));
        }

        let destination = Destination::parse(&self.destination)?;

        let excludes = match self.excludes {
            Excludes::List(patterns) => patterns,
            Excludes::Mapping(_) => return Err(ConfigError::MappingExcludes),
        };

        if self.rsync_binary.as_ref().is_some_and(|binary| binary.is_empty()) {
            return Err(ConfigError::EmptyBinary);
        }
        let rsync_binary = resolve_binary(self.rsync_binary.as_deref());

        tracing::debug!(
            target: "mirror::config",
            source = %source.display(),
            destination = %destination.as_os_str().to_string_lossy(),
            remote = destination.is_remote(),
            "validated mapping"
        );

        Ok(SyncConfig {
            source,
            transfer_top,
            destination,
            delete: self.delete,
            dry_run: self.dry_run,
            extra_args: self.extra_args,
            excludes,
            rsync_binary,
            timeout: self.timeout,
        })
    }
}

/// Drops trailing separators; `/` stays `/`.
fn strip_trailing_separators(path: &Path) -> PathBuf {
    path.components().collect()
}
