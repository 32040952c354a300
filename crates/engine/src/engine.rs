use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use filters::{FilterRule, FilterSetBuilder, with_filter_file};

use crate::{CommandBuilder, ProcessRunner, Strategy, SyncConfig, SyncError, SyncOutcome};

/// Paths reported by a watcher, split into the two sets that drive the two
/// incremental strategies.
///
/// A path lives in at most one set; recording it again moves it to the set
/// matching the latest observation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeSet {
    changed: BTreeSet<PathBuf>,
    removed: BTreeSet<PathBuf>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path` as added or modified.
    pub fn record_changed(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.removed.remove(&path);
        self.changed.insert(path);
    }

    /// Records `path` as removed.
    pub fn record_removed(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.changed.remove(&path);
        self.removed.insert(path);
    }

    /// Added or modified paths.
    #[must_use]
    pub const fn changed(&self) -> &BTreeSet<PathBuf> {
        &self.changed
    }

    /// Removed paths.
    #[must_use]
    pub const fn removed(&self) -> &BTreeSet<PathBuf> {
        &self.removed
    }

    /// Reports whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Runs synchronisations for one mapping.
///
/// Each entry point is one blocking pipeline: build the rules, write them to
/// a scoped filter file, assemble the command, run the tool, return the
/// verdict. The engine keeps no state between calls.
#[derive(Clone, Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    runner: ProcessRunner,
}

impl SyncEngine {
    /// Creates an engine for `config`.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        let runner = ProcessRunner::new().with_timeout(config.timeout());
        Self { config, runner }
    }

    /// Configuration this engine runs with.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Mirrors the whole source tree, deleting extraneous destination entries.
    pub fn run_full<Out, Err>(
        &self,
        stdout: &mut Out,
        stderr: &mut Err,
    ) -> Result<SyncOutcome, SyncError>
    where
        Out: Write,
        Err: Write,
    {
        let rules = FilterSetBuilder::build_for_sync(self.config.excludes().iter().cloned());
        self.execute(Strategy::Full, &rules, stdout, stderr)
    }

    /// Transfers added and changed files.
    ///
    /// The tool rescans the whole source and transfers whatever differs, so
    /// `changed` only feeds diagnostics. Extraneous destination entries are
    /// deleted only when the mapping enables deletion.
    pub fn run_on_change<I, P, Out, Err>(
        &self,
        changed: I,
        stdout: &mut Out,
        stderr: &mut Err,
    ) -> Result<SyncOutcome, SyncError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        Out: Write,
        Err: Write,
    {
        let count = changed.into_iter().count();
        tracing::info!(
            target: "mirror::cmd",
            source = %self.config.source().display(),
            changed = count,
            "syncing changes"
        );
        let rules = FilterSetBuilder::build_for_sync(self.config.excludes().iter().cloned());
        self.execute(Strategy::Incremental, &rules, stdout, stderr)
    }

    /// Deletes the destination counterparts of `removed` and nothing else.
    ///
    /// # Errors
    ///
    /// Besides the runner's errors, [`SyncError::Filter`] is returned before
    /// anything is spawned when a removed path cannot be expressed relative
    /// to the source root.
    pub fn run_on_removal<I, P, Out, Err>(
        &self,
        removed: I,
        stdout: &mut Out,
        stderr: &mut Err,
    ) -> Result<SyncOutcome, SyncError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        Out: Write,
        Err: Write,
    {
        let rules = FilterSetBuilder::build_for_removal(removed, self.config.source())?;
        let rules = FilterSetBuilder::anchor_for_transfer(rules, self.config.transfer_top());
        self.execute(Strategy::Removal, &rules, stdout, stderr)
    }

    /// Applies a watcher batch: removals first, then changes.
    ///
    /// Returns the verdict of each invocation that ran, in order. An empty
    /// set runs nothing.
    pub fn apply<Out, Err>(
        &self,
        changes: &ChangeSet,
        stdout: &mut Out,
        stderr: &mut Err,
    ) -> Result<Vec<(Strategy, SyncOutcome)>, SyncError>
    where
        Out: Write,
        Err: Write,
    {
        let mut outcomes = Vec::with_capacity(2);
        if !changes.removed().is_empty() {
            let outcome = self.run_on_removal(changes.removed(), stdout, stderr)?;
            outcomes.push((Strategy::Removal, outcome));
        }
        if !changes.changed().is_empty() {
            let outcome = self.run_on_change(changes.changed(), stdout, stderr)?;
            outcomes.push((Strategy::Incremental, outcome));
        }
        Ok(outcomes)
    }

    fn execute<Out, Err>(
        &self,
        strategy: Strategy,
        rules: &[FilterRule],
        stdout: &mut Out,
        stderr: &mut Err,
    ) -> Result<SyncOutcome, SyncError>
    where
        Out: Write,
        Err: Write,
    {
        for rule in rules {
            tracing::trace!(target: "mirror::filter", %strategy, rule = %rule);
        }

        with_filter_file(rules, |filter_file| {
            let args = CommandBuilder::new(&self.config).build(strategy, filter_file);
            let binary = self.config.rsync_binary();
            tracing::debug!(
                target: "mirror::cmd",
                %strategy,
                binary = %binary.to_string_lossy(),
                args = ?args,
                "running rsync"
            );

            let outcome = self.runner.run(binary, &args, stdout, stderr)?;
            if outcome.success() {
                tracing::info!(target: "mirror::exit", %strategy, "sync finished");
            } else {
                tracing::warn!(
                    target: "mirror::exit",
                    %strategy,
                    code = outcome.exit_code(),
                    timed_out = outcome.timed_out(),
                    "sync failed"
                );
            }
            Ok(outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ChangeSet;
    use std::path::PathBuf;

    #[test]
    fn change_set_keeps_paths_in_one_set() {
        let mut changes = ChangeSet::new();
        changes.record_changed("/src/a.txt");
        changes.record_removed("/src/a.txt");
        changes.record_removed("/src/b.txt");
        changes.record_changed("/src/b.txt");

        assert_eq!(
            changes.removed().iter().collect::<Vec<_>>(),
            [&PathBuf::from("/src/a.txt")]
        );
        assert_eq!(
            changes.changed().iter().collect::<Vec<_>>(),
            [&PathBuf::from("/src/b.txt")]
        );
    }

    #[test]
    fn empty_change_set_reports_empty() {
        let mut changes = ChangeSet::new();
        assert!(changes.is_empty());
        changes.record_changed("x");
        assert!(!changes.is_empty());
    }
}
