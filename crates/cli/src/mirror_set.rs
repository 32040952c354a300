use std::collections::HashSet;
use std::io::Write;

use engine::{SyncEngine, SyncOutcome};

use crate::CliError;
use crate::config_file::Mapping;

/// A mapping together with the engine that runs it.
#[derive(Clone, Debug)]
pub struct MirrorEntry {
    name: String,
    group: Option<String>,
    run_group_on_start: bool,
    engine: SyncEngine,
}

impl MirrorEntry {
    /// Mapping name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapping group, if any.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Engine bound to the mapping's settings.
    #[must_use]
    pub const fn engine(&self) -> &SyncEngine {
        &self.engine
    }
}

impl From<Mapping> for MirrorEntry {
    fn from(mapping: Mapping) -> Self {
        Self {
            name: mapping.name,
            group: mapping.group,
            run_group_on_start: mapping.run_group_on_start,
            engine: SyncEngine::new(mapping.config),
        }
    }
}

/// Verdict of one full sync performed during a start pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StartedRun {
    /// Mapping that ran.
    pub name: String,
    /// Its verdict.
    pub outcome: SyncOutcome,
}

/// The mappings a process manages, in configuration order.
#[derive(Clone, Debug, Default)]
pub struct MirrorSet {
    entries: Vec<MirrorEntry>,
}

impl MirrorSet {
    /// Wraps validated mappings.
    #[must_use]
    pub fn new(mappings: Vec<Mapping>) -> Self {
        Self {
            entries: mappings.into_iter().map(MirrorEntry::from).collect(),
        }
    }

    /// All entries, in configuration order.
    #[must_use]
    pub fn entries(&self) -> &[MirrorEntry] {
        &self.entries
    }

    /// Names of all entries, in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(MirrorEntry::name)
    }

    /// Starts the mapping called `name`.
    ///
    /// Runs its full sync, then, when the mapping has `run_group_on_start`,
    /// the full sync of every other mapping in the same group.
    pub fn start<Out, Err>(
        &self,
        name: &str,
        stdout: &mut Out,
        stderr: &mut Err,
    ) -> Result<Vec<StartedRun>, CliError>
    where
        Out: Write,
        Err: Write,
    {
        self.start_all([name], stdout, stderr)
    }

    /// Starts several mappings in one pass; each mapping runs at most once.
    ///
    /// # Errors
    ///
    /// [`CliError::UnknownMapping`] before anything runs when a name is not
    /// configured, and [`CliError::Sync`] as soon as a sync cannot reach a
    /// verdict. Failed transfers are reported in the returned runs.
    pub fn start_all<'n, I, Out, Err>(
        &self,
        names: I,
        stdout: &mut Out,
        stderr: &mut Err,
    ) -> Result<Vec<StartedRun>, CliError>
    where
        I: IntoIterator<Item = &'n str>,
        Out: Write,
        Err: Write,
    {
        let mut plan = Vec::new();
        let mut planned = HashSet::new();
        for name in names {
            let index = self
                .position(name)
                .ok_or_else(|| CliError::UnknownMapping(name.to_owned()))?;
            for member in self.start_order(index) {
                if planned.insert(member) {
                    plan.push(member);
                }
            }
        }

        let mut runs = Vec::with_capacity(plan.len());
        for index in plan {
            let entry = &self.entries[index];
            tracing::info!(target: "mirror::cmd", mapping = %entry.name, "starting mapping");
            let outcome = entry.engine.run_full(stdout, stderr)?;
            runs.push(StartedRun {
                name: entry.name.clone(),
                outcome,
            });
        }
        Ok(runs)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }

    /// The mapping itself first, then its group peers in configuration order.
    fn start_order(&self, index: usize) -> Vec<usize> {
        let entry = &self.entries[index];
        let mut order = vec![index];
        if let (true, Some(group)) = (entry.run_group_on_start, entry.group.as_deref()) {
            order.extend(
                self.entries
                    .iter()
                    .enumerate()
                    .filter(|(other, peer)| *other != index && peer.group() == Some(group))
                    .map(|(other, _)| other),
            );
        }
        order
    }
}
