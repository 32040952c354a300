//! Watch mode: turn debounced filesystem events into incremental syncs.
//!
//! Events are batched by `notify-debouncer-mini`, routed to the mapping whose
//! source contains them, and classified by whether the path still exists.
//! Each mapping's batch runs removals first, then changes, one mapping after
//! the other.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use engine::{ChangeSet, Strategy};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};

use crate::{CliError, MirrorSet};

/// Quiet period before a burst of events is delivered as one batch.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Clone, Debug)]
struct Route {
    source: PathBuf,
    canonical_source: Option<PathBuf>,
    destinations: Vec<PathBuf>,
}

impl Route {
    fn relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        path.strip_prefix(&self.source).ok().or_else(|| {
            self.canonical_source
                .as_ref()
                .and_then(|canonical| path.strip_prefix(canonical).ok())
        })
    }
}

/// Routes event paths to the mappings of a [`MirrorSet`].
#[derive(Clone, Debug)]
pub struct WatchDispatcher {
    routes: Vec<Route>,
}

impl WatchDispatcher {
    /// Builds the routing table for `set`, one route per entry, same order.
    #[must_use]
    pub fn new(set: &MirrorSet) -> Self {
        let routes = set
            .entries()
            .iter()
            .map(|entry| {
                let config = entry.engine().config();
                let source = config.source().to_path_buf();
                Route {
                    canonical_source: source.canonicalize().ok(),
                    source,
                    destinations: config
                        .destination()
                        .local_path()
                        .map(|path| {
                            let mut forms = vec![path.to_path_buf()];
                            forms.extend(path.canonicalize().ok());
                            forms
                        })
                        .unwrap_or_default(),
                }
            })
            .collect();
        Self { routes }
    }

    /// Source directories to subscribe to, in entry order.
    pub fn watch_roots(&self) -> impl Iterator<Item = &Path> {
        self.routes
            .iter()
            .map(|route| route.canonical_source.as_deref().unwrap_or(&route.source))
    }

    /// Splits a batch of event paths into one [`ChangeSet`] per mapping.
    ///
    /// A path that still exists counts as changed, a missing one as removed.
    /// Paths inside any local destination are dropped so a mirror nested in
    /// its own source does not retrigger itself. Mappings without events are
    /// omitted.
    pub fn route<I, P>(&self, paths: I) -> Vec<(usize, ChangeSet)>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut batches: Vec<ChangeSet> = vec![ChangeSet::new(); self.routes.len()];

        for path in paths {
            let path = path.as_ref();
            if self.inside_destination(path) {
                tracing::trace!(
                    target: "mirror::watch",
                    path = %path.display(),
                    "ignoring event inside a destination"
                );
                continue;
            }
            let exists = path.symlink_metadata().is_ok();
            for (route, batch) in self.routes.iter().zip(batches.iter_mut()) {
                let Some(relative) = route.relative(path) else {
                    continue;
                };
                let path = route.source.join(relative);
                if exists {
                    batch.record_changed(path);
                } else {
                    batch.record_removed(path);
                }
            }
        }

        batches
            .into_iter()
            .enumerate()
            .filter(|(_, batch)| !batch.is_empty())
            .collect()
    }

    fn inside_destination(&self, path: &Path) -> bool {
        self.routes
            .iter()
            .flat_map(|route| &route.destinations)
            .any(|destination| path.starts_with(destination))
    }
}

/// Applies routed batches to `set`. Failures are logged and do not stop the
/// remaining mappings; the number of failed syncs is returned.
pub fn dispatch<Out, Err>(
    set: &MirrorSet,
    batches: Vec<(usize, ChangeSet)>,
    stdout: &mut Out,
    stderr: &mut Err,
) -> usize
where
    Out: Write,
    Err: Write,
{
    let mut failures = 0;
    for (index, changes) in batches {
        let Some(entry) = set.entries().get(index) else {
            continue;
        };
        tracing::debug!(
            target: "mirror::watch",
            mapping = entry.name(),
            changed = changes.changed().len(),
            removed = changes.removed().len(),
            "dispatching batch"
        );
        match entry.engine().apply(&changes, stdout, stderr) {
            Ok(outcomes) => {
                for (strategy, outcome) in outcomes {
                    if !outcome.success() {
                        failures += 1;
                        report_failure(entry.name(), strategy, outcome.exit_code());
                    }
                }
            }
            Err(error) => {
                failures += 1;
                tracing::error!(target: "mirror::watch", mapping = entry.name(), %error, "sync aborted");
            }
        }
    }
    failures
}

fn report_failure(mapping: &str, strategy: Strategy, code: i32) {
    tracing::warn!(target: "mirror::watch", mapping, %strategy, code, "sync failed");
}

/// Consumes event batches from `events` until the sender goes away.
pub fn run_loop<Out, Err>(
    set: &MirrorSet,
    dispatcher: &WatchDispatcher,
    events: &Receiver<Vec<PathBuf>>,
    stdout: &mut Out,
    stderr: &mut Err,
) where
    Out: Write,
    Err: Write,
{
    for paths in events {
        let batches = dispatcher.route(paths);
        if !batches.is_empty() {
            dispatch(set, batches, stdout, stderr);
        }
    }
}

/// Watches every source of `set` and syncs changes until the process ends.
pub fn watch<Out, Err>(set: &MirrorSet, stdout: &mut Out, stderr: &mut Err) -> Result<(), CliError>
where
    Out: Write,
    Err: Write,
{
    let dispatcher = WatchDispatcher::new(set);
    let (sender, receiver) = mpsc::channel();

    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| match result {
        Ok(events) => {
            let paths: Vec<PathBuf> = events.into_iter().map(|event| event.path).collect();
            let _ = sender.send(paths);
        }
        Err(error) => {
            tracing::warn!(target: "mirror::watch", %error, "watcher error");
        }
    })
    .map_err(CliError::Watcher)?;

    for root in dispatcher.watch_roots() {
        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| CliError::Watch {
                path: root.to_path_buf(),
                source,
            })?;
        tracing::info!(target: "mirror::watch", root = %root.display(), "watching");
    }

    run_loop(set, &dispatcher, &receiver, stdout, stderr);
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config_file::Mapping;
    use engine::SyncConfig;
    use test_support::{FakeRsync, TestDir};

    struct Fixture {
        scratch: TestDir,
        fake: FakeRsync,
    }

    impl Fixture {
        fn new() -> Self {
            let scratch = TestDir::new().expect("scratch");
            let tools = scratch.mkdir("tools").expect("tools");
            let fake = FakeRsync::install(&tools, 0).expect("fake");
            Self { scratch, fake }
        }

        fn mapping(&self, name: &str, destination: &Path) -> Mapping {
            let source = self.scratch.mkdir(name).expect("source");
            Mapping {
                name: name.to_owned(),
                group: None,
                run_group_on_start: false,
                config: SyncConfig::builder(source, destination)
                    .rsync_binary(self.fake.binary())
                    .build()
                    .expect("config"),
            }
        }
    }

    #[test]
    fn existing_paths_are_changes_and_missing_paths_are_removals() {
        let fixture = Fixture::new();
        let dest = fixture.scratch.mkdir("dest").expect("dest");
        let set = MirrorSet::new(vec![fixture.mapping("site", &dest)]);
        let present = fixture.scratch.write_file("site/a.txt", b"a").expect("file");
        let gone = fixture.scratch.path().join("site/b.txt");

        let batches = WatchDispatcher::new(&set).route([&present, &gone]);

        assert_eq!(batches.len(), 1);
        let (index, changes) = &batches[0];
        assert_eq!(*index, 0);
        assert!(changes.changed().contains(&present));
        assert!(changes.removed().contains(&gone));
    }

    #[test]
    fn paths_are_routed_to_the_owning_mapping() {
        let fixture = Fixture::new();
        let dest = fixture.scratch.mkdir("dest").expect("dest");
        let set = MirrorSet::new(vec![
            fixture.mapping("one", &dest),
            fixture.mapping("two", &dest),
        ]);
        let file = fixture.scratch.write_file("two/x.txt", b"x").expect("file");

        let batches = WatchDispatcher::new(&set).route([&file]);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, 1);
    }

    #[test]
    fn events_inside_a_local_destination_are_ignored() {
        let fixture = Fixture::new();
        let source = fixture.scratch.mkdir("site").expect("site");
        let nested = fixture.scratch.mkdir("site/mirror").expect("nested dest");
        let set = MirrorSet::new(vec![Mapping {
            name: "site".into(),
            group: None,
            run_group_on_start: false,
            config: SyncConfig::builder(&source, &nested)
                .rsync_binary(fixture.fake.binary())
                .build()
                .expect("config"),
        }]);
        let echoed = fixture.scratch.write_file("site/mirror/site/a.txt", b"a").expect("file");

        assert!(WatchDispatcher::new(&set).route([&echoed]).is_empty());
    }

    #[test]
    fn loop_runs_removal_then_change_and_stops_when_events_end() {
        let fixture = Fixture::new();
        let dest = fixture.scratch.mkdir("dest").expect("dest");
        let set = MirrorSet::new(vec![fixture.mapping("site", &dest)]);
        let dispatcher = WatchDispatcher::new(&set);
        let present = fixture.scratch.write_file("site/a.txt", b"a").expect("file");
        let gone = fixture.scratch.path().join("site/old.txt");

        let (sender, receiver) = mpsc::channel();
        sender.send(vec![present, gone]).expect("send");
        drop(sender);
        run_loop(&set, &dispatcher, &receiver, &mut Vec::new(), &mut Vec::new());

        let calls = fixture.fake.invocations().expect("log");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].rules, ["+ /site", "+ /site/old.txt", "- *"]);
        assert_eq!(calls[1].rules, Vec::<String>::new());
    }

    #[test]
    fn dispatch_counts_failed_syncs() {
        let scratch = TestDir::new().expect("scratch");
        let tools = scratch.mkdir("tools").expect("tools");
        let failing = FakeRsync::install(&tools, 23).expect("fake");
        let source = scratch.mkdir("site").expect("site");
        let set = MirrorSet::new(vec![Mapping {
            name: "site".into(),
            group: None,
            run_group_on_start: false,
            config: SyncConfig::builder(&source, "host:/site")
                .rsync_binary(failing.binary())
                .build()
                .expect("config"),
        }]);
        let file = scratch.write_file("site/a.txt", b"a").expect("file");

        let batches = WatchDispatcher::new(&set).route([&file]);
        let failures = dispatch(&set, batches, &mut Vec::new(), &mut Vec::new());

        assert_eq!(failures, 1);
    }
}
