use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::{FilterAction, FilterError, FilterRule, escape_literal};

/// Produces the ordered rule list for one invocation of the external tool.
///
/// Two shapes exist. Full and incremental syncs pass the configured excludes
/// through untouched. Removal syncs allow exactly the removed paths (and every
/// directory leading to them) through an otherwise total exclusion, so the
/// tool's delete pass only touches those paths at the destination.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterSetBuilder;

impl FilterSetBuilder {
    /// Returns the static exclude patterns as exclude rules, in configured order.
    #[must_use]
    pub fn build_for_sync<I, S>(static_excludes: I) -> Vec<FilterRule>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        static_excludes
            .into_iter()
            .map(FilterRule::exclude)
            .collect()
    }

    /// Builds include rules for every removed path plus its ancestor chain,
    /// followed by a single catch-all exclude.
    ///
    /// Paths are resolved against `source_root`. Relative paths are taken as
    /// already relative to the root; absolute paths must lie beneath it. A
    /// path equal to the root contributes no rules. Duplicate prefixes shared
    /// by several removed paths are emitted once, at their first position.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::OutsideRoot`] for an absolute path that is not
    /// beneath `source_root`, [`FilterError::ParentComponent`] for a path that
    /// uses `..`, [`FilterError::NonUtf8`] for a path that cannot be written to
    /// the filter file, and [`FilterError::LineBreak`] for a name containing a
    /// newline or carriage return, which would split its rule in two.
    pub fn build_for_removal<I, P>(
        removed_paths: I,
        source_root: &Path,
    ) -> Result<Vec<FilterRule>, FilterError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut rules = Vec::new();
        let mut seen = HashSet::new();

        for removed in removed_paths {
            let removed = removed.as_ref();
            let relative = relative_to_root(removed, source_root)?;
            let components = literal_components(removed, &relative)?;

            let mut prefix = String::new();
            for component in components {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(&component);
                if seen.insert(prefix.clone()) {
                    rules.push(FilterRule::include(escape_literal(&prefix)));
                }
            }
        }

        rules.push(FilterRule::exclude_all());
        tracing::debug!(
            target: "mirror::filter",
            rules = rules.len(),
            "built removal filter set"
        );
        Ok(rules)
    }

    /// Anchors root-relative removal rules to the transfer root the external
    /// tool actually sees.
    ///
    /// A source handed over without a trailing separator is transferred as
    /// `top/...`, so include rules are re-rooted under `/top` and an include
    /// for `/top` itself is placed first. When there is no top directory (the
    /// source is `.` or `/`) includes are simply anchored with a leading `/`.
    /// Exclude rules are kept as they are.
    #[must_use]
    pub fn anchor_for_transfer(rules: Vec<FilterRule>, top: Option<&str>) -> Vec<FilterRule> {
        let mut anchored = Vec::with_capacity(rules.len() + 1);
        if let Some(top) = top {
            anchored.push(FilterRule::include("").anchor_under(top));
        }
        for rule in rules {
            let rule = match (rule.action(), top) {
                (FilterAction::Include, Some(top)) => rule.anchor_under(top),
                (FilterAction::Include, None) => rule.anchor_to_root(),
                (FilterAction::Exclude, _) => rule,
            };
            anchored.push(rule);
        }
        anchored
    }
}

fn relative_to_root(path: &Path, root: &Path) -> Result<PathBuf, FilterError> {
    if path.is_relative() {
        return Ok(path.to_path_buf());
    }
    if let Ok(relative) = path.strip_prefix(root) {
        return Ok(relative.to_path_buf());
    }

    // Watchers tend to report canonical paths while the root may be configured
    // through a symlink (e.g. /var vs /private/var).
    if let Ok(canonical_root) = root.canonicalize() {
        if let Ok(relative) = path.strip_prefix(&canonical_root) {
            return Ok(relative.to_path_buf());
        }
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Ok(canonical_parent) = parent.canonicalize() {
                if let Ok(relative) = canonical_parent.join(name).strip_prefix(&canonical_root) {
                    return Ok(relative.to_path_buf());
                }
            }
        }
    }

    Err(FilterError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    })
}

fn literal_components(original: &Path, relative: &Path) -> Result<Vec<String>, FilterError> {
    let mut components = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name
                    .to_str()
                    .ok_or_else(|| FilterError::NonUtf8(original.to_path_buf()))?;
                if name.contains(['\n', '\r']) {
                    return Err(FilterError::LineBreak(original.to_path_buf()));
                }
                components.push(name.to_owned());
            }
            Component::ParentDir => {
                return Err(FilterError::ParentComponent(original.to_path_buf()));
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Ok(components)
}
