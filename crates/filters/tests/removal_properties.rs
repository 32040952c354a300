//! Property tests for removal filter generation.
//!
//! For any set of removed paths the generated list must include every
//! ancestor prefix and the path itself, and end in exactly one catch-all.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use filters::{FilterAction, FilterRule, FilterSetBuilder};
use proptest::prelude::*;

fn relative_path() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,3}", 1..5)
}

fn prefixes(segments: &[String]) -> Vec<String> {
    (1..=segments.len())
        .map(|len| segments[..len].join("/"))
        .collect()
}

proptest! {
    #[test]
    fn every_prefix_is_included_before_the_catch_all(
        paths in prop::collection::vec(relative_path(), 0..8)
    ) {
        let root = Path::new("/src");
        let removed: Vec<PathBuf> = paths
            .iter()
            .map(|segments| root.join(segments.join("/")))
            .collect();

        let rules = FilterSetBuilder::build_for_removal(&removed, root).unwrap();

        let (last, includes) = rules.split_last().unwrap();
        prop_assert_eq!(last, &FilterRule::exclude_all());
        prop_assert!(includes.iter().all(|rule| rule.action() == FilterAction::Include));

        let included: BTreeSet<&str> = includes.iter().map(FilterRule::pattern).collect();
        prop_assert_eq!(included.len(), includes.len(), "includes are deduplicated");

        let mut expected = BTreeSet::new();
        for segments in &paths {
            for prefix in prefixes(segments) {
                prop_assert!(included.contains(prefix.as_str()), "missing {}", prefix);
                expected.insert(prefix);
            }
        }
        prop_assert_eq!(expected.len(), included.len());
    }

    #[test]
    fn ancestors_precede_descendants(segments in relative_path()) {
        let root = Path::new("/src");
        let rules = FilterSetBuilder::build_for_removal([root.join(segments.join("/"))], root).unwrap();
        let patterns: Vec<&str> = rules.iter().map(FilterRule::pattern).collect();

        let expected = prefixes(&segments);
        let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
        prop_assert_eq!(&patterns[..patterns.len() - 1], expected.as_slice());
    }

    #[test]
    fn sync_rules_preserve_order(excludes in prop::collection::vec("[a-z*./]{1,8}", 0..10)) {
        let rules = FilterSetBuilder::build_for_sync(excludes.clone());
        let patterns: Vec<String> = rules.iter().map(|rule| rule.pattern().to_owned()).collect();
        prop_assert_eq!(patterns, excludes);
    }
}
