use super::*;
use std::fs;
use std::path::{Path, PathBuf};

fn render(rules: &[FilterRule]) -> Vec<String> {
    rules.iter().map(ToString::to_string).collect()
}

#[test]
fn sync_rules_are_identity_over_excludes() {
    let excludes = vec!["*.tmp".to_owned(), ".git/".to_owned(), "/build".to_owned()];
    let rules = FilterSetBuilder::build_for_sync(excludes.clone());

    let patterns: Vec<&str> = rules.iter().map(FilterRule::pattern).collect();
    assert_eq!(patterns, excludes);
    assert!(rules.iter().all(|rule| rule.action() == FilterAction::Exclude));
}

#[test]
fn sync_rules_for_no_excludes_are_empty() {
    let rules = FilterSetBuilder::build_for_sync(Vec::<String>::new());
    assert!(rules.is_empty());
}

#[test]
fn removal_rules_include_ancestors_then_file_then_catch_all() {
    let rules =
        FilterSetBuilder::build_for_removal(["/src/sub/b.txt"], Path::new("/src")).expect("rules");
    assert_eq!(render(&rules), ["+ sub", "+ sub/b.txt", "- *"]);
}

#[test]
fn removal_rules_for_empty_set_are_only_catch_all() {
    let rules =
        FilterSetBuilder::build_for_removal(Vec::<PathBuf>::new(), Path::new("/src")).expect("rules");
    assert_eq!(render(&rules), ["- *"]);
}

#[test]
fn removal_rules_share_common_prefixes_once() {
    let rules = FilterSetBuilder::build_for_removal(
        ["/src/a/b/one.txt", "/src/a/b/two.txt", "/src/a/c.txt"],
        Path::new("/src"),
    )
    .expect("rules");

    assert_eq!(
        render(&rules),
        [
            "+ a",
            "+ a/b",
            "+ a/b/one.txt",
            "+ a/b/two.txt",
            "+ a/c.txt",
            "- *"
        ]
    );
}

#[test]
fn removal_rules_accept_already_relative_paths() {
    let rules =
        FilterSetBuilder::build_for_removal(["./sub/b.txt"], Path::new("/src")).expect("rules");
    assert_eq!(render(&rules), ["+ sub", "+ sub/b.txt", "- *"]);
}

#[test]
fn removal_rules_reject_paths_outside_root() {
    let error = FilterSetBuilder::build_for_removal(["/elsewhere/b.txt"], Path::new("/src"))
        .expect_err("outside root");
    assert!(matches!(error, FilterError::OutsideRoot { .. }));
}

#[test]
fn removal_rules_reject_parent_components() {
    let error = FilterSetBuilder::build_for_removal(["../escape.txt"], Path::new("/src"))
        .expect_err("parent component");
    assert!(matches!(error, FilterError::ParentComponent(_)));
}

#[test]
fn removal_of_root_itself_adds_no_includes() {
    let rules = FilterSetBuilder::build_for_removal(["/src"], Path::new("/src")).expect("rules");
    assert_eq!(render(&rules), ["- *"]);
}

#[test]
fn removal_rules_escape_wildcards_in_names() {
    let rules =
        FilterSetBuilder::build_for_removal(["/src/dir*/f?.txt"], Path::new("/src")).expect("rules");
    assert_eq!(render(&rules), [r"+ dir\*", r"+ dir\*/f\?.txt", "- *"]);
}

#[cfg(unix)]
#[test]
fn removal_rules_escape_whole_pattern_when_any_component_has_wildcards() {
    let rules = FilterSetBuilder::build_for_removal([r"/src/a[1]/back\slash"], Path::new("/src"))
        .expect("rules");
    assert_eq!(render(&rules), [r"+ a\[1]", r"+ a\[1]/back\\slash", "- *"]);
}

#[cfg(unix)]
#[test]
fn removal_rules_keep_backslashes_literal_without_wildcards() {
    let rules =
        FilterSetBuilder::build_for_removal([r"/src/back\slash/f.txt"], Path::new("/src")).expect("rules");
    assert_eq!(render(&rules), [r"+ back\slash", r"+ back\slash/f.txt", "- *"]);
}

#[test]
fn removal_rules_reject_line_breaks_in_names() {
    for removed in ["/src/a\n+ *", "/src/dir\r/b.txt"] {
        let error = FilterSetBuilder::build_for_removal([removed], Path::new("/src"))
            .expect_err("line break");
        assert!(matches!(error, FilterError::LineBreak(_)), "{removed:?}");
    }
}

#[cfg(unix)]
#[test]
fn anchoring_escapes_plain_rules_under_wildcard_top() {
    let rules = FilterSetBuilder::build_for_removal([r"/src/back\slash"], Path::new("/src"))
        .expect("rules");
    let anchored = FilterSetBuilder::anchor_for_transfer(rules, Some("s[1]"));
    assert_eq!(
        render(&anchored),
        [r"+ /s\[1]", r"+ /s\[1]/back\\slash", "- *"]
    );
}

#[test]
fn removal_rules_resolve_through_symlinked_root() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let real = scratch.path().join("real");
    fs::create_dir_all(real.join("sub")).expect("create tree");
    let canonical = real.canonicalize().expect("canonical");

    #[cfg(unix)]
    {
        let link = scratch.path().join("link");
        std::os::unix::fs::symlink(&real, &link).expect("symlink");
        let removed = canonical.join("sub").join("gone.txt");
        let rules = FilterSetBuilder::build_for_removal([removed], &link).expect("rules");
        assert_eq!(render(&rules), ["+ sub", "+ sub/gone.txt", "- *"]);
    }

    let removed = canonical.join("sub").join("gone.txt");
    let rules = FilterSetBuilder::build_for_removal([removed], &real).expect("rules");
    assert_eq!(render(&rules), ["+ sub", "+ sub/gone.txt", "- *"]);
}

#[test]
fn anchoring_roots_includes_under_top_directory() {
    let rules =
        FilterSetBuilder::build_for_removal(["/src/sub/b.txt"], Path::new("/src")).expect("rules");
    let anchored = FilterSetBuilder::anchor_for_transfer(rules, Some("src"));

    assert_eq!(
        render(&anchored),
        ["+ /src", "+ /src/sub", "+ /src/sub/b.txt", "- *"]
    );
}

#[test]
fn anchoring_without_top_directory_uses_transfer_root() {
    let rules =
        FilterSetBuilder::build_for_removal(["/src/sub/b.txt"], Path::new("/src")).expect("rules");
    let anchored = FilterSetBuilder::anchor_for_transfer(rules, None);

    assert_eq!(render(&anchored), ["+ /sub", "+ /sub/b.txt", "- *"]);
}

#[test]
fn anchoring_escapes_top_directory() {
    let anchored = FilterSetBuilder::anchor_for_transfer(vec![FilterRule::exclude_all()], Some("s[1]"));
    assert_eq!(render(&anchored), [r"+ /s\[1]", "- *"]);
}

#[test]
fn filter_file_contains_one_rule_per_line() {
    let rules = vec![
        FilterRule::include("sub"),
        FilterRule::include("sub/b.txt"),
        FilterRule::exclude_all(),
    ];
    let file = FilterFile::create(&rules).expect("create");
    let contents = fs::read_to_string(file.path()).expect("read");

    assert_eq!(contents, "+ sub\n+ sub/b.txt\n- *\n");
    file.close();
}

#[test]
fn filter_file_is_removed_after_close() {
    let file = FilterFile::create(&[FilterRule::exclude("*.o")]).expect("create");
    let path = file.path().to_path_buf();
    assert!(path.exists());

    file.close();
    assert!(!path.exists());
}

#[test]
fn close_tolerates_file_removed_underneath() {
    let file = FilterFile::create(&[FilterRule::exclude("*.o")]).expect("create");
    let path = file.path().to_path_buf();
    fs::remove_file(&path).expect("remove early");

    file.close();
    assert!(!path.exists());
}

#[test]
fn filter_files_are_unique_per_invocation() {
    let first = FilterFile::create(&[]).expect("first");
    let second = FilterFile::create(&[]).expect("second");

    assert_ne!(first.path(), second.path());
}

#[test]
fn scoped_file_is_removed_after_success() {
    let mut seen = None;
    let value: Result<u8, FilterError> = with_filter_file(&[FilterRule::exclude("x")], |path| {
        assert!(path.exists());
        seen = Some(path.to_path_buf());
        Ok(7)
    });

    assert_eq!(value.expect("body result"), 7);
    assert!(!seen.expect("path recorded").exists());
}

#[test]
fn scoped_file_is_removed_after_error() {
    let mut seen = None;
    let value: Result<(), FilterError> = with_filter_file(&[], |path| {
        seen = Some(path.to_path_buf());
        Err(FilterError::ParentComponent(PathBuf::from("..")))
    });

    assert!(value.is_err());
    assert!(!seen.expect("path recorded").exists());
}

#[test]
fn scoped_file_is_removed_after_panic() {
    let seen = std::sync::Mutex::new(None);
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), FilterError> = with_filter_file(&[], |path| {
            *seen.lock().unwrap() = Some(path.to_path_buf());
            panic!("body failed");
        });
    }));

    assert!(outcome.is_err());
    let path = seen.into_inner().unwrap().expect("path recorded");
    assert!(!path.exists());
}
