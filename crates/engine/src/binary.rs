//! Locating the external `rsync` binary.

use std::collections::HashSet;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Environment variable overriding the tool binary.
pub const RSYNC_BINARY_ENV: &str = "RSYNC_MIRROR_RSYNC";

/// Binary name used when nothing else is configured.
pub const DEFAULT_RSYNC_BINARY: &str = "rsync";

/// Picks the binary to run: explicit setting, then [`RSYNC_BINARY_ENV`], then `rsync`.
#[must_use]
pub fn resolve_binary(configured: Option<&OsStr>) -> OsString {
    if let Some(binary) = configured {
        return binary.to_os_string();
    }
    match env::var_os(RSYNC_BINARY_ENV) {
        Some(value) if !value.is_empty() => value,
        _ => OsString::from(DEFAULT_RSYNC_BINARY),
    }
}

/// Returns the set of candidate executable paths derived from `binary`.
///
/// A value containing a path separator is returned as the only candidate.
/// Otherwise the name is expanded across the directories listed in `PATH`,
/// in order, the same way process spawning resolves it.
fn binary_candidates(binary: &OsStr) -> Vec<PathBuf> {
    let direct_path = Path::new(binary);
    if direct_path.components().count() > 1 {
        return vec![direct_path.to_path_buf()];
    }

    let Some(path_env) = env::var_os("PATH") else {
        return Vec::new();
    };

    let mut results = Vec::new();
    let mut seen = HashSet::new();
    for dir in env::split_paths(&path_env) {
        let candidate = if dir.as_os_str().is_empty() {
            direct_path.to_path_buf()
        } else {
            dir.join(direct_path)
        };
        if seen.insert(candidate.clone()) {
            results.push(candidate);
        }
    }
    results
}

/// What a lookup of the binary found on disk.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Availability {
    Missing,
    NotExecutable(PathBuf),
    Executable(PathBuf),
}

fn availability(binary: &OsStr) -> Availability {
    let mut found = Availability::Missing;
    for candidate in binary_candidates(binary) {
        let Ok(metadata) = candidate.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        if mode_is_executable(&metadata) {
            return Availability::Executable(candidate);
        }
        if found == Availability::Missing {
            found = Availability::NotExecutable(candidate);
        }
    }
    found
}

#[cfg(unix)]
fn mode_is_executable(metadata: &std::fs::Metadata) -> bool {
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn mode_is_executable(_: &std::fs::Metadata) -> bool {
    true
}

/// Formats a hint explaining why the tool binary could not be started.
///
/// The binary is looked up again so the hint can tell a missing binary from
/// one that exists without execute permission.
#[must_use]
pub fn describe_missing_binary(binary: &OsStr) -> String {
    let display = Path::new(binary).display();
    match availability(binary) {
        Availability::Missing => format!(
            "rsync binary '{display}' was not found; install rsync or set {RSYNC_BINARY_ENV} to an explicit path"
        ),
        Availability::NotExecutable(path) => format!(
            "'{}' exists but is not executable; fix its permissions or set {RSYNC_BINARY_ENV} to another binary",
            path.display()
        ),
        Availability::Executable(path) => format!(
            "'{}' is executable but could not be started; check its interpreter and libraries",
            path.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn explicit_setting_is_used_verbatim() {
        let resolved = resolve_binary(Some(OsStr::new("/usr/local/bin/rsync")));
        assert_eq!(resolved, OsString::from("/usr/local/bin/rsync"));
    }

    #[test]
    fn explicit_path_is_its_own_candidate() {
        let candidates = binary_candidates(OsStr::new("/opt/tools/rsync"));
        assert_eq!(candidates, vec![PathBuf::from("/opt/tools/rsync")]);
    }

    #[test]
    fn bare_name_expands_over_path() {
        let candidates = binary_candidates(OsStr::new("rsync"));
        assert!(candidates.iter().all(|candidate| candidate.ends_with("rsync")));
    }

    #[test]
    fn missing_binary_is_reported_as_missing() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let missing = scratch.path().join("no-such-rsync");
        assert_eq!(availability(missing.as_os_str()), Availability::Missing);

        let hint = describe_missing_binary(missing.as_os_str());
        assert!(hint.contains("was not found"));
        assert!(hint.contains(RSYNC_BINARY_ENV));
    }

    #[cfg(unix)]
    #[test]
    fn permissions_decide_between_not_executable_and_executable() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let script = scratch.path().join("fake-rsync");
        fs::write(&script, b"#!/bin/sh\nexit 0\n").expect("write");

        let mut permissions = fs::metadata(&script).expect("metadata").permissions();
        permissions.set_mode(0o644);
        fs::set_permissions(&script, permissions.clone()).expect("chmod");
        assert_eq!(
            availability(script.as_os_str()),
            Availability::NotExecutable(script.clone())
        );
        assert!(describe_missing_binary(script.as_os_str()).contains("is not executable"));

        permissions.set_mode(0o755);
        fs::set_permissions(&script, permissions).expect("chmod");
        assert_eq!(
            availability(script.as_os_str()),
            Availability::Executable(script.clone())
        );
        assert!(describe_missing_binary(script.as_os_str()).contains("could not be started"));
    }

    #[test]
    fn diagnostic_mentions_binary_and_override() {
        let hint = describe_missing_binary(OsStr::new("/nonexistent/bin/rsync"));
        assert!(hint.contains("/nonexistent/bin/rsync"));
        assert!(hint.contains(RSYNC_BINARY_ENV));
        assert!(hint.contains("install rsync"));
    }
}
