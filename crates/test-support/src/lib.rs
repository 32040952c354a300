//! Shared fixtures for the workspace's tests.
//!
//! [`TestDir`] and [`FileTree`] build throwaway source trees. [`FakeRsync`]
//! installs a stand-in for the external tool that records how it was called,
//! including the rules found in the file named by `--exclude-from`, and exits
//! with a chosen status.

#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Temporary directory removed on drop.
#[derive(Debug)]
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Creates a fresh, empty directory.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            inner: tempfile::tempdir()?,
        })
    }

    /// Root of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Creates `relative` (and its parents) as a directory and returns its path.
    pub fn mkdir(&self, relative: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = self.path().join(relative);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Writes `contents` to `relative`, creating parent directories.
    pub fn write_file(&self, relative: impl AsRef<Path>, contents: &[u8]) -> io::Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Reads `relative` back.
    pub fn read_file(&self, relative: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        fs::read(self.path().join(relative))
    }

    /// Reports whether `relative` exists.
    #[must_use]
    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.path().join(relative).exists()
    }
}

/// Declarative list of files to create under a directory.
#[derive(Debug, Default)]
pub struct FileTree {
    files: Vec<(PathBuf, Vec<u8>)>,
}

impl FileTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text file.
    pub fn text_file(&mut self, relative: impl Into<PathBuf>, contents: &str) -> &mut Self {
        self.files
            .push((relative.into(), contents.as_bytes().to_vec()));
        self
    }

    /// Writes every file below `root`.
    pub fn create_under(&self, root: &Path) -> io::Result<()> {
        for (relative, contents) in &self.files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }
        Ok(())
    }
}

const INVOCATION_LOG: &str = "invocation.log";

/// Shell script standing in for the `rsync` binary.
///
/// Every call appends to an invocation log: one `arg:` line per argument,
/// then one `rule:` line per line of the filter file, then `end`.
#[derive(Debug)]
pub struct FakeRsync {
    script: PathBuf,
    log: PathBuf,
}

impl FakeRsync {
    /// Installs the script in `dir`; it exits with `exit_code`.
    #[cfg(unix)]
    pub fn install(dir: &Path, exit_code: i32) -> io::Result<Self> {
        Self::install_with_output(dir, exit_code, "", "")
    }

    /// Like [`install`](Self::install), also printing `stdout` and `stderr`.
    #[cfg(unix)]
    pub fn install_with_output(
        dir: &Path,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) -> io::Result<Self> {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-rsync");
        let log = dir.join(INVOCATION_LOG);
        let body = format!(
            r#"#!/bin/sh
log='{log}'
filter=''
take_filter=0
for arg in "$@"; do
  printf 'arg:%s\n' "$arg" >> "$log"
  if [ "$take_filter" = 1 ]; then filter="$arg"; take_filter=0; fi
  if [ "$arg" = "--exclude-from" ]; then take_filter=1; fi
done
if [ -n "$filter" ]; then
  if [ -f "$filter" ]; then
    while IFS= read -r line; do printf 'rule:%s\n' "$line" >> "$log"; done < "$filter"
  else
    printf 'missing-filter:%s\n' "$filter" >> "$log"
  fi
fi
printf 'end\n' >> "$log"
printf '%s' '{stdout}'
printf '%s' '{stderr}' >&2
exit {exit_code}
"#,
            log = log.display(),
        );
        fs::write(&script, body)?;
        let mut permissions = fs::metadata(&script)?.permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&script, permissions)?;

        Ok(Self { script, log })
    }

    /// Path of the script, suitable as the tool binary.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.script
    }

    /// Script path as an [`OsString`].
    #[must_use]
    pub fn binary(&self) -> OsString {
        self.script.clone().into_os_string()
    }

    /// Parses every recorded invocation, oldest first.
    pub fn invocations(&self) -> io::Result<Vec<Invocation>> {
        let text = match fs::read_to_string(&self.log) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error),
        };
        Ok(parse_invocations(&text))
    }
}

/// One recorded call of [`FakeRsync`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Invocation {
    /// Arguments, program name excluded.
    pub args: Vec<String>,
    /// Lines of the filter file as seen while the tool ran.
    pub rules: Vec<String>,
    /// Path named by `--exclude-from` when the file was already gone.
    pub missing_filter: Option<String>,
}

impl Invocation {
    /// Reports whether `flag` was passed.
    #[must_use]
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }

    /// Path following `--exclude-from`, if any.
    #[must_use]
    pub fn filter_file(&self) -> Option<&str> {
        let position = self.args.iter().position(|arg| arg == "--exclude-from")?;
        self.args.get(position + 1).map(String::as_str)
    }
}

fn parse_invocations(text: &str) -> Vec<Invocation> {
    let mut invocations = Vec::new();
    let mut current = Invocation::default();
    for line in text.lines() {
        if let Some(arg) = line.strip_prefix("arg:") {
            current.args.push(arg.to_owned());
        } else if let Some(rule) = line.strip_prefix("rule:") {
            current.rules.push(rule.to_owned());
        } else if let Some(path) = line.strip_prefix("missing-filter:") {
            current.missing_filter = Some(path.to_owned());
        } else if line == "end" {
            invocations.push(std::mem::take(&mut current));
        }
    }
    invocations
}

/// Returns `true` when a real `rsync` binary can be run.
#[must_use]
pub fn rsync_available() -> bool {
    std::process::Command::new("rsync")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}
