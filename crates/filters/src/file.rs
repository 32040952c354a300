use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::TempPath;

use crate::{FilterError, FilterRule};

const FILE_PREFIX: &str = "rsync-mirror-filter-";

/// Temporary on-disk copy of a rule list, readable by the external tool.
///
/// The file is created with a unique name, written one rule per line and
/// closed for writing before [`path`](Self::path) is handed out. It is removed
/// when [`close`](Self::close) is called or the value is dropped.
#[derive(Debug)]
pub struct FilterFile {
    path: TempPath,
}

impl FilterFile {
    /// Writes `rules` to a fresh temporary file.
    pub fn create(rules: &[FilterRule]) -> Result<Self, FilterError> {
        let file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(".rules")
            .tempfile()
            .map_err(FilterError::Write)?;

        let mut writer = BufWriter::new(file.as_file());
        for rule in rules {
            writeln!(writer, "{rule}").map_err(FilterError::Write)?;
        }
        writer.flush().map_err(FilterError::Write)?;
        drop(writer);

        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    /// Returns the location of the filter file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file, logging rather than failing when removal goes wrong.
    pub fn close(self) {
        let shown = self.path.display().to_string();
        if let Err(error) = self.path.close() {
            tracing::warn!(
                target: "mirror::cleanup",
                path = %shown,
                %error,
                "failed to remove filter file"
            );
        }
    }
}

/// Materialises `rules` as a filter file for the duration of `body`.
///
/// The file is removed afterwards whether `body` returns `Ok`, returns `Err`
/// or unwinds.
pub fn with_filter_file<T, E, F>(rules: &[FilterRule], body: F) -> Result<T, E>
where
    F: FnOnce(&Path) -> Result<T, E>,
    E: From<FilterError>,
{
    let file = FilterFile::create(rules)?;
    let result = body(file.path());
    file.close();
    result
}
