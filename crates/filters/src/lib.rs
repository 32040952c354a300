#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `filters` turns exclusion settings and removal events into the ordered
//! include/exclude lines the external `rsync` binary reads through
//! `--exclude-from`, and owns the temporary file those lines live in.
//!
//! # Design
//!
//! - [`FilterRule`] is one line of filter syntax: a [`FilterAction`] polarity
//!   and a pattern. Its `Display` output is the exact text written to disk.
//! - [`FilterSetBuilder`] produces rule lists. Full and incremental syncs use
//!   the configured excludes verbatim; removal syncs include each removed
//!   path and all of its ancestors, then exclude everything else.
//! - [`FilterFile`] and [`with_filter_file`] give the rule list a scoped,
//!   uniquely named home on disk.
//!
//! # Invariants
//!
//! - Rule order is preserved exactly; the tool evaluates rules first-match.
//! - A removal rule list always ends with exactly one catch-all exclude.
//! - Every directory on the way to a removed path is included before the
//!   path itself, otherwise the catch-all would prune the parent first.
//! - Filter files never outlive the scope that created them.
//!
//! # Errors
//!
//! [`FilterError`] covers removed paths that cannot be expressed relative to
//! the source root and failures while writing the temporary file.
//!
//! # Examples
//!
//! ```
//! use filters::FilterSetBuilder;
//! use std::path::Path;
//!
//! let rules = FilterSetBuilder::build_for_removal(["/src/sub/b.txt"], Path::new("/src"))
//!     .expect("path is under the root");
//! let lines: Vec<String> = rules.iter().map(ToString::to_string).collect();
//!
//! assert_eq!(lines, ["+ sub", "+ sub/b.txt", "- *"]);
//! ```

mod action;
mod builder;
mod error;
mod file;
mod rule;

pub use action::FilterAction;
pub use builder::FilterSetBuilder;
pub use error::FilterError;
pub use file::{FilterFile, with_filter_file};
pub use rule::{FilterRule, MATCH_ALL, escape_literal};

#[cfg(test)]
mod tests;
