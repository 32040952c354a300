#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` maps the command-line verbosity flags onto [`tracing`] levels
//! and installs the subscriber every binary in the workspace uses.
//!
//! # Design
//!
//! - [`Verbosity`] is derived from the `-v` count and the `-q` flag.
//! - [`init_tracing`] installs a `tracing-subscriber` formatter writing to
//!   standard error, filtered by [`build_filter`]. Directives in `RUST_LOG`
//!   take precedence for the targets they name.
//!
//! Library crates only emit events; they never install a subscriber. Events
//! use targets below `mirror::` (`mirror::filter`, `mirror::cmd`,
//! `mirror::exit`, `mirror::cleanup`, `mirror::watch`, `mirror::config`), so
//! a single subsystem can be raised with e.g. `RUST_LOG=mirror::cmd=debug`.
//!
//! # Examples
//!
//! ```
//! use logging::{Verbosity, build_filter};
//! use tracing_subscriber::filter::LevelFilter;
//!
//! let filter = build_filter(Verbosity::from_flags(2, false), None);
//! assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
//! ```

mod tracing_bridge;
mod verbosity;

pub use tracing_bridge::{LOG_ENV, build_filter, init_tracing};
pub use verbosity::Verbosity;
