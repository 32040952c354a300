#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` is the command-line front end of `rsync-mirror`. It parses the
//! command line with `clap`, builds one or more mappings either from the
//! operands or from a JSON mapping file, runs their initial full syncs and,
//! in watch mode, keeps destinations up to date as sources change.
//!
//! # Design
//!
//! [`run`] takes the arguments and the two output handles explicitly and
//! returns the process exit status, so the binary is a thin wrapper and tests
//! drive the whole front end in memory. The tool's own output is forwarded to
//! the given handles; diagnostics go through `tracing` on standard error.
//!
//! - [`MirrorFile`] reads mapping files and validates each entry into a
//!   [`Mapping`].
//! - [`MirrorSet`] owns one engine per mapping and implements group starts.
//! - [`watch()`] subscribes to the sources and feeds the dispatcher.
//!
//! # Errors
//!
//! Failures are reported on standard error as one `rsync-mirror error:` line
//! and mapped to an exit status by [`CliError::exit_code`]: `1` for usage and
//! configuration problems, `2` when the tool cannot be launched and `23` when
//! a transfer fails.
//!
//! # Examples
//!
//! ```
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let status = cli::run(["rsync-mirror", "--version"], &mut stdout, &mut stderr);
//!
//! assert_eq!(status, 0);
//! assert!(String::from_utf8_lossy(&stdout).starts_with("rsync-mirror "));
//! ```

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::builder::{OsStringValueParser, PathBufValueParser};
use clap::{Arg, ArgAction, Command, value_parser};
use engine::SyncConfig;
use logging::Verbosity;

mod config_file;
mod error;
mod mirror_set;
mod watch;

pub use config_file::{Mapping, MappingEntry, MirrorFile, Overrides};
pub use error::{CliError, EXIT_LAUNCH, EXIT_SUCCESS, EXIT_TRANSFER, EXIT_USAGE};
pub use mirror_set::{MirrorEntry, MirrorSet, StartedRun};
pub use watch::{DEBOUNCE, WatchDispatcher, dispatch, run_loop, watch};

/// Program name used in usage, version and error output.
pub const PROGRAM_NAME: &str = "rsync-mirror";

/// Largest status a process can exit with.
const MAX_EXIT_CODE: i32 = u8::MAX as i32;

fn clap_command() -> Command {
    Command::new(PROGRAM_NAME)
        .about("Mirror directory trees with rsync, once or continuously.")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("help")
                .long("help")
                .short('h')
                .help("Show this help message and exit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .short('V')
                .help("Output version information and exit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase diagnostic output; repeat for more.")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Report errors only.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("delete")
                .long("delete")
                .help("Also delete extraneous destination files on incremental syncs.")
                .action(ArgAction::SetTrue)
                .conflicts_with("config"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .value_name("PATTERN")
                .help("Skip files matching PATTERN.")
                .action(ArgAction::Append)
                .conflicts_with("config"),
        )
        .arg(
            Arg::new("rsync-arg")
                .long("rsync-arg")
                .value_name("ARG")
                .help("Pass ARG through to rsync.")
                .value_parser(OsStringValueParser::new())
                .allow_hyphen_values(true)
                .action(ArgAction::Append)
                .conflicts_with("config"),
        )
        .arg(
            Arg::new("rsync-path")
                .long("rsync-path")
                .value_name("PATH")
                .help("Run PATH instead of the rsync found on PATH.")
                .value_parser(PathBufValueParser::new()),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .help("Stop an rsync run that takes longer than SECS seconds.")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .short('n')
                .help("Ask rsync to report what it would do without doing it.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("watch")
                .long("watch")
                .short('w')
                .help("Keep running and mirror changes as they happen.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Read mappings from a JSON file.")
                .value_parser(PathBufValueParser::new()),
        )
        .arg(
            Arg::new("mapping")
                .long("mapping")
                .short('m')
                .value_name("NAME")
                .help("Start only the named mapping (with --config); repeatable.")
                .action(ArgAction::Append)
                .requires("config"),
        )
        .arg(
            Arg::new("operands")
                .value_name("SOURCE DEST")
                .help("Source directory and destination.")
                .value_parser(OsStringValueParser::new())
                .num_args(0..)
                .action(ArgAction::Append),
        )
}

#[derive(Debug, Default)]
struct ParsedArgs {
    show_help: bool,
    show_version: bool,
    verbose: u8,
    quiet: bool,
    delete: bool,
    excludes: Vec<String>,
    rsync_args: Vec<OsString>,
    rsync_path: Option<PathBuf>,
    timeout: Option<Duration>,
    dry_run: bool,
    watch: bool,
    config: Option<PathBuf>,
    mappings: Vec<String>,
    operands: Vec<OsString>,
}

fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args: Vec<OsString> = arguments.into_iter().map(Into::into).collect();
    if args.is_empty() {
        args.push(OsString::from(PROGRAM_NAME));
    }

    let mut matches = clap_command().try_get_matches_from(args)?;

    Ok(ParsedArgs {
        show_help: matches.get_flag("help"),
        show_version: matches.get_flag("version"),
        verbose: matches.get_count("verbose"),
        quiet: matches.get_flag("quiet"),
        delete: matches.get_flag("delete"),
        excludes: matches
            .remove_many::<String>("exclude")
            .map(Iterator::collect)
            .unwrap_or_default(),
        rsync_args: matches
            .remove_many::<OsString>("rsync-arg")
            .map(Iterator::collect)
            .unwrap_or_default(),
        rsync_path: matches.remove_one::<PathBuf>("rsync-path"),
        timeout: matches.remove_one::<u64>("timeout").map(Duration::from_secs),
        dry_run: matches.get_flag("dry-run"),
        watch: matches.get_flag("watch"),
        config: matches.remove_one::<PathBuf>("config"),
        mappings: matches
            .remove_many::<String>("mapping")
            .map(Iterator::collect)
            .unwrap_or_default(),
        operands: matches
            .remove_many::<OsString>("operands")
            .map(Iterator::collect)
            .unwrap_or_default(),
    })
}

/// Runs the front end with `arguments` (program name first).
///
/// Returns the process exit status.
pub fn run<I, S, Out, Err>(arguments: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Err: Write,
{
    let result = parse_args(arguments)
        .map_err(|error| CliError::Usage(render_clap_error(&error)))
        .and_then(|parsed| execute(parsed, stdout, stderr));

    match result {
        Ok(status) => status,
        Err(error) => {
            let _ = writeln!(stderr, "{PROGRAM_NAME} error: {error}");
            error.exit_code()
        }
    }
}

fn execute<Out, Err>(parsed: ParsedArgs, stdout: &mut Out, stderr: &mut Err) -> Result<i32, CliError>
where
    Out: Write,
    Err: Write,
{
    if parsed.show_help {
        let help = clap_command().render_help();
        let _ = write!(stdout, "{help}");
        return Ok(EXIT_SUCCESS);
    }
    if parsed.show_version {
        let _ = writeln!(stdout, "{PROGRAM_NAME} {}", env!("CARGO_PKG_VERSION"));
        return Ok(EXIT_SUCCESS);
    }

    logging::init_tracing(Verbosity::from_flags(parsed.verbose, parsed.quiet));

    let (set, names) = match &parsed.config {
        Some(path) => mirror_set_from_file(path, &parsed)?,
        None => mirror_set_from_operands(&parsed)?,
    };

    let runs = set.start_all(names.iter().map(String::as_str), stdout, stderr)?;
    let failed: Vec<&StartedRun> = runs.iter().filter(|run| !run.outcome.success()).collect();
    for run in &failed {
        tracing::error!(
            target: "mirror::exit",
            mapping = %run.name,
            code = run.outcome.exit_code(),
            timed_out = run.outcome.timed_out(),
            "initial sync failed"
        );
    }

    if parsed.watch {
        watch(&set, stdout, stderr)?;
    }

    Ok(if failed.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_TRANSFER
    })
}

fn mirror_set_from_operands(parsed: &ParsedArgs) -> Result<(MirrorSet, Vec<String>), CliError> {
    let [source, destination] = parsed.operands.as_slice() else {
        return Err(CliError::Usage(format!(
            "expected SOURCE and DEST operands, got {}; see '{PROGRAM_NAME} --help'",
            parsed.operands.len()
        )));
    };

    let mut builder = SyncConfig::builder(source, destination)
        .delete(parsed.delete)
        .dry_run(parsed.dry_run)
        .extra_args(parsed.rsync_args.iter().cloned())
        .timeout(parsed.timeout);
    for pattern in &parsed.excludes {
        builder = builder.exclude(pattern.clone());
    }
    if let Some(path) = &parsed.rsync_path {
        builder = builder.rsync_binary(path.clone());
    }

    let name = Path::new(source)
        .file_name()
        .map_or_else(|| String::from("default"), |name| name.to_string_lossy().into_owned());
    let config = builder.build().map_err(|source| CliError::Mapping {
        name: name.clone(),
        source,
    })?;

    let set = MirrorSet::new(vec![Mapping {
        name: name.clone(),
        group: None,
        run_group_on_start: false,
        config,
    }]);
    Ok((set, vec![name]))
}

fn mirror_set_from_file(path: &Path, parsed: &ParsedArgs) -> Result<(MirrorSet, Vec<String>), CliError> {
    if !parsed.operands.is_empty() {
        return Err(CliError::Usage(String::from(
            "SOURCE and DEST operands cannot be combined with --config",
        )));
    }

    let overrides = Overrides {
        rsync: parsed.rsync_path.clone(),
        timeout: parsed.timeout,
        dry_run: parsed.dry_run,
    };
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let mappings = MirrorFile::load(path)?.into_mappings(base, &overrides)?;
    let set = MirrorSet::new(mappings);

    let names = if parsed.mappings.is_empty() {
        set.names().map(str::to_owned).collect()
    } else {
        parsed.mappings.clone()
    };
    Ok((set, names))
}

/// Keeps clap's first line, without its own `error:` prefix.
fn render_clap_error(error: &clap::Error) -> String {
    let rendered = error.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_owned()
}

/// Converts a status returned by [`run`] into a process exit code.
#[must_use]
pub fn exit_code_from(status: i32) -> std::process::ExitCode {
    let clamped = status.clamp(0, MAX_EXIT_CODE);
    std::process::ExitCode::from(u8::try_from(clamped).unwrap_or(u8::MAX))
}
