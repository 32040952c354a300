#![deny(unsafe_code)]

use mimalloc::MiMalloc;

/// High-performance memory allocator for improved allocation throughput.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::ffi::OsString;
use std::io::{self, Write};
use std::{env, process::ExitCode};

/// Forwards the arguments and standard streams to the front end and maps
/// the returned status to a process exit code.
fn run_with<I, Out, Err>(args: I, stdout: &mut Out, stderr: &mut Err) -> ExitCode
where
    I: IntoIterator,
    I::Item: Into<OsString>,
    Out: Write,
    Err: Write,
{
    let status = cli::run(args, stdout, stderr);
    let _ = stdout.flush();
    let _ = stderr.flush();
    cli::exit_code_from(status)
}

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    run_with(env::args_os(), &mut stdout, &mut stderr)
}
