use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

use crate::SyncError;
use crate::binary::describe_missing_binary;

mod helpers;

use helpers::{StreamKind, StreamMessage, join_reader, spawn_reader, terminate_process};

/// How long output is still drained after a timed-out child was killed.
pub const KILL_GRACE: Duration = Duration::from_secs(1);

/// Largest exit code a Unix process can report.
pub const MAX_EXIT_CODE: i32 = u8::MAX as i32;

/// Verdict of one subprocess invocation, derived from its exit status only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyncOutcome {
    code: Option<i32>,
    signal: Option<i32>,
    timed_out: bool,
}

impl SyncOutcome {
    fn from_status(status: ExitStatus, timed_out: bool) -> Self {
        #[cfg(unix)]
        let signal = status.signal();
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            timed_out,
        }
    }

    /// `true` exactly when the tool exited with status zero in time.
    #[must_use]
    pub const fn success(&self) -> bool {
        !self.timed_out && matches!(self.code, Some(0))
    }

    /// Exit code, with a terminating signal mapped to `128 + signal`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => (128 + signal).min(MAX_EXIT_CODE),
            (None, None) => MAX_EXIT_CODE,
        }
    }

    /// Signal that terminated the tool, if any.
    #[must_use]
    pub const fn signal(&self) -> Option<i32> {
        self.signal
    }

    /// Whether the invocation was cut short by the configured timeout.
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

/// Spawns the external tool and streams its output live.
///
/// Standard input is closed. Both output streams are read in partial chunks
/// by one reader thread each; the chunks funnel through a single channel and
/// a single loop forwards whichever stream produced data first, so a full
/// pipe on one stream never stalls the other. The loop ends once both
/// streams reported end-of-stream, after which the child is reaped.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a runner without a timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Kills the child once `timeout` has elapsed. Output produced before and
    /// after the kill is still drained for up to [`KILL_GRACE`], and the
    /// verdict is failure.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `program` with `args`, forwarding its stdout to `stdout` and its
    /// stderr to `stderr` as the bytes arrive.
    ///
    /// # Errors
    ///
    /// [`SyncError::Launch`] when the program cannot be started, and
    /// [`SyncError::Io`] when the child's streams cannot be read or the
    /// caller's writers reject the forwarded bytes. A non-zero exit is not an
    /// error; it is reported through [`SyncOutcome::success`].
    pub fn run<Out, Err>(
        &self,
        program: &OsStr,
        args: &[OsString],
        stdout: &mut Out,
        stderr: &mut Err,
    ) -> Result<SyncOutcome, SyncError>
    where
        Out: Write,
        Err: Write,
    {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = spawn_process(&mut command, program)?;

        let (sender, receiver) = mpsc::channel();
        let mut stdout_thread = child
            .stdout
            .take()
            .map(|handle| spawn_reader(handle, StreamKind::Stdout, sender.clone()));
        let mut stderr_thread = child
            .stderr
            .take()
            .map(|handle| spawn_reader(handle, StreamKind::Stderr, sender.clone()));
        drop(sender);

        let mut stdout_open = stdout_thread.is_some();
        let mut stderr_open = stderr_thread.is_some();
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut drain_deadline: Option<Instant> = None;
        let mut timed_out = false;
        let mut abandoned = false;

        while stdout_open || stderr_open {
            let message = match (deadline, drain_deadline) {
                (_, Some(drain_deadline)) => {
                    let remaining = drain_deadline.saturating_duration_since(Instant::now());
                    match receiver.recv_timeout(remaining) {
                        Ok(message) => Some(message),
                        Err(RecvTimeoutError::Timeout) => {
                            tracing::warn!(
                                target: "mirror::exit",
                                grace = ?KILL_GRACE,
                                "rsync output still open after kill; abandoning readers"
                            );
                            abandoned = true;
                            break;
                        }
                        Err(RecvTimeoutError::Disconnected) => None,
                    }
                }
                (Some(deadline), None) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match receiver.recv_timeout(remaining) {
                        Ok(message) => Some(message),
                        Err(RecvTimeoutError::Timeout) => {
                            tracing::warn!(
                                target: "mirror::exit",
                                timeout = ?self.timeout,
                                "rsync timed out; terminating"
                            );
                            let _ = child.kill();
                            timed_out = true;
                            drain_deadline = Some(Instant::now() + KILL_GRACE);
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => None,
                    }
                }
                (None, None) => receiver.recv().ok(),
            };

            let Some(message) = message else {
                let stream = if stdout_open {
                    StreamKind::Stdout
                } else {
                    StreamKind::Stderr
                };
                terminate_process(&mut child, &mut stdout_thread, &mut stderr_thread);
                return Err(SyncError::io(
                    format!("failed to capture {stream} from rsync"),
                    io::Error::new(io::ErrorKind::BrokenPipe, "reader thread exited early"),
                ));
            };

            match message {
                StreamMessage::Data(kind, data) => {
                    let forwarded = match kind {
                        StreamKind::Stdout => forward(stdout, &data),
                        StreamKind::Stderr => forward(stderr, &data),
                    };
                    if let Err(error) = forwarded {
                        terminate_process(&mut child, &mut stdout_thread, &mut stderr_thread);
                        return Err(SyncError::io(format!("failed to forward rsync {kind}"), error));
                    }
                }
                StreamMessage::Error(kind, error) => {
                    terminate_process(&mut child, &mut stdout_thread, &mut stderr_thread);
                    return Err(SyncError::io(format!("failed to read {kind} from rsync"), error));
                }
                StreamMessage::Finished(StreamKind::Stdout) => stdout_open = false,
                StreamMessage::Finished(StreamKind::Stderr) => stderr_open = false,
            }
        }

        // Descendants of a killed child may keep the pipes open; their readers
        // are left to finish on their own once the pipes close.
        if !abandoned {
            join_reader(&mut stdout_thread);
            join_reader(&mut stderr_thread);
        }

        let status = child
            .wait()
            .map_err(|error| SyncError::io("failed to wait for rsync process", error))?;
        let outcome = SyncOutcome::from_status(status, timed_out);

        tracing::debug!(
            target: "mirror::exit",
            code = outcome.exit_code(),
            success = outcome.success(),
            timed_out,
            "rsync exited"
        );
        Ok(outcome)
    }
}

fn forward<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    writer.write_all(data)?;
    writer.flush()
}

fn spawn_process(command: &mut Command, program: &OsStr) -> Result<Child, SyncError> {
    command.spawn().map_err(|source| SyncError::Launch {
        binary: program.to_os_string(),
        diagnostic: describe_missing_binary(program),
        source,
    })
}
