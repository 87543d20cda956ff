// EN: src/system/executor.rs

use crate::{
    constants::COMMAND_NOT_FOUND_EXIT_CODE,
    core::{
        line_framer::{LineFramer, LineSink},
        status,
    },
    models::{ExecOutcome, ExecRequest, TrailingLinePolicy},
};
use std::io::{self, ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Per-execution knobs, resolved from the session config and the request.
#[derive(Debug, Clone, Copy)]
pub struct ExecSettings {
    /// What to do with output left over after the final newline.
    pub trailing_line: TrailingLinePolicy,
    /// Size of each read from a pipe.
    pub read_chunk_size: usize,
    /// How often the worker is polled while a deadline or cancellation token is armed.
    pub poll_interval: Duration,
    /// Kill the worker once it has run this long.
    pub timeout: Option<Duration>,
}

/// What one drain loop moved through its pipe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    /// Bytes read from the pipe.
    pub bytes: usize,
    /// Lines handed to the sink, including a flushed trailing fragment.
    pub lines: usize,
}

// errno values that `execve` reports when the program itself cannot be run.
// They are shared by every unix target except the two path-lookup ones.
const ENOENT: i32 = 2;
const ENOEXEC: i32 = 8;
const EACCES: i32 = 13;
const ENOTDIR: i32 = 20;
const EISDIR: i32 = 21;
const ETXTBSY: i32 = 26;
#[cfg(any(target_os = "linux", target_os = "android"))]
const ENAMETOOLONG: i32 = 36;
#[cfg(any(target_os = "linux", target_os = "android"))]
const ELOOP: i32 = 40;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const ELOOP: i32 = 62;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const ENAMETOOLONG: i32 = 63;

/// Whether a spawn error means "this program cannot be invoked" rather than a failure
/// to set up the worker (no memory, no process slots, no descriptors, bad arguments).
fn is_launch_failure(error: &io::Error) -> bool {
    matches!(
        error.raw_os_error(),
        Some(ENOENT | ENOEXEC | EACCES | ENOTDIR | EISDIR | ETXTBSY | ENAMETOOLONG | ELOOP)
    )
}

/// Runs one worker to completion with its stdout and stderr captured on two pipes.
///
/// 1. Spawns the worker with both output streams piped, the request's environment
///    overrides applied and stdin detached.
/// 2. Drains both pipes on two scoped threads, so a chatty stream can never fill its
///    pipe buffer and stall the other.
/// 3. Waits for the worker (polling when a deadline or cancellation token is armed),
///    then joins both drains before returning.
///
/// Never returns before the worker has been reaped and both streams hit end-of-file.
pub fn run_worker<O, E>(
    request: &ExecRequest,
    settings: &ExecSettings,
    on_stdout: &mut O,
    on_stderr: &mut E,
) -> ExecOutcome
where
    O: LineSink + ?Sized,
    E: LineSink + ?Sized,
{
    if request.is_cancelled() {
        log::debug!(
            "Cancellation requested before '{}' started.",
            request.display_line()
        );
        return ExecOutcome::Cancelled;
    }

    let mut command = Command::new(request.program());
    command
        .args(request.args())
        .envs(request.env_overrides())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = request.working_dir() {
        // Checked up front: spawn would report a missing directory as ENOENT, i.e. 127.
        if !dir.is_dir() {
            let reason = format!("working directory '{}' does not exist", dir.display());
            on_stderr.on_line(&format!("Failed to start '{}': {}", request.program(), reason));
            return ExecOutcome::SpawnFailed(reason);
        }
        command.current_dir(dir);
    }

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) if is_launch_failure(&e) => {
            log::debug!(
                "'{}' could not be invoked ({}). Reporting exit code {}.",
                request.program(),
                e,
                COMMAND_NOT_FOUND_EXIT_CODE
            );
            return ExecOutcome::Exited(COMMAND_NOT_FOUND_EXIT_CODE);
        }
        Err(e) => {
            on_stderr.on_line(&format!("Failed to start '{}': {}", request.program(), e));
            return ExecOutcome::SpawnFailed(e.to_string());
        }
    };
    log::debug!(
        "Worker {} started for '{}'",
        child.id(),
        request.display_line()
    );

    // Reap the worker if a sink panics while we are draining it.
    let mut child = scopeguard::guard_on_unwind(child, |mut child| {
        log::warn!("Reaping worker {} after a panic.", child.id());
        kill_and_reap(&mut child);
    });

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        kill_and_reap(&mut child);
        on_stderr.on_line("Failed to create pipes.");
        return ExecOutcome::SpawnFailed("output pipes were not created".to_string());
    };

    thread::scope(|scope| {
        let out_handle = scope.spawn(move || drain("stdout", stdout, on_stdout, settings));
        let err_handle = scope.spawn(move || drain("stderr", stderr, on_stderr, settings));

        let outcome = wait_for_exit(&mut child, request, settings);

        for handle in [out_handle, err_handle] {
            match handle.join() {
                Ok(stats) => log::debug!(
                    "Drained {} line(s), {} byte(s) from worker {}",
                    stats.lines,
                    stats.bytes,
                    child.id()
                ),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }

        log::debug!("Worker {} finished: {}", child.id(), outcome);
        outcome
    })
}

/// Reads `reader` until end-of-file, delivering every framed line to `sink`.
///
/// A read error other than `Interrupted` is logged and treated as end-of-file.
pub fn drain<R, S>(stream: &str, mut reader: R, sink: &mut S, settings: &ExecSettings) -> DrainStats
where
    R: Read,
    S: LineSink + ?Sized,
{
    let mut framer = LineFramer::new(settings.trailing_line);
    let mut buffer = vec![0u8; settings.read_chunk_size.max(1)];
    let mut bytes = 0;

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => {
                bytes += count;
                framer.push(buffer.get(..count).unwrap_or_default(), sink);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("Error while draining {}: {}. Treating it as closed.", stream, e);
                break;
            }
        }
    }

    let lines = framer.finish(sink);
    DrainStats { bytes, lines }
}

fn wait_for_exit(child: &mut Child, request: &ExecRequest, settings: &ExecSettings) -> ExecOutcome {
    let deadline = settings
        .timeout
        .and_then(|timeout| Instant::now().checked_add(timeout));

    if deadline.is_none() && request.cancellation_token().is_none() {
        return match child.wait() {
            Ok(status) => status::translate(status),
            Err(e) => {
                log::error!("Failed to wait for worker {}: {}", child.id(), e);
                kill_and_reap(child);
                ExecOutcome::Abnormal
            }
        };
    }

    // Non-blocking wait loop to allow for cancellation and deadlines.
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status::translate(status),
            Ok(None) => {
                if request.is_cancelled() {
                    log::debug!("Cancellation requested, killing worker {}...", child.id());
                    kill_and_reap(child);
                    return ExecOutcome::Cancelled;
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    log::debug!("Deadline reached, killing worker {}...", child.id());
                    kill_and_reap(child);
                    return ExecOutcome::TimedOut;
                }
                thread::sleep(settings.poll_interval);
            }
            Err(e) => {
                log::error!("Failed to poll worker {}: {}", child.id(), e);
                kill_and_reap(child);
                return ExecOutcome::Abnormal;
            }
        }
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill worker {}: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        log::warn!("Failed to reap worker {}: {}", child.id(), e);
    }
}
