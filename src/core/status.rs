// src/core/status.rs

use crate::models::ExecOutcome;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Maps a worker's termination status to an [`ExecOutcome`].
///
/// A normal exit keeps its code, a signal death keeps its signal number, and any
/// other state (e.g. stopped) is [`ExecOutcome::Abnormal`].
pub fn translate(status: ExitStatus) -> ExecOutcome {
    if let Some(code) = status.code() {
        ExecOutcome::Exited(code)
    } else if let Some(signal) = status.signal() {
        ExecOutcome::Signaled(signal)
    } else {
        log::debug!("Worker ended without an exit code or signal: {:?}", status);
        ExecOutcome::Abnormal
    }
}

/// Same as [`translate`], for a raw `waitpid` status word.
pub fn from_raw_wait_status(raw: i32) -> ExecOutcome {
    translate(ExitStatus::from_raw(raw))
}
