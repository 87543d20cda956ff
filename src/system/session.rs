// EN: src/system/session.rs

use crate::{
    core::{line_framer::LineSink, paths},
    models::{ExecOutcome, ExecRequest, SessionConfig, ShellResult},
    system::executor::{self, ExecSettings},
};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use thiserror::Error;

/// Errors raised by the session itself, before any worker runs.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The interpreter process could not be started.
    #[error("Could not start interpreter '{}': {source}", .path.display())]
    InterpreterSpawn {
        /// The expanded interpreter path.
        path: PathBuf,
        /// Why the spawn failed.
        #[source]
        source: std::io::Error,
    },
    /// The configured interpreter path could not be expanded.
    #[error("Interpreter path is invalid: {0}")]
    InterpreterPath(#[from] paths::PathError),
    /// `execute` was called after `close`.
    #[error("Session is closed.")]
    Closed,
    /// The request had no program token.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// The command line had unbalanced quoting.
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    /// An environment override key is empty or contains `=` or a NUL byte.
    #[error("Invalid environment variable name: {0:?}")]
    InvalidEnvKey(String),
}

/// Receives everything one execution produces through a single object: the lines of
/// both streams, then exactly one of `on_success` / `on_failure`.
///
/// Stream callbacks run on the drain threads, concurrently with each other.
pub trait ShellCallback: Sync {
    /// Called for each stdout line.
    fn on_stdout(&self, line: &str);
    /// Called for each stderr line.
    fn on_stderr(&self, line: &str);
    /// Called after both streams are drained when the worker exited with code 0.
    fn on_success(&self) {}
    /// Called after both streams are drained for every other outcome.
    fn on_failure(&self, _outcome: &ExecOutcome) {}
}

/// A live interpreter process plus the machinery to run commands next to it.
///
/// Each [`Session::execute`] call forks its own worker; the interpreter itself is
/// kept alive for the lifetime of the session and terminated by [`Session::close`]
/// (or on drop). Executions take `&mut self`, so a session runs one command at a time.
#[derive(Debug)]
pub struct Session {
    interpreter: Option<Child>,
    alive: bool,
    config: SessionConfig,
}

impl Session {
    /// Opens a session with the default configuration.
    pub fn open() -> Result<Self, SessionError> {
        Self::open_with(SessionConfig::default())
    }

    /// Starts the configured interpreter with piped stdin/stdout as its control channel.
    ///
    /// # Errors
    /// [`SessionError::InterpreterSpawn`] when the interpreter is missing or cannot be
    /// executed, [`SessionError::InterpreterPath`] when its path cannot be expanded.
    pub fn open_with(config: SessionConfig) -> Result<Self, SessionError> {
        let path = paths::expand_path(&config.interpreter)?;
        let interpreter = Command::new(&path)
            .args(&config.interpreter_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SessionError::InterpreterSpawn {
                path: path.clone(),
                source,
            })?;

        log::debug!(
            "Interpreter '{}' started (PID: {})",
            path.display(),
            interpreter.id()
        );

        Ok(Self {
            interpreter: Some(interpreter),
            alive: true,
            config,
        })
    }

    /// Whether the session is open. Reads a flag; does not query the OS.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// The interpreter's process id, while the session is open.
    pub fn interpreter_pid(&self) -> Option<u32> {
        self.interpreter.as_ref().map(Child::id)
    }

    /// The configuration this session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Terminates and reaps the interpreter. Calling it again is a no-op.
    pub fn close(&mut self) {
        let Some(mut interpreter) = self.interpreter.take() else {
            return;
        };
        self.alive = false;

        // Closing the control channel first lets a well-behaved interpreter exit on EOF.
        drop(interpreter.stdin.take());
        let pid = interpreter.id();
        if let Err(e) = interpreter.kill() {
            log::warn!("Failed to kill interpreter {}: {}", pid, e);
        }
        match interpreter.wait() {
            Ok(status) => log::debug!("Interpreter {} closed ({})", pid, status),
            Err(e) => log::warn!("Failed to reap interpreter {}: {}", pid, e),
        }
    }

    /// Runs one command to completion, streaming its stdout and stderr lines to the
    /// two sinks. Blocks until the worker has exited and both streams are drained.
    ///
    /// Lines of each stream arrive in order; there is no ordering between streams.
    ///
    /// # Errors
    /// [`SessionError::Closed`] if the session was closed, [`SessionError::InvalidEnvKey`]
    /// if an override key is malformed. In both cases nothing is spawned. Everything
    /// that can go wrong with the worker itself is reported through the returned
    /// [`ExecOutcome`].
    pub fn execute<O, E>(
        &mut self,
        request: &ExecRequest,
        mut on_stdout: O,
        mut on_stderr: E,
    ) -> Result<ExecOutcome, SessionError>
    where
        O: LineSink,
        E: LineSink,
    {
        if !self.alive {
            return Err(SessionError::Closed);
        }
        request.validate_env()?;

        let settings = self.exec_settings(request);
        Ok(executor::run_worker(
            request,
            &settings,
            &mut on_stdout,
            &mut on_stderr,
        ))
    }

    /// Runs one command and collects both streams.
    pub fn execute_collect(&mut self, request: &ExecRequest) -> Result<ShellResult, SessionError> {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = self.execute(
            request,
            |line: &str| out.push(line.to_string()),
            |line: &str| err.push(line.to_string()),
        )?;
        Ok(ShellResult { outcome, out, err })
    }

    /// Runs one command, reporting lines and the final result to `callback`.
    pub fn execute_with_callback<C>(
        &mut self,
        request: &ExecRequest,
        callback: &C,
    ) -> Result<ExecOutcome, SessionError>
    where
        C: ShellCallback + ?Sized,
    {
        let outcome = self.execute(
            request,
            |line: &str| callback.on_stdout(line),
            |line: &str| callback.on_stderr(line),
        )?;
        if outcome.success() {
            callback.on_success();
        } else {
            callback.on_failure(&outcome);
        }
        Ok(outcome)
    }

    fn exec_settings(&self, request: &ExecRequest) -> ExecSettings {
        ExecSettings {
            trailing_line: self.config.trailing_line,
            read_chunk_size: self.config.read_chunk_size,
            poll_interval: self.config.poll_interval(),
            timeout: request.deadline().or_else(|| self.config.default_timeout()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrailingLinePolicy;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn session() -> Session {
        Session::open().unwrap()
    }

    fn run(session: &mut Session, tokens: &[&str]) -> ShellResult {
        let request = ExecRequest::new(tokens.iter().copied()).unwrap();
        session.execute_collect(&request).unwrap()
    }

    // --- Lifecycle ---

    #[test]
    fn test_open_starts_interpreter() {
        let session = session();
        assert!(session.is_alive());
        assert!(session.interpreter_pid().is_some());
    }

    #[test]
    fn test_open_with_missing_interpreter_fails() {
        let config = SessionConfig {
            interpreter: "/nonexistent/shellwrap-test/sh".to_string(),
            ..Default::default()
        };
        let result = Session::open_with(config);
        assert!(matches!(result, Err(SessionError::InterpreterSpawn { .. })));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = session();
        session.close();
        assert!(!session.is_alive());
        assert!(session.interpreter_pid().is_none());
        session.close();
        assert!(!session.is_alive());
    }

    #[test]
    fn test_execute_on_closed_session_is_rejected() {
        let mut session = session();
        session.close();
        let request = ExecRequest::new(["echo", "hello"]).unwrap();
        let mut called = false;
        let result = session.execute(&request, |_: &str| called = true, |_: &str| {});
        assert!(matches!(result, Err(SessionError::Closed)));
        assert!(!called);
    }

    #[test]
    fn test_session_runs_several_commands() {
        let mut session = session();
        for i in 0..3 {
            let n = i.to_string();
            let result = run(&mut session, &["echo", n.as_str()]);
            assert_eq!(result.out, vec![i.to_string()]);
        }
        assert!(session.is_alive());
    }

    // --- Exit codes ---

    #[test]
    fn test_echo_hello() {
        let mut session = session();
        let result = run(&mut session, &["echo", "hello"]);
        assert_eq!(result.out, vec!["hello"]);
        assert!(result.err.is_empty());
        assert_eq!(result.outcome, ExecOutcome::Exited(0));
        assert!(result.is_success());
    }

    #[test]
    fn test_false_exits_one_silently() {
        let mut session = session();
        let result = run(&mut session, &["false"]);
        assert_eq!(result.exit_code(), 1);
        assert!(result.out.is_empty());
        assert!(result.err.is_empty());
    }

    #[test]
    fn test_missing_binary_is_127() {
        let mut session = session();
        let result = run(&mut session, &["nonexistent-binary-xyz"]);
        assert_eq!(result.outcome, ExecOutcome::Exited(127));
    }

    #[test]
    fn test_unrunnable_file_is_127() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage");
        std::fs::write(&path, b"\x7fELF\0\0garbage").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut session = session();
        let program = path.display().to_string();
        let result = run(&mut session, &[program.as_str()]);
        assert_eq!(result.outcome, ExecOutcome::Exited(127));
        assert_eq!(result.exit_code(), 127);
    }

    #[test]
    fn test_setup_failure_reports_spawn_failed() {
        let mut session = session();
        let result = run(&mut session, &["echo", "a\0b"]);
        assert!(
            matches!(result.outcome, ExecOutcome::SpawnFailed(_)),
            "{:?}",
            result.outcome
        );
        assert_eq!(result.exit_code(), -1);
        assert!(result.out.is_empty());
        assert_eq!(result.err.len(), 1);
        assert!(result.err[0].starts_with("Failed to start 'echo'"));
        assert!(session.is_alive());
    }

    #[test]
    fn test_true_exit_code_is_reported() {
        let mut session = session();
        let result = run(&mut session, &["sh", "-c", "exit 42"]);
        assert_eq!(result.outcome, ExecOutcome::Exited(42));
    }

    #[test]
    fn test_signal_is_reported() {
        let mut session = session();
        let result = run(&mut session, &["sh", "-c", "kill -9 $$"]);
        assert_eq!(result.outcome, ExecOutcome::Signaled(9));
        assert_eq!(result.exit_code(), -1);
    }

    // --- Streams ---

    #[test]
    fn test_stderr_is_separate() {
        let mut session = session();
        let result = run(&mut session, &["sh", "-c", "echo oops 1>&2; echo fine"]);
        assert_eq!(result.out, vec!["fine"]);
        assert_eq!(result.err, vec!["oops"]);
    }

    #[test]
    fn test_lines_arrive_in_order() {
        let mut session = session();
        let result = run(&mut session, &["printf", "a\\nb\\n\\nc\\n"]);
        assert_eq!(result.out, vec!["a", "b", "", "c"]);
    }

    #[test]
    fn test_heavy_interleaved_output_does_not_deadlock() {
        let mut session = session();
        let script = "i=0; while [ $i -lt 20000 ]; do echo out$i; echo err$i 1>&2; i=$((i+1)); done";
        let result = run(&mut session, &["sh", "-c", script]);
        assert_eq!(result.outcome, ExecOutcome::Exited(0));
        assert_eq!(result.out.len(), 20000);
        assert_eq!(result.err.len(), 20000);
        assert_eq!(result.out.first().map(String::as_str), Some("out0"));
        assert_eq!(result.err.last().map(String::as_str), Some("err19999"));
    }

    #[test]
    fn test_stderr_drains_while_stdout_is_idle() {
        let mut session = session();
        let request =
            ExecRequest::new(["sh", "-c", "echo first; echo early 1>&2; sleep 2; echo last"])
                .unwrap();
        let start = Instant::now();
        let stderr_seen_at = Mutex::new(None);

        let outcome = session
            .execute(
                &request,
                |_: &str| {},
                |_: &str| {
                    if let Ok(mut seen) = stderr_seen_at.lock() {
                        seen.get_or_insert_with(|| start.elapsed());
                    }
                },
            )
            .unwrap();

        assert_eq!(outcome, ExecOutcome::Exited(0));
        let seen = stderr_seen_at.lock().unwrap().unwrap();
        assert!(seen < Duration::from_millis(1500), "stderr arrived after {:?}", seen);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_trailing_fragment_policies() {
        let mut flushing = session();
        let result = run(&mut flushing, &["printf", "done\\nno-newline"]);
        assert_eq!(result.out, vec!["done", "no-newline"]);

        let mut dropping = Session::open_with(SessionConfig {
            trailing_line: TrailingLinePolicy::Drop,
            ..Default::default()
        })
        .unwrap();
        let result = run(&mut dropping, &["printf", "done\\nno-newline"]);
        assert_eq!(result.out, vec!["done"]);
    }

    // --- Environment and working directory ---

    #[test]
    fn test_env_override_reaches_worker() {
        let mut session = session();
        let request = ExecRequest::new(["sh", "-c", "printf '%s\\n' \"$SHELLWRAP_TEST_VALUE\""])
            .unwrap()
            .env("SHELLWRAP_TEST_VALUE", "exactly this");
        let result = session.execute_collect(&request).unwrap();
        assert_eq!(result.out, vec!["exactly this"]);
    }

    #[test]
    fn test_env_override_replaces_inherited_value() {
        let mut session = session();
        let request = ExecRequest::new(["sh", "-c", "echo \"$HOME\""])
            .unwrap()
            .env("HOME", "/shellwrap/override");
        let result = session.execute_collect(&request).unwrap();
        assert_eq!(result.out, vec!["/shellwrap/override"]);
    }

    #[test]
    fn test_malformed_env_key_is_rejected() {
        let mut session = session();
        let request = ExecRequest::new(["sh", "-c", "echo \"A=[$A]\""])
            .unwrap()
            .env("A=B", "c");
        let result = session.execute_collect(&request);
        assert!(matches!(result, Err(SessionError::InvalidEnvKey(key)) if key == "A=B"));

        let result = run(&mut session, &["true"]);
        assert_eq!(result.outcome, ExecOutcome::Exited(0));
    }

    #[test]
    fn test_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let mut session = session();
        let request = ExecRequest::new(["sh", "-c", "pwd -P"])
            .unwrap()
            .current_dir(dir.path());
        let result = session.execute_collect(&request).unwrap();
        assert_eq!(result.out, vec![expected.display().to_string()]);
    }

    // --- Deadlines and cancellation ---

    #[test]
    fn test_timeout_kills_worker() {
        let mut session = session();
        let request = ExecRequest::new(["sleep", "5"])
            .unwrap()
            .timeout(Duration::from_millis(200));
        let start = Instant::now();
        let result = session.execute_collect(&request).unwrap();
        assert_eq!(result.outcome, ExecOutcome::TimedOut);
        assert_eq!(result.exit_code(), -1);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_default_timeout_from_config() {
        let mut session = Session::open_with(SessionConfig {
            default_timeout_secs: Some(1),
            ..Default::default()
        })
        .unwrap();
        let result = run(&mut session, &["sleep", "5"]);
        assert_eq!(result.outcome, ExecOutcome::TimedOut);
    }

    #[test]
    fn test_cancellation_kills_worker() {
        let mut session = session();
        let token = Arc::new(AtomicBool::new(false));
        let request = ExecRequest::new(["sh", "-c", "echo ready; exec sleep 5"])
            .unwrap()
            .cancellation(token.clone());
        let start = Instant::now();

        let outcome = session
            .execute(
                &request,
                |line: &str| {
                    if line == "ready" {
                        token.store(true, Ordering::SeqCst);
                    }
                },
                |_: &str| {},
            )
            .unwrap();

        assert_eq!(outcome, ExecOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_cancelled_before_start_spawns_nothing() {
        let mut session = session();
        let token = Arc::new(AtomicBool::new(true));
        let request = ExecRequest::new(["echo", "never"])
            .unwrap()
            .cancellation(token);
        let result = session.execute_collect(&request).unwrap();
        assert_eq!(result.outcome, ExecOutcome::Cancelled);
        assert!(result.out.is_empty());
    }

    // --- Callback object ---

    #[derive(Default)]
    struct Recorder {
        out: Mutex<Vec<String>>,
        err: Mutex<Vec<String>>,
        successes: AtomicUsize,
        failures: Mutex<Vec<ExecOutcome>>,
    }

    impl ShellCallback for Recorder {
        fn on_stdout(&self, line: &str) {
            self.out.lock().unwrap().push(line.to_string());
        }
        fn on_stderr(&self, line: &str) {
            self.err.lock().unwrap().push(line.to_string());
        }
        fn on_success(&self) {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_failure(&self, outcome: &ExecOutcome) {
            self.failures.lock().unwrap().push(outcome.clone());
        }
    }

    #[test]
    fn test_callback_success_and_failure() {
        let mut session = session();
        let recorder = Recorder::default();

        let ok = ExecRequest::new(["echo", "hi"]).unwrap();
        session.execute_with_callback(&ok, &recorder).unwrap();

        let failing = ExecRequest::new(["sh", "-c", "echo bad 1>&2; exit 2"]).unwrap();
        session.execute_with_callback(&failing, &recorder).unwrap();

        assert_eq!(*recorder.out.lock().unwrap(), vec!["hi"]);
        assert_eq!(*recorder.err.lock().unwrap(), vec!["bad"]);
        assert_eq!(recorder.successes.load(Ordering::SeqCst), 1);
        assert_eq!(
            *recorder.failures.lock().unwrap(),
            vec![ExecOutcome::Exited(2)]
        );
    }
}
