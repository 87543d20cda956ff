// src/models.rs

use crate::{
    CancellationToken,
    constants::{
        DEFAULT_INTERPRETER, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READ_CHUNK_SIZE, FAILURE_EXIT_CODE,
    },
    system::session::SessionError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

// --- EXECUTION MODELS ---

/// One command to run inside a session: the program, its arguments and the
/// environment overrides applied to the worker before its image is replaced.
///
/// Tokens are handed to process creation as-is; no shell interpretation happens here.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    tokens: Vec<String>,
    env: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
}

impl ExecRequest {
    /// Builds a request from a program name followed by its arguments.
    ///
    /// # Errors
    /// Returns [`SessionError::EmptyCommand`] if no token is given.
    pub fn new<I, S>(tokens: I) -> Result<Self, SessionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return Err(SessionError::EmptyCommand);
        }
        Ok(Self {
            tokens,
            ..Default::default()
        })
    }

    /// Splits a command line with POSIX shell-word rules and builds a request from it.
    ///
    /// # Errors
    /// [`SessionError::CommandParse`] for unbalanced quoting, [`SessionError::EmptyCommand`]
    /// for a blank line.
    pub fn parse(command_line: &str) -> Result<Self, SessionError> {
        let trimmed = command_line.trim();
        let parts =
            shlex::split(trimmed).ok_or_else(|| SessionError::CommandParse(trimmed.to_string()))?;
        Self::new(parts)
    }

    /// Sets one environment override. A later call for the same key replaces the value.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets several environment overrides at once.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Runs the worker from `dir` instead of the caller's working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Kills the worker if it is still running after `timeout`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Kills the worker as soon as `token` is set.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The executable name.
    pub fn program(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or_default()
    }

    /// Positional arguments after the executable name.
    pub fn args(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or_default()
    }

    /// The full token list, program first.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The environment overrides, ordered by key.
    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Checks that every override key names exactly one variable.
    ///
    /// # Errors
    /// [`SessionError::InvalidEnvKey`] for the first key that is empty or contains
    /// `=` or a NUL byte. Such a key would otherwise set a different variable or fail
    /// at spawn time.
    pub fn validate_env(&self) -> Result<(), SessionError> {
        match self
            .env
            .keys()
            .find(|key| key.is_empty() || key.contains(['=', '\0']))
        {
            Some(key) => Err(SessionError::InvalidEnvKey(key.clone())),
            None => Ok(()),
        }
    }

    /// The working directory override, if any.
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.current_dir.as_ref()
    }

    /// The per-request deadline, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout
    }

    /// The cancellation token, if any.
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// True when a cancellation token is attached and has been set.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.load(Ordering::SeqCst))
    }

    /// Renders the tokens back into a shell-quoted line, for logs and messages.
    pub fn display_line(&self) -> String {
        shlex::try_join(self.tokens.iter().map(String::as_str))
            .unwrap_or_else(|_| self.tokens.join(" "))
    }
}

/// How a single execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The worker exited normally with this code. `127` means the executable could
    /// not be located or invoked.
    Exited(i32),
    /// The worker was terminated by this signal.
    Signaled(i32),
    /// The worker stopped without exiting or being killed by a signal.
    Abnormal,
    /// The pipes or the worker process could not be created.
    SpawnFailed(String),
    /// The request's deadline elapsed and the worker was killed.
    TimedOut,
    /// The request's cancellation token was set.
    Cancelled,
}

impl ExecOutcome {
    /// The integer exit code: the real code for a normal exit, `-1` for everything else.
    pub fn code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            _ => FAILURE_EXIT_CODE,
        }
    }

    /// True only for a normal exit with code 0.
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// The status a POSIX shell would report for this outcome (`$?`).
    pub fn shell_status(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) => 128 + signal,
            Self::TimedOut => 124,
            Self::Cancelled => 130,
            Self::Abnormal | Self::SpawnFailed(_) => 1,
        }
    }
}

impl fmt::Display for ExecOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {}", code),
            Self::Signaled(signal) => write!(f, "terminated by signal {}", signal),
            Self::Abnormal => write!(f, "terminated abnormally"),
            Self::SpawnFailed(reason) => write!(f, "could not start: {}", reason),
            Self::TimedOut => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Both output streams of one execution, collected, plus how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellResult {
    /// How the worker ended.
    pub outcome: ExecOutcome,
    /// Stdout lines, in order.
    pub out: Vec<String>,
    /// Stderr lines, in order.
    pub err: Vec<String>,
}

impl ShellResult {
    /// See [`ExecOutcome::success`].
    pub fn is_success(&self) -> bool {
        self.outcome.success()
    }

    /// See [`ExecOutcome::code`].
    pub fn exit_code(&self) -> i32 {
        self.outcome.code()
    }
}

// --- CONFIGURATION MODELS (config.toml) ---

/// What to do with bytes left after the last newline when a stream closes.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrailingLinePolicy {
    /// Deliver the unterminated fragment as a final line.
    #[default]
    Flush,
    /// Discard the unterminated fragment.
    Drop,
}

/// Session settings, as read from `config.toml`. Every field has a default.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// The interpreter kept alive for the session. `~` and `$VAR` are expanded.
    pub interpreter: String,
    /// Arguments passed to the interpreter when the session opens.
    pub interpreter_args: Vec<String>,
    /// What to do with a final output line that has no trailing newline.
    pub trailing_line: TrailingLinePolicy,
    /// Bytes requested per `read` on a worker pipe.
    pub read_chunk_size: usize,
    /// How often a worker with a deadline or cancellation token is polled, in milliseconds.
    pub poll_interval_ms: u64,
    /// Deadline for requests that do not set one. `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_timeout_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            interpreter_args: Vec::new(),
            trailing_line: TrailingLinePolicy::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_timeout_secs: None,
        }
    }
}

impl SessionConfig {
    /// The polling period used while a deadline or cancellation token is armed.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// The deadline applied to requests that do not carry their own.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }
}
