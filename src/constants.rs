// src/constants.rs

/// The interpreter started by a session when the configuration does not name one.
#[cfg(target_os = "android")]
pub const DEFAULT_INTERPRETER: &str = "/system/bin/sh";

/// The interpreter started by a session when the configuration does not name one.
#[cfg(not(target_os = "android"))]
pub const DEFAULT_INTERPRETER: &str = "/bin/sh";

/// Exit code reported when a worker's executable cannot be located or invoked.
pub const COMMAND_NOT_FOUND_EXIT_CODE: i32 = 127;

/// Legacy integer for every outcome that is not a normal exit.
pub const FAILURE_EXIT_CODE: i32 = -1;

/// Size of a single `read` from a worker pipe.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// How often a worker is polled while a deadline or cancellation token is armed.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

/// The name of the shellwrap directory inside the system config directory.
pub const CONFIG_DIR_NAME: &str = "shellwrap";

/// The name of the session configuration file (inside the shellwrap config directory).
pub const CONFIG_FILENAME: &str = "config.toml";
