//! Persistent interpreter sessions with line-framed stdout/stderr streaming.
//!
//! ```no_run
//! use shellwrap::{models::ExecRequest, system::session::Session};
//!
//! let mut session = Session::open()?;
//! let request = ExecRequest::new(["echo", "hello"])?.env("GREETING", "hi");
//! let outcome = session.execute(
//!     &request,
//!     |line: &str| println!("{line}"),
//!     |line: &str| eprintln!("{line}"),
//! )?;
//! assert!(outcome.success());
//! # Ok::<(), shellwrap::system::session::SessionError>(())
//! ```

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

#[cfg(not(unix))]
compile_error!("shellwrap needs a POSIX platform.");

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Set to `true` to kill the worker of an in-flight execution.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
