//! # System Interaction Layer
//!
//! Everything that touches processes and pipes lives here.
//!
//! ## Modules
//!
//! - **`session`**: The public [`Session`](session::Session) facade. Owns the long-lived
//!   interpreter process, tracks liveness and hands each command to the executor.
//! - **`executor`**: Spawns one worker per command with stdout and stderr on separate
//!   pipes, drains both concurrently, and translates how the worker ended.

pub mod executor;
pub mod session;
