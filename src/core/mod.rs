// src/core/mod.rs

pub mod config_loader;
pub mod line_framer;
pub mod paths;
pub mod status;
