//! # lendloop CLI — Handler Modules
//!
//! Argument types and handlers for the `lendloop` binary. The binary
//! entry point in `main.rs` parses the command line and dispatches here.

pub mod config;
pub mod notices;
pub mod serve;
