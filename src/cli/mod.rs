//! Command-line interface for metriccull.
//!
//! Provides the `serve` command running the HTTP gateway and a one-shot
//! `profile` command for running the synchronous pipeline locally.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
