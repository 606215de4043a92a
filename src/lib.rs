//! metriccull: repository profiling pipeline.
//!
//! Clones a repository, provisions an isolated Python environment, runs an
//! external measurement agent against the repository's entry point and
//! forwards the metrics to an external analysis step, optionally streaming
//! progress to the caller in real time.

// Core modules
pub mod agent;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod provision;
pub mod repo;
pub mod server;
pub mod storage;

// Re-export commonly used error types
pub use error::{PipelineError, ProvisionError};
