//! Error types for the profiling pipeline.
//!
//! Defines the failure taxonomy for the stages that can abort a run:
//! - Repository acquisition (clone)
//! - Entry-point resolution
//! - Agent execution and report parsing
//!
//! Provisioning and analysis failures are deliberately absent here: both are
//! best-effort stages that degrade instead of aborting (see `provision` and
//! `analysis`).

use thiserror::Error;

/// Errors that abort a profiling run.
///
/// Each variant carries the original diagnostic text verbatim so callers can
/// surface it without substituting a generic message.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `git clone` exited non-zero. Carries the tool's combined output.
    #[error("git clone failed: {0}")]
    CloneFailed(String),

    /// The checkout contains no recognizable Python entry point.
    /// Terminal: the orchestrator does not retry resolution.
    #[error("No Python entry point found (main.py, app.py, run.py, benchmark.py or any *.py)")]
    NoEntryPoint,

    /// The measurement agent exited non-zero or exceeded its deadline.
    #[error("Agent execution failed: {0}")]
    AgentFailed(String),

    /// The agent's output was not a single well-formed JSON report.
    /// Carries the raw output for diagnostics.
    #[error("Failed to parse agent output: {raw}")]
    ReportUnparseable { raw: String },

    /// Underlying IO failure (spawn, pipe, filesystem).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that are fatal to environment provisioning.
///
/// Only virtual-environment creation is fatal; manifest installs are
/// best-effort and tracked via [`crate::provision::InstallOutcome`].
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// `python -m venv` exited non-zero. Carries the captured stderr.
    #[error("venv creation failed: {stderr}")]
    VenvFailed { stderr: String },

    /// IO failure while inspecting the checkout or spawning tools.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
