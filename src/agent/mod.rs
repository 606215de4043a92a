//! Measurement agent integration.
//!
//! The agent is an opaque external executable: it takes the entry-point path
//! as its argument, optionally honours a `CUSTOM_PYTHON` interpreter from the
//! environment, prints free-text progress lines, and finishes with a single
//! JSON report line.

mod runner;

use serde::{Deserialize, Serialize};

pub use runner::AgentRunner;

/// Structured performance output of one agent execution.
///
/// Fields default to zero so a degraded streaming run (no terminal JSON line)
/// still yields a well-formed, zero-valued report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Total elapsed time in milliseconds.
    #[serde(default)]
    pub total_time_ms: i64,
    /// Peak resident memory in kilobytes.
    #[serde(default)]
    pub peak_memory_kb: i64,
    /// Status tag reported by the agent.
    #[serde(default)]
    pub status: String,
}

/// How a single agent output line should be handled in streaming mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Free-text progress, forwarded verbatim to the log sink.
    Log,
    /// Candidate metrics report, retained rather than forwarded.
    Report,
}

/// Classifies one line of agent output.
///
/// The protocol is first-byte framing: a line opening with `{` is a
/// candidate report, anything else is progress text. A log line that happens
/// to start with `{` is misclassified; this function is the single seam to
/// replace if the agent ever grows stricter framing.
pub fn classify_line(line: &str) -> LineClass {
    if line.starts_with('{') {
        LineClass::Report
    } else {
        LineClass::Log
    }
}
