//! Pipeline orchestration for profiling runs.
//!
//! Composes acquisition, entry-point resolution, provisioning, agent
//! execution, analysis and persistence into the two supported flows
//! (synchronous and streaming).

mod orchestrator;

use serde::{Deserialize, Serialize};

use crate::agent::MetricsReport;
use crate::analysis::AnalysisVerdict;
use crate::provision::DEFAULT_INTERPRETER;

pub use orchestrator::Orchestrator;

/// An accepted request to profile one repository. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Clonable repository reference.
    pub repo_url: String,
    /// Requested runtime version.
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    DEFAULT_INTERPRETER.to_string()
}

impl RunRequest {
    /// Creates a request with the canonical default runtime version.
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            version: default_version(),
        }
    }

    /// Sets the requested runtime version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Final envelope of one run: the agent's metrics and the analysis verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Structured performance output of the agent.
    pub metrics: MetricsReport,
    /// Best-effort qualitative verdict.
    pub analysis: AnalysisVerdict,
}

/// Stages a run moves through, in order.
///
/// `Provisioning` and `Persisting` exist only in the streaming flow. A run
/// can fail out of `Acquiring`, `Resolving` and `Running`; analysis and
/// persistence degrade instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Acquiring,
    Resolving,
    Provisioning,
    Running,
    Analysing,
    Persisting,
    Done,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Acquiring => write!(f, "acquiring"),
            PipelineStage::Resolving => write!(f, "resolving"),
            PipelineStage::Provisioning => write!(f, "provisioning"),
            PipelineStage::Running => write!(f, "running"),
            PipelineStage::Analysing => write!(f, "analysing"),
            PipelineStage::Persisting => write!(f, "persisting"),
            PipelineStage::Done => write!(f, "done"),
        }
    }
}
