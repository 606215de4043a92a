//! Best-effort delegation to the external analysis step.
//!
//! The analyser is an opaque process: it consumes a JSON metrics report on
//! stdin and produces a JSON verdict on stdout. Analysis must never abort an
//! otherwise-successful run, so every failure mode here resolves to the
//! default (empty) verdict.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

use crate::agent::MetricsReport;

/// Qualitative score and suggestions derived from a metrics report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    /// Qualitative score (empty when analysis degraded).
    #[serde(default)]
    pub score: String,
    /// Ordered improvement suggestions.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Invokes the analyser script over a metrics report.
pub struct AnalysisInvoker {
    /// Interpreter used to run the analyser script.
    interpreter: String,
    /// Path to the analyser script.
    analyser_path: PathBuf,
}

impl AnalysisInvoker {
    /// Creates an invoker for the analyser at `analyser_path`, run with the
    /// system `python3`.
    pub fn new(analyser_path: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: "python3".to_string(),
            analyser_path: analyser_path.into(),
        }
    }

    /// Creates an invoker with a custom interpreter.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Pipes `report` to the analyser and collects its verdict.
    ///
    /// The stdin write runs on its own task, concurrently with reading stdout
    /// to EOF; a sequential write-then-read would deadlock once either pipe
    /// buffer fills. The writer closes stdin on completion and both sides are
    /// joined before the verdict is parsed.
    ///
    /// Any failure (spawn, serialize, write, parse) yields the default
    /// verdict.
    pub async fn analyse(&self, report: &MetricsReport) -> AnalysisVerdict {
        let payload = match serde_json::to_vec(report) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Could not serialize metrics report for analysis");
                return AnalysisVerdict::default();
            }
        };

        let mut child = match Command::new(&self.interpreter)
            .arg(&self.analyser_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    analyser = %self.analyser_path.display(),
                    error = %e,
                    "Could not start analyser"
                );
                return AnalysisVerdict::default();
            }
        };

        let mut stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => return AnalysisVerdict::default(),
        };

        // Writer task: write then close, so the analyser sees EOF.
        let writer = tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&payload).await {
                warn!(error = %e, "Failed to write report to analyser stdin");
            }
        });

        let output = child.wait_with_output().await;
        let _ = writer.await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Failed to collect analyser output");
                return AnalysisVerdict::default();
            }
        };

        match serde_json::from_slice(&output.stdout) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "Analyser output was not a valid verdict, degrading");
                AnalysisVerdict::default()
            }
        }
    }
}
