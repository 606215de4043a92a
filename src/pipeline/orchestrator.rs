//! The pipeline orchestrator.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{PipelineStage, RunOutcome, RunRequest};
use crate::agent::AgentRunner;
use crate::analysis::AnalysisInvoker;
use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::events::LogSink;
use crate::provision;
use crate::repo;
use crate::storage::{HistoryStore, RunRecord};

/// Coordinates one run end to end.
///
/// Stages execute strictly in order; no stage begins before its predecessor
/// completes. The checkout is dropped (and its directory removed) on every
/// exit path out of every stage, exactly once.
///
/// Clone, provisioning and streaming agent execution carry no deadline; only
/// bounded agent execution is cancellable. A caller disconnecting mid-stream
/// does not halt in-flight work.
pub struct Orchestrator {
    config: ServiceConfig,
    runner: AgentRunner,
    analyser: AnalysisInvoker,
    store: Arc<dyn HistoryStore>,
}

impl Orchestrator {
    /// Creates an orchestrator from service configuration and an injected
    /// history store.
    pub fn new(config: ServiceConfig, store: Arc<dyn HistoryStore>) -> Self {
        let runner = AgentRunner::new(config.agent_path.clone(), config.agent_timeout);
        let analyser = AnalysisInvoker::new(config.analyser_path.clone());

        Self {
            config,
            runner,
            analyser,
            store,
        }
    }

    /// Returns the service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Runs the synchronous flow: acquire, resolve, bounded agent execution,
    /// best-effort analysis. No provisioning, no persistence.
    ///
    /// # Errors
    ///
    /// Propagates [`PipelineError`] from acquisition, resolution and agent
    /// execution; analysis failures degrade to an empty verdict instead.
    pub async fn run_sync(&self, request: &RunRequest) -> Result<RunOutcome, PipelineError> {
        info!(repo_url = %request.repo_url, "Starting synchronous run");

        let checkout = repo::acquire(&request.repo_url).await?;

        let entry_point =
            repo::resolve_entry_point(checkout.path()).ok_or(PipelineError::NoEntryPoint)?;

        let metrics = self.runner.run_bounded(&entry_point).await?;

        let analysis = self.analyser.analyse(&metrics).await;

        info!(
            repo_url = %request.repo_url,
            total_time_ms = metrics.total_time_ms,
            "Synchronous run complete"
        );

        Ok(RunOutcome { metrics, analysis })
    }

    /// Runs the streaming flow, relaying progress to `logs`.
    ///
    /// Returns `Some(outcome)` when the run reaches its terminal state,
    /// `None` when it failed beforehand; in the failure case the reason has
    /// already been emitted as a log event, and the caller signals the
    /// incomplete run by closing the channel without a terminal event.
    ///
    /// Provisioning failure does not abort the run: the agent is executed
    /// without a provisioned interpreter. The terminal state always attempts
    /// persistence, even for a degraded zero-valued report; persistence
    /// failure is logged and never surfaced.
    pub async fn run_streaming(&self, request: &RunRequest, logs: &LogSink) -> Option<RunOutcome> {
        info!(repo_url = %request.repo_url, "Starting streaming run");

        logs.emit("Cloning repository...");
        let checkout = match repo::acquire(&request.repo_url).await {
            Ok(checkout) => checkout,
            Err(e) => {
                warn!(stage = %PipelineStage::Acquiring, error = %e, "Streaming run failed");
                logs.emit(format!("Clone failed: {}", e));
                return None;
            }
        };

        let entry_point = match repo::resolve_entry_point(checkout.path()) {
            Some(entry) => entry,
            None => {
                warn!(stage = %PipelineStage::Resolving, "Streaming run failed");
                logs.emit("No Python entry point found.");
                return None;
            }
        };
        let entry_name = entry_point
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        logs.emit(format!("Found entry point: {}", entry_name));

        let interpreter = match provision::provision(checkout.path(), &request.version, logs).await
        {
            Ok(env) => {
                info!(
                    stage = %PipelineStage::Provisioning,
                    outcome = ?env.install_outcome,
                    "Environment ready"
                );
                Some(env.interpreter)
            }
            Err(e) => {
                warn!(stage = %PipelineStage::Provisioning, error = %e, "Provisioning failed");
                logs.emit(format!("Dependency error: {}", e));
                None
            }
        };

        let metrics = match self
            .runner
            .run_streaming(&entry_point, interpreter.as_deref(), logs)
            .await
        {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(stage = %PipelineStage::Running, error = %e, "Streaming run failed");
                logs.emit(format!("Agent error: {}", e));
                return None;
            }
        };

        let analysis = self.analyser.analyse(&metrics).await;

        let record = RunRecord {
            id: Uuid::new_v4(),
            repo_url: request.repo_url.clone(),
            version: request.version.clone(),
            total_time_ms: metrics.total_time_ms,
            peak_memory_kb: metrics.peak_memory_kb,
            score: analysis.score.clone(),
            suggestions: analysis.suggestions.clone(),
            created_at: Utc::now(),
        };

        // The run already succeeded; storage availability must not change
        // its externally-visible result.
        if let Err(e) = self.store.append(&record).await {
            error!(stage = %PipelineStage::Persisting, error = %e, "Failed to persist run");
        }

        info!(
            repo_url = %request.repo_url,
            total_time_ms = metrics.total_time_ms,
            "Streaming run complete"
        );

        Some(RunOutcome { metrics, analysis })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryHistoryStore;
    use std::path::PathBuf;
    use std::process::Command as StdCommand;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(workdir: &TempDir) -> ServiceConfig {
        // Single-line output keeps the agent valid for both execution modes.
        let agent = workdir.path().join("fake-agent");
        std::fs::write(
            &agent,
            "#!/bin/sh\necho '{\"total_time_ms\":42,\"peak_memory_kb\":512,\"status\":\"ok\"}'\n",
        )
        .unwrap();
        make_executable(&agent);

        let analyser = workdir.path().join("analyser.py");
        std::fs::write(
            &analyser,
            concat!(
                "import json, sys\n",
                "json.load(sys.stdin)\n",
                "print(json.dumps({\"score\": \"A\", \"suggestions\": [\"looks fine\"]}))\n",
            ),
        )
        .unwrap();

        ServiceConfig::default()
            .with_database_url("postgres://unused/test")
            .with_agent_path(agent)
            .with_analyser_path(analyser)
            .with_agent_timeout(Duration::from_secs(30))
    }

    fn make_executable(path: &PathBuf) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Creates a local git repository usable as a clone source.
    fn source_repo(with_entry_point: bool) -> TempDir {
        let dir = TempDir::new().unwrap();
        if with_entry_point {
            std::fs::write(dir.path().join("main.py"), "print('x')\n").unwrap();
        } else {
            std::fs::write(dir.path().join("README.md"), "nothing to run\n").unwrap();
        }

        for args in [
            vec!["init", "-q"],
            vec!["config", "user.email", "test@test.invalid"],
            vec!["config", "user.name", "test"],
            vec!["add", "."],
            vec!["commit", "-q", "-m", "init"],
        ] {
            let status = StdCommand::new("git")
                .args(&args)
                .current_dir(dir.path())
                .status()
                .unwrap();
            assert!(status.success(), "git {:?} failed", args);
        }

        dir
    }

    fn orchestrator(workdir: &TempDir) -> (Orchestrator, Arc<MemoryHistoryStore>) {
        let store = Arc::new(MemoryHistoryStore::new());
        let orch = Orchestrator::new(test_config(workdir), store.clone());
        (orch, store)
    }

    #[tokio::test]
    async fn test_sync_run_round_trips_agent_metrics() {
        let workdir = TempDir::new().unwrap();
        let source = source_repo(true);
        let (orch, _) = orchestrator(&workdir);

        let request = RunRequest::new(source.path().to_string_lossy().to_string());
        let outcome = orch.run_sync(&request).await.unwrap();

        assert_eq!(outcome.metrics.total_time_ms, 42);
        assert_eq!(outcome.metrics.peak_memory_kb, 512);
        assert_eq!(outcome.metrics.status, "ok");
        assert_eq!(outcome.analysis.score, "A");
    }

    #[tokio::test]
    async fn test_sync_run_no_entry_point_fails_terminally() {
        let workdir = TempDir::new().unwrap();
        let source = source_repo(false);
        let (orch, _) = orchestrator(&workdir);

        let request = RunRequest::new(source.path().to_string_lossy().to_string());
        assert!(matches!(
            orch.run_sync(&request).await,
            Err(PipelineError::NoEntryPoint)
        ));
    }

    #[tokio::test]
    async fn test_sync_run_clone_failure_preserves_diagnostics() {
        let workdir = TempDir::new().unwrap();
        let (orch, _) = orchestrator(&workdir);

        let request = RunRequest::new("/nonexistent/no-such-repo");
        match orch.run_sync(&request).await {
            Err(PipelineError::CloneFailed(output)) => assert!(!output.is_empty()),
            other => panic!("expected CloneFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_streaming_failure_emits_log_and_no_outcome() {
        let workdir = TempDir::new().unwrap();
        let (orch, store) = orchestrator(&workdir);
        let (sink, mut rx) = LogSink::channel();

        let request = RunRequest::new("/nonexistent/no-such-repo");
        let outcome = orch.run_streaming(&request, &sink).await;
        drop(sink);

        assert!(outcome.is_none());
        assert!(store.recent(20).await.unwrap().is_empty());

        let mut saw_failure = false;
        while let Some(line) = rx.recv().await {
            if line.starts_with("Clone failed:") {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }
}
