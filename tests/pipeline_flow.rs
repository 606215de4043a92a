//! End-to-end pipeline tests.
//!
//! These exercise both flows against a local git repository and shell-script
//! stand-ins for the measurement agent and analyser. They require `git` and
//! `python3` on the PATH, which the service itself already assumes.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use metriccull::config::ServiceConfig;
use metriccull::events::LogSink;
use metriccull::pipeline::{Orchestrator, RunRequest};
use metriccull::storage::{HistoryStore, MemoryHistoryStore};

fn make_executable(path: &PathBuf) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Agent stand-in: two progress lines, a stale report, then the real one.
fn fake_agent(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fake-agent");
    std::fs::write(
        &path,
        concat!(
            "#!/bin/sh\n",
            "echo 'Loading module'\n",
            "echo 'Warming up'\n",
            "echo '{\"total_time_ms\":1,\"peak_memory_kb\":1,\"status\":\"stale\"}'\n",
            "echo '{\"total_time_ms\":120,\"peak_memory_kb\":2048,\"status\":\"ok\"}'\n",
        ),
    )
    .unwrap();
    make_executable(&path);
    path
}

fn fake_analyser(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("analyser.py");
    std::fs::write(
        &path,
        concat!(
            "import json, sys\n",
            "report = json.load(sys.stdin)\n",
            "print(json.dumps({\"score\": \"B\",\n",
            "    \"suggestions\": [f\"{report['total_time_ms']}ms total\"]}))\n",
        ),
    )
    .unwrap();
    path
}

/// Local git repository serving as the clone source. An empty
/// requirements.txt keeps provisioning off the network.
fn source_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.py"), "print('hello')\n").unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "").unwrap();

    for args in [
        vec!["init", "-q"],
        vec!["config", "user.email", "test@test.invalid"],
        vec!["config", "user.name", "test"],
        vec!["add", "."],
        vec!["commit", "-q", "-m", "init"],
    ] {
        let status = Command::new("git")
            .args(&args)
            .current_dir(dir.path())
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    dir
}

fn build_orchestrator(workdir: &TempDir) -> (Orchestrator, Arc<MemoryHistoryStore>) {
    let config = ServiceConfig::default()
        .with_database_url("postgres://unused/test")
        .with_agent_path(fake_agent(workdir))
        .with_analyser_path(fake_analyser(workdir))
        .with_agent_timeout(Duration::from_secs(30));

    let store = Arc::new(MemoryHistoryStore::new());
    (Orchestrator::new(config, store.clone()), store)
}

#[tokio::test]
async fn sync_flow_mirrors_agent_report_exactly() {
    let workdir = TempDir::new().unwrap();
    let source = source_repo();

    // Bounded mode expects the whole stdout to be one JSON document, so the
    // sync flow gets a single-line agent.
    let agent = workdir.path().join("single-line-agent");
    std::fs::write(
        &agent,
        "#!/bin/sh\necho '{\"total_time_ms\":120,\"peak_memory_kb\":2048,\"status\":\"ok\"}'\n",
    )
    .unwrap();
    make_executable(&agent);

    let config = ServiceConfig::default()
        .with_database_url("postgres://unused/test")
        .with_agent_path(agent)
        .with_analyser_path(fake_analyser(&workdir));
    let store = Arc::new(MemoryHistoryStore::new());
    let orchestrator = Orchestrator::new(config, store.clone());

    let request = RunRequest::new(source.path().to_string_lossy().to_string());
    let outcome = orchestrator.run_sync(&request).await.unwrap();
    assert_eq!(outcome.metrics.total_time_ms, 120);
    assert_eq!(outcome.metrics.peak_memory_kb, 2048);
    assert_eq!(outcome.metrics.status, "ok");
    assert_eq!(outcome.analysis.score, "B");
    assert_eq!(outcome.analysis.suggestions, vec!["120ms total".to_string()]);

    // The synchronous flow never persists.
    assert!(store.recent(20).await.unwrap().is_empty());
}

#[tokio::test]
async fn streaming_flow_relays_logs_and_persists_record() {
    let workdir = TempDir::new().unwrap();
    let source = source_repo();
    let (orchestrator, store) = build_orchestrator(&workdir);

    let request = RunRequest::new(source.path().to_string_lossy().to_string());
    let (sink, mut rx) = LogSink::channel();

    let outcome = orchestrator.run_streaming(&request, &sink).await.unwrap();
    drop(sink);

    let mut logs = Vec::new();
    while let Some(line) = rx.recv().await {
        logs.push(line);
    }

    // Progress lines are forwarded, report lines are retained.
    assert!(logs.iter().any(|l| l == "Cloning repository..."));
    assert!(logs.iter().any(|l| l == "Found entry point: main.py"));
    assert!(logs.iter().any(|l| l == "Loading module"));
    assert!(logs.iter().all(|l| !l.starts_with('{')));

    // The last JSON line wins.
    assert_eq!(outcome.metrics.total_time_ms, 120);
    assert_eq!(outcome.metrics.status, "ok");

    // Exactly one record persisted, carrying the metrics and verdict.
    let records = store.recent(20).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].total_time_ms, 120);
    assert_eq!(records[0].peak_memory_kb, 2048);
    assert_eq!(records[0].score, "B");
    assert_eq!(records[0].version, "python3");
}

#[tokio::test]
async fn streaming_flow_with_degraded_analysis_still_persists() {
    let workdir = TempDir::new().unwrap();
    let source = source_repo();

    // Analyser that produces no output at all.
    let analyser = workdir.path().join("silent.py");
    std::fs::write(&analyser, "import sys\nsys.stdin.read()\n").unwrap();

    let config = ServiceConfig::default()
        .with_database_url("postgres://unused/test")
        .with_agent_path(fake_agent(&workdir))
        .with_analyser_path(analyser);
    let store = Arc::new(MemoryHistoryStore::new());
    let orchestrator = Orchestrator::new(config, store.clone());

    let request = RunRequest::new(source.path().to_string_lossy().to_string());
    let outcome = orchestrator
        .run_streaming(&request, &LogSink::discard())
        .await
        .unwrap();

    assert!(outcome.analysis.score.is_empty());
    assert!(outcome.analysis.suggestions.is_empty());

    let records = store.recent(20).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].score.is_empty());
}
