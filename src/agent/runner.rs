//! Agent subprocess execution, bounded and streaming.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{classify_line, LineClass, MetricsReport};
use crate::error::PipelineError;
use crate::events::LogSink;

/// Executes the external measurement agent against a resolved entry point.
///
/// Two modes share the same underlying contract:
///
/// - **Bounded**: hard wall-clock deadline, buffered output, used by the
///   synchronous flow. Stdout consumption runs concurrently with the child
///   so it never blocks on a full pipe.
/// - **Streaming**: no deadline, output consumed line by line and relayed to
///   a [`LogSink`], used by the streaming flow.
pub struct AgentRunner {
    /// Path to the agent executable.
    agent_path: PathBuf,
    /// Deadline for bounded-mode execution.
    timeout: Duration,
}

impl AgentRunner {
    /// Creates a runner for the agent at `agent_path`.
    pub fn new(agent_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            agent_path: agent_path.into(),
            timeout,
        }
    }

    /// Runs the agent with a hard deadline and buffered output.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AgentFailed`] on non-zero exit or deadline, with the
    ///   captured combined output.
    /// - [`PipelineError::ReportUnparseable`] when the captured stdout is not
    ///   exactly one JSON report, with the raw bytes preserved.
    pub async fn run_bounded(&self, entry_point: &Path) -> Result<MetricsReport, PipelineError> {
        let start = Instant::now();

        let mut child = Command::new(&self.agent_path)
            .arg(entry_point)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PipelineError::AgentFailed(format!(
                    "failed to spawn {}: {}",
                    self.agent_path.display(),
                    e
                ))
            })?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let mut stdout_content = String::new();
        let mut stderr_content = String::new();

        // Drain both pipes concurrently with the child's execution, then wait.
        let bounded = tokio::time::timeout(self.timeout, async {
            loop {
                tokio::select! {
                    line = stdout_lines.next_line() => {
                        match line {
                            Ok(Some(l)) => {
                                stdout_content.push_str(&l);
                                stdout_content.push('\n');
                            }
                            Ok(None) => break,
                            Err(e) => {
                                warn!("Error reading agent stdout: {}", e);
                                break;
                            }
                        }
                    }
                    line = stderr_lines.next_line() => {
                        match line {
                            Ok(Some(l)) => {
                                stderr_content.push_str(&l);
                                stderr_content.push('\n');
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!("Error reading agent stderr: {}", e);
                            }
                        }
                    }
                }
            }

            child.wait().await
        });

        let exit_status = match bounded.await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(PipelineError::AgentFailed(format!("process error: {}", e)));
            }
            Err(_) => {
                // Deadline exceeded: cancellation propagates to the subprocess.
                let _ = child.kill().await;
                return Err(PipelineError::AgentFailed(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        info!(
            "Agent completed in {:?} with exit code {}",
            start.elapsed(),
            exit_status.code().unwrap_or(-1)
        );

        if !exit_status.success() {
            let mut combined = stdout_content;
            combined.push_str(&stderr_content);
            return Err(PipelineError::AgentFailed(combined));
        }

        serde_json::from_str(stdout_content.trim()).map_err(|_| PipelineError::ReportUnparseable {
            raw: stdout_content,
        })
    }

    /// Runs the agent with incremental output relay and no deadline.
    ///
    /// Progress lines are forwarded to `logs` as they arrive; the last
    /// JSON-looking line is retained as the candidate report, superseding any
    /// earlier one. A missing or unparseable terminal line degrades to a
    /// zero-valued report rather than failing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AgentFailed`] only when the agent cannot be
    /// spawned at all.
    pub async fn run_streaming(
        &self,
        entry_point: &Path,
        interpreter: Option<&Path>,
        logs: &LogSink,
    ) -> Result<MetricsReport, PipelineError> {
        let mut cmd = Command::new(&self.agent_path);
        cmd.arg(entry_point)
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        if let Some(python) = interpreter {
            cmd.env("CUSTOM_PYTHON", python);
        }

        let mut child = cmd.spawn().map_err(|e| {
            PipelineError::AgentFailed(format!(
                "failed to spawn {}: {}",
                self.agent_path.display(),
                e
            ))
        })?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let mut lines = BufReader::new(stdout).lines();

        let mut last_report_line = String::new();
        while let Some(line) = lines.next_line().await? {
            match classify_line(&line) {
                LineClass::Log if !line.is_empty() => logs.emit(line),
                LineClass::Log => {}
                LineClass::Report => last_report_line = line,
            }
        }

        let status = child.wait().await?;
        debug!(
            "Streaming agent exited with code {}",
            status.code().unwrap_or(-1)
        );

        // Parsing an empty or stale line fails here by design; the degraded
        // outcome is a zero-valued report, not an aborted run.
        let report = serde_json::from_str(&last_report_line).unwrap_or_else(|_| {
            warn!("Agent produced no valid terminal report line");
            MetricsReport::default()
        });

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Writes an executable shell script standing in for the agent binary.
    fn fake_agent(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-agent");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn entry(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("main.py");
        std::fs::write(&path, "print('x')\n").unwrap();
        path
    }

    #[tokio::test]
    async fn test_bounded_success_parses_report() {
        let dir = TempDir::new().unwrap();
        let agent = fake_agent(
            &dir,
            r#"echo '{"total_time_ms":120,"peak_memory_kb":2048,"status":"ok"}'"#,
        );
        let runner = AgentRunner::new(agent, Duration::from_secs(10));

        let report = runner.run_bounded(&entry(&dir)).await.unwrap();
        assert_eq!(report.total_time_ms, 120);
        assert_eq!(report.peak_memory_kb, 2048);
        assert_eq!(report.status, "ok");
    }

    #[tokio::test]
    async fn test_bounded_nonzero_exit_is_agent_failed() {
        let dir = TempDir::new().unwrap();
        let agent = fake_agent(&dir, "echo boom; exit 3");
        let runner = AgentRunner::new(agent, Duration::from_secs(10));

        match runner.run_bounded(&entry(&dir)).await {
            Err(PipelineError::AgentFailed(output)) => assert!(output.contains("boom")),
            other => panic!("expected AgentFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_bounded_deadline_kills_agent() {
        let dir = TempDir::new().unwrap();
        let agent = fake_agent(&dir, "sleep 30");
        let runner = AgentRunner::new(agent, Duration::from_millis(200));

        let start = Instant::now();
        match runner.run_bounded(&entry(&dir)).await {
            Err(PipelineError::AgentFailed(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected AgentFailed, got {:?}", other.map(|_| ())),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_bounded_garbage_output_is_report_unparseable() {
        let dir = TempDir::new().unwrap();
        let agent = fake_agent(&dir, "echo 'this is not json'");
        let runner = AgentRunner::new(agent, Duration::from_secs(10));

        match runner.run_bounded(&entry(&dir)).await {
            Err(PipelineError::ReportUnparseable { raw }) => {
                assert!(raw.contains("this is not json"));
            }
            other => panic!("expected ReportUnparseable, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_streaming_relays_logs_and_keeps_last_report() {
        let dir = TempDir::new().unwrap();
        let agent = fake_agent(
            &dir,
            concat!(
                "echo 'Loading module'\n",
                r#"echo '{"total_time_ms":1,"peak_memory_kb":1,"status":"stale"}'"#,
                "\n",
                r#"echo '{"total_time_ms":120,"peak_memory_kb":2048,"status":"ok"}'"#,
            ),
        );
        let runner = AgentRunner::new(agent, Duration::from_secs(10));
        let (sink, mut rx) = LogSink::channel();

        let report = runner
            .run_streaming(&entry(&dir), None, &sink)
            .await
            .unwrap();
        drop(sink);

        assert_eq!(rx.recv().await, Some("Loading module".to_string()));
        assert_eq!(rx.recv().await, None, "report lines must not be forwarded");
        assert_eq!(report.total_time_ms, 120);
        assert_eq!(report.status, "ok");
    }

    #[tokio::test]
    async fn test_streaming_without_terminal_json_degrades_to_zero() {
        let dir = TempDir::new().unwrap();
        let agent = fake_agent(&dir, "echo 'only logs here'");
        let runner = AgentRunner::new(agent, Duration::from_secs(10));
        let sink = LogSink::discard();

        let report = runner
            .run_streaming(&entry(&dir), None, &sink)
            .await
            .unwrap();
        assert_eq!(report.total_time_ms, 0);
        assert_eq!(report.peak_memory_kb, 0);
    }

    #[tokio::test]
    async fn test_streaming_exports_custom_python() {
        let dir = TempDir::new().unwrap();
        let agent = fake_agent(&dir, r#"echo "interp: $CUSTOM_PYTHON""#);
        let runner = AgentRunner::new(agent, Duration::from_secs(10));
        let (sink, mut rx) = LogSink::channel();

        let python = dir.path().join("venv/bin/python3");
        runner
            .run_streaming(&entry(&dir), Some(&python), &sink)
            .await
            .unwrap();
        drop(sink);

        let line = rx.recv().await.unwrap();
        assert!(line.contains("venv/bin/python3"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_agent_failed() {
        let dir = TempDir::new().unwrap();
        let runner = AgentRunner::new("/nonexistent/agent", Duration::from_secs(1));

        assert!(matches!(
            runner.run_bounded(&entry(&dir)).await,
            Err(PipelineError::AgentFailed(_))
        ));
        assert!(matches!(
            runner
                .run_streaming(&entry(&dir), None, &LogSink::discard())
                .await,
            Err(PipelineError::AgentFailed(_))
        ));
    }
}
