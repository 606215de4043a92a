//! Isolated Python environment provisioning for a checkout.
//!
//! Provisioning runs only in streaming mode and is best-effort at every step
//! except virtual-environment creation:
//!
//! 1. Verify the requested interpreter resolves on the host; fall back to
//!    `python3` with a log event (silent-degrade, not a failure).
//! 2. Create a venv inside the checkout. Non-zero exit here is fatal.
//! 3. Probe dependency manifests in priority order and attempt an install for
//!    each one found. Install failures are tracked, not fatal, because
//!    multiple manifests may coexist and only one needs to succeed.
//! 4. If nothing installed, preload a fallback numeric toolkit so the agent
//!    has a minimally usable environment.
//!
//! Each step emits a progress line to the supplied [`LogSink`] as it happens.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ProvisionError;
use crate::events::LogSink;

/// Interpreter substituted when the requested version is unavailable.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Runtime versions offered to callers, newest candidates last.
pub const CANDIDATE_VERSIONS: [&str; 4] =
    ["python3.10", "python3.11", "python3.12", "python3.13"];

/// Dependency manifests probed in priority order, with the pip arguments
/// used to install from each.
const MANIFESTS: [(&str, &[&str]); 3] = [
    ("requirements.txt", &["install", "-r", "requirements.txt"]),
    ("pyproject.toml", &["install", "."]),
    ("setup.py", &["install", "."]),
];

/// Packages installed when no manifest yields a successful install.
const FALLBACK_PACKAGES: [&str; 2] = ["numpy", "pandas"];

/// Outcome of the dependency-install phase.
///
/// Best-effort failures are modelled explicitly instead of being discarded,
/// so they stay observable in logs even though they never abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// At least one manifest install succeeded.
    Installed { manifests: Vec<String> },
    /// No manifest install succeeded; the fallback package set was attempted.
    FallbackApplied,
}

/// Result of a successful provisioning pass.
#[derive(Debug, Clone)]
pub struct ProvisionedEnv {
    /// Interpreter inside the venv, handed to the agent via `CUSTOM_PYTHON`.
    pub interpreter: PathBuf,
    /// How dependencies ended up installed.
    pub install_outcome: InstallOutcome,
}

/// Checks whether `interpreter` resolves and runs on the host.
pub async fn interpreter_available(interpreter: &str) -> bool {
    Command::new(interpreter)
        .arg("--version")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Returns the subset of [`CANDIDATE_VERSIONS`] resolvable on this host,
/// defaulting to `[DEFAULT_INTERPRETER]` when none resolve.
pub async fn available_versions() -> Vec<String> {
    let mut available = Vec::new();
    for version in CANDIDATE_VERSIONS {
        if interpreter_available(version).await {
            available.push(version.to_string());
        }
    }

    if available.is_empty() {
        available.push(DEFAULT_INTERPRETER.to_string());
    }

    available
}

/// Provisions an isolated environment rooted in `checkout`.
///
/// Returns the venv interpreter path on success. Only venv creation is
/// fatal; see the module docs for the step-by-step policy.
///
/// # Errors
///
/// Returns [`ProvisionError::VenvFailed`] with captured stderr when venv
/// creation exits non-zero.
pub async fn provision(
    checkout: &Path,
    requested_version: &str,
    logs: &LogSink,
) -> Result<ProvisionedEnv, ProvisionError> {
    let mut version = requested_version.to_string();

    if !interpreter_available(&version).await {
        logs.emit(format!(
            "⚠️  Version {} not found. Falling back to {}.",
            version, DEFAULT_INTERPRETER
        ));
        version = DEFAULT_INTERPRETER.to_string();
    }

    logs.emit(format!("Creating venv with {}...", version));

    let venv_dir = checkout.join("venv");
    let output = Command::new(&version)
        .args(["-m", "venv"])
        .arg(&venv_dir)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ProvisionError::VenvFailed {
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let pip = venv_dir.join("bin").join("pip");
    let mut installed = Vec::new();

    for (manifest, args) in MANIFESTS {
        if !checkout.join(manifest).is_file() {
            continue;
        }

        logs.emit(format!("Installing dependencies from {}...", manifest));

        match Command::new(&pip)
            .args(args)
            .current_dir(checkout)
            .output()
            .await
        {
            Ok(out) if out.status.success() => {
                installed.push(manifest.to_string());
            }
            Ok(out) => {
                debug!(
                    manifest = manifest,
                    stderr = %String::from_utf8_lossy(&out.stderr),
                    "Manifest install failed, continuing"
                );
            }
            Err(e) => {
                warn!(manifest = manifest, error = %e, "Could not run pip");
            }
        }
    }

    let install_outcome = if installed.is_empty() {
        logs.emit("No manifest found. Pre-loading benchmark suite (numpy, pandas)...");
        if let Err(e) = Command::new(&pip)
            .arg("install")
            .args(FALLBACK_PACKAGES)
            .output()
            .await
        {
            warn!(error = %e, "Fallback package install could not run");
        }
        InstallOutcome::FallbackApplied
    } else {
        InstallOutcome::Installed {
            manifests: installed,
        }
    };

    logs.emit("Dependencies ready.");

    Ok(ProvisionedEnv {
        interpreter: venv_dir.join("bin").join(DEFAULT_INTERPRETER),
        install_outcome,
    })
}
