//! Shallow-clone acquisition of a repository into a temporary checkout.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PipelineError;

/// An ephemeral local checkout, exclusively owned by one run.
///
/// The backing directory is removed when the checkout is dropped, which
/// guarantees cleanup exactly once on every exit path out of the pipeline,
/// including failures and panics.
pub struct Checkout {
    path: PathBuf,
}

impl Checkout {
    /// Returns the checkout's root directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            // The directory may not exist if the clone never created it.
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove checkout");
            }
        }
    }
}

/// Clones `repo_url` at depth 1 into a freshly generated temporary directory.
///
/// The directory name derives from a fresh UUID so concurrent runs cannot
/// collide. Any non-zero exit from git surfaces as
/// [`PipelineError::CloneFailed`] carrying the tool's combined output
/// verbatim. No retry is attempted; the caller owns that decision.
pub async fn acquire(repo_url: &str) -> Result<Checkout, PipelineError> {
    let id = Uuid::new_v4();
    let path = std::env::temp_dir().join(format!("metriccull-{}", id));

    debug!(repo_url = repo_url, path = %path.display(), "Cloning repository");

    let output = Command::new("git")
        .args(["clone", "--depth", "1", repo_url])
        .arg(&path)
        .output()
        .await
        .map_err(|e| PipelineError::CloneFailed(format!("failed to spawn git: {}", e)))?;

    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        // Make sure the half-created directory does not leak.
        let _ = std::fs::remove_dir_all(&path);
        return Err(PipelineError::CloneFailed(combined));
    }

    Ok(Checkout { path })
}
