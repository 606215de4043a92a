//! Entry-point selection within a checkout.

use std::path::{Path, PathBuf};

/// Canonical entry-point filenames, in priority order.
const PRIORITY_NAMES: [&str; 4] = ["main.py", "app.py", "run.py", "benchmark.py"];

/// Selects the file the measurement agent will execute.
///
/// Checks the fixed priority list first and returns the first name that
/// exists in the checkout root. If none match, falls back to any `*.py` file
/// in the root; the pick is filesystem-order dependent, an accepted
/// non-determinism. Returns `None` when the checkout contains no candidate at
/// all, which the orchestrator treats as terminal.
pub fn resolve_entry_point(dir: &Path) -> Option<PathBuf> {
    for name in PRIORITY_NAMES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.is_file() && p.extension().map(|ext| ext == "py").unwrap_or(false))
}
