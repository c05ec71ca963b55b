//! Checkpoint presence check.

use std::path::{Path, PathBuf};

/// Subdirectories expected under the checkpoint root.
pub const REQUIRED_CHECKPOINTS: [&str; 4] =
    ["ootd", "humanparsing", "openpose", "clip-vit-large-patch14"];

/// Returns the checkpoint directories that are missing under `root`.
///
/// Missing entries are logged as warnings; the server still starts and the
/// affected profile fails when it is first constructed.
pub fn check_checkpoints(root: &Path) -> Vec<PathBuf> {
    let missing: Vec<PathBuf> = REQUIRED_CHECKPOINTS
        .iter()
        .map(|name| root.join(name))
        .filter(|path| !path.is_dir())
        .collect();

    for path in &missing {
        tracing::warn!(path = %path.display(), "Checkpoint directory not found");
    }
    if missing.is_empty() {
        tracing::info!(root = %root.display(), "All checkpoints present");
    }
    missing
}
