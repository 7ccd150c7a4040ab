//! Small filesystem helpers shared by the index, graph, embedding cache,
//! and memory CRUD layers: everything writes via a sibling temp file then
//! renames into place, so a crash never leaves a half-written file visible
//! under its final name (§5, "atomic rename... gives a last-write-wins
//! resolution").

use std::path::Path;

use crate::error::Result;

/// Write `contents` to `path` atomically: write to `path` with a `.tmp-<pid>`
/// suffix in the same directory, then rename over the destination.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = sibling_tmp_path(path);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "tmp".to_string());
    path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()))
}
