//! Context-file aggregation for the review prompt.
//!
//! Each referenced file is read as UTF-8 and concatenated under a
//! `File: <path>` header. Per-file read failures are downgraded to inline
//! markers so one bad path never aborts the run; only the total-size guard
//! is fatal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ReviewerError, Result};

/// Sentinel substituted when no context files were supplied.
pub const EMPTY_CONTEXT_SENTINEL: &str = "(No additional context provided)";

/// Largest single file included verbatim; bigger files get an inline marker.
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Largest combined size accepted before the run aborts.
const MAX_TOTAL_SIZE: u64 = 50 * 1024 * 1024;

/// Aggregates context files into one text blob.
///
/// Relative paths resolve against `base_dir`. Duplicate resolved paths are
/// read once; order of first occurrence is preserved, never sorted. An empty
/// input list yields [`EMPTY_CONTEXT_SENTINEL`] so the template substitution
/// never silently vanishes.
pub fn aggregate<P: AsRef<Path>>(paths: &[P], base_dir: &Path) -> Result<String> {
    if paths.is_empty() {
        return Ok(EMPTY_CONTEXT_SENTINEL.to_string());
    }

    let resolved: Vec<PathBuf> = paths
        .iter()
        .map(|p| resolve_path(p.as_ref(), base_dir))
        .collect();

    let total: u64 = resolved
        .iter()
        .filter_map(|p| p.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum();
    if total > MAX_TOTAL_SIZE {
        return Err(ReviewerError::Context(format!(
            "total context file size {} bytes exceeds the {} byte limit",
            total, MAX_TOTAL_SIZE
        )));
    }

    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    for path in resolved {
        if !seen.insert(path.clone()) {
            continue;
        }
        parts.push(format!("File: {}\n{}", path.display(), read_file(&path)));
    }

    Ok(parts.join("\n\n"))
}

fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Reads one context file, downgrading any failure to an inline marker.
fn read_file(path: &Path) -> String {
    let metadata = match path.metadata() {
        Ok(m) => m,
        Err(e) => return format!("[Error reading file: {e}]"),
    };
    if !metadata.is_file() {
        return "[Error reading file: not a regular file]".to_string();
    }
    if metadata.len() > MAX_FILE_SIZE {
        return format!(
            "[Error reading file: file size {} bytes exceeds the {} byte limit]",
            metadata.len(),
            MAX_FILE_SIZE
        );
    }

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => return format!("[Error reading file: {e}]"),
    };

    if bytes.iter().take(1024).any(|&b| b == 0) {
        return "[Binary file - content not included]".to_string();
    }

    match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(_) => "[Binary file - content not included]".to_string(),
    }
}
