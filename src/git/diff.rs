//! Diff text rendering and section assembly.

use crate::error::{ReviewerError, Result};

/// Header preceding the committed portion of an `all`-scope diff.
pub const COMMITTED_CHANGES_HEADER: &str = "=== COMMITTED CHANGES ===";

/// Header preceding the staged (index vs HEAD) portion of an `all`-scope diff.
pub const STAGED_CHANGES_HEADER: &str = "=== STAGED CHANGES ===";

/// Header preceding the unstaged (working tree vs index) portion of an
/// `all`-scope diff.
pub const UNSTAGED_CHANGES_HEADER: &str = "=== UNSTAGED CHANGES ===";

/// Renders a [`git2::Diff`] as unified patch text.
///
/// Line origins `+`/`-`/` ` are re-prefixed the way `git diff` prints them;
/// header lines arrive with their content intact. Binary files keep the
/// provider-generated "Binary files differ" notice.
pub(crate) fn render_patch(diff: &git2::Diff<'_>) -> Result<String> {
    let mut out = String::new();
    diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            out.push(line.origin());
        }
        out.push_str(&String::from_utf8_lossy(line.content()));
        true
    })
    .map_err(|e| {
        ReviewerError::GitRepository(format!("failed to render diff: {}", e.message()))
    })?;
    Ok(out)
}

/// Joins labelled diff sections, omitting empty ones entirely.
///
/// Sections appear in input order, each non-empty body preceded by its
/// header; no header is emitted for an empty body.
pub(crate) fn assemble_sections(sections: &[(&str, &str)]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for (header, body) in sections {
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        parts.push(header);
        parts.push(body);
    }
    parts.join("\n\n")
}
