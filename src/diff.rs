//! Unified diffs for dry-run reporting.

use similar::TextDiff;
use std::path::Path;

/// Render a unified diff between the current file content and the candidate.
///
/// Non-UTF-8 content is summarized instead of diffed.
pub fn unified_diff(path: &Path, existing: &[u8], candidate: &[u8]) -> String {
    let (Ok(old), Ok(new)) = (std::str::from_utf8(existing), std::str::from_utf8(candidate)) else {
        return format!(
            "Binary file {} differs ({} -> {} bytes)\n",
            path.display(),
            existing.len(),
            candidate.len()
        );
    };

    let old = normalize_line_endings(old);
    let new = normalize_line_endings(new);
    let old_header = format!("a/{}", path.display());
    let new_header = format!("b/{}", path.display());

    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
