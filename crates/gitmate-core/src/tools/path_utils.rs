//! Repository path validation and language hints for file tools

use std::path::Path;

use crate::tools::registry::ToolResult;

/// Validate a repository-relative path.
///
/// Rejects absolute paths, `..` segments and empty segments, so a tool never
/// reaches outside the repository tree. Returns the path without
/// surrounding slashes. `allow_root` accepts an empty path (repository root).
pub fn validate_repo_path(path: &str, allow_root: bool) -> Result<String, ToolResult> {
    let trimmed = path.trim();

    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(ToolResult::error(format!(
            "Invalid path '{}': path must be relative to the repository root",
            path
        )));
    }

    let normalized = trimmed.trim_end_matches('/');
    if normalized.is_empty() || normalized == "." {
        if allow_root {
            return Ok(String::new());
        }
        return Err(ToolResult::error("Invalid path: path must not be empty"));
    }

    for segment in normalized.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(ToolResult::error(format!(
                "Invalid path '{}': empty, '.' and '..' segments are not allowed",
                path
            )));
        }
    }

    Ok(normalized.to_string())
}

/// Language hint from a file extension, empty when unknown
pub fn language_hint(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "py" => "python",
        "json" => "json",
        "md" => "markdown",
        "yaml" | "yml" => "yaml",
        "txt" => "text",
        "rs" => "rust",
        "toml" => "toml",
        _ => "",
    }
}
