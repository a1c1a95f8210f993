use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Create `path` (and parents) if it does not exist yet. Returns the path for chaining.
pub fn ensure_dir(path: &Path) -> anyhow::Result<PathBuf> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))?;
    }
    Ok(path.to_path_buf())
}

/// True when `path` is a regular file with at least one byte in it.
pub fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// Quote a string for safe interpolation into a POSIX shell command.
pub fn shell_quote(raw: &str) -> String {
    if !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | ',' | '='))
    {
        return raw.to_string();
    }
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Registrable base of a hostname: its last two labels (`a.b.example.com` -> `example.com`).
pub fn base_domain(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.trim().trim_end_matches('.').split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return None;
    }
    Some(labels[labels.len() - 2..].join("."))
}
