//! Session export artifacts: pretty JSON files named after the session and the export date.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::api::ExportBundle;

/// Replace characters that are unsafe in file names (path separators, reserved and control chars).
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// `chat-session-{name}-{YYYY-MM-DD}.json`
pub fn export_file_name(session_name: &str, date: chrono::NaiveDate) -> String {
    format!(
        "chat-session-{}-{}.json",
        sanitize_name(session_name),
        date.format("%Y-%m-%d")
    )
}

/// First path in `dir` for `file_name` that does not exist yet (`-1`, `-2`, ... before `.json`).
fn unused_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = file_name.trim_end_matches(".json");
    (1..)
        .map(|n| dir.join(format!("{}-{}.json", stem, n)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Write the bundle as pretty JSON into `dir` (created if missing). Returns the written path.
pub async fn write_export(
    dir: &Path,
    bundle: &ExportBundle,
    date: chrono::NaiveDate,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating export directory {}", dir.display()))?;
    let path = unused_path(dir, &export_file_name(&bundle.session.name, date));
    let body = serde_json::to_string_pretty(bundle).context("serializing export bundle")?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("writing export to {}", path.display()))?;
    log::info!("exported session {} to {}", bundle.session.id, path.display());
    Ok(path)
}
