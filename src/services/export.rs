use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::core::state::ExportRecord;

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("content-request-{}.json", now.timestamp_millis())
}

/// Writes the pretty-printed record into `dir` and returns the file path.
pub async fn write_export(dir: &Path, record: &ExportRecord, now: DateTime<Utc>) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(export_filename(now));
    let content = serde_json::to_string_pretty(record)?;
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("Exported content request to {}", path.display());
    Ok(path)
}
