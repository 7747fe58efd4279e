use crate::error::RuntimeError;
use stampede_core::RunSummary;
use std::path::Path;

/// Writes the summary as pretty JSON, creating parent directories as needed.
pub async fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), RuntimeError> {
    let report_err = |source| RuntimeError::Report {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(report_err)?;
    }

    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, json).await.map_err(report_err)?;
    Ok(())
}
