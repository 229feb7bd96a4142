// src/export.rs
use eyre::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::Report;

/// Reports are named by the first 8 characters of the analyzed address
pub fn report_filename(address: &str) -> String {
    let prefix: String = address.chars().take(8).collect();
    format!("bitcoin_analysis_{}.json", prefix)
}

/// Persist a full report as pretty-printed JSON
pub fn write_report(dir: &str, report: &Report) -> Result<PathBuf> {
    let path = Path::new(dir).join(report_filename(&report.metadata.address));
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, &json)?;
    info!("Exported analysis to {} ({} bytes)", path.display(), json.len());
    Ok(path)
}

/// List analysis reports previously written to `dir`
pub fn list_reports(dir: &str) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("bitcoin_analysis_") && name.ends_with(".json") {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}
