//! I/O operations for reports.
//!
//! Reads and writes outcome exports, Markdown summaries and dashboard data
//! on the filesystem.

use crate::dashboard::DashboardData;
use crate::error::Result;
use crate::export::OutcomeExport;
use std::fs;
use std::path::Path;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write outcome exports as a pretty JSON array.
pub fn write_outcomes_json(outcomes: &[OutcomeExport], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(outcomes)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read outcome exports from a JSON file.
pub fn read_outcomes_json(path: impl AsRef<Path>) -> Result<Vec<OutcomeExport>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a Markdown document.
pub fn write_markdown(markdown: &str, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, markdown)?;
    Ok(())
}

/// Write dashboard data as a `data.js` file.
pub fn write_dashboard(data: &DashboardData, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, data.to_js()?)?;
    Ok(())
}

/// Read dashboard data from a `data.js` file.
pub fn read_dashboard(path: impl AsRef<Path>) -> Result<DashboardData> {
    let content = fs::read_to_string(path)?;
    DashboardData::from_js(&content)
}
