//! Command handlers for the logsift CLI.
//!
//! Each submodule handles a specific CLI command or command group.
//! The main dispatch logic remains in main.rs.

pub mod analyze;
pub mod completions;
pub mod config;
pub mod estimate;
pub mod segment;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use logsift::triage::LogKind;

/// Read a log file, replacing invalid UTF-8 rather than failing.
///
/// Device logs often contain stray binary bytes from native crashes.
pub fn read_log(path: &Path) -> Result<String> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Use the explicit kind, or guess it from the file name.
pub fn resolve_kind(kind: Option<LogKind>, path: &Path) -> LogKind {
    kind.unwrap_or_else(|| {
        path.file_name()
            .map(|name| LogKind::from_file_name(&name.to_string_lossy()))
            .unwrap_or_default()
    })
}
