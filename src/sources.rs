//! File-backed address lists.
//!
//! Entries are returned verbatim and in file order. Nothing is filtered
//! for validity here: a bad entry must fail gate construction with its
//! literal text rather than silently vanish.

use crate::config::ListFormat;
use crate::error::GateError;
use std::path::Path;
use tracing::debug;

/// Load an address list from a file.
pub fn load_list(path: &Path, format: ListFormat) -> Result<Vec<String>, GateError> {
    let content = std::fs::read_to_string(path).map_err(|source| GateError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let entries = match format {
        ListFormat::Plain => parse_plain(&content),
        ListFormat::Csv => parse_csv(&content),
        ListFormat::Json => parse_json(&content).map_err(|e| GateError::Source {
            path: path.to_path_buf(),
            reason: format!("Invalid JSON: {}", e),
        })?,
    };

    debug!(
        path = %path.display(),
        format = ?format,
        entries = entries.len(),
        "Address list loaded"
    );

    Ok(entries)
}

fn content_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// One IP/CIDR per line.
fn parse_plain(content: &str) -> Vec<String> {
    content_lines(content).map(str::to_string).collect()
}

/// First column is the IP/CIDR.
fn parse_csv(content: &str) -> Vec<String> {
    content_lines(content)
        .filter_map(|line| line.split(',').next())
        .map(|column| column.trim().to_string())
        .collect()
}

/// Array of IP/CIDR strings.
fn parse_json(content: &str) -> Result<Vec<String>, serde_json::Error> {
    let entries: Vec<String> = serde_json::from_str(content)?;
    Ok(entries.into_iter().map(|e| e.trim().to_string()).collect())
}
