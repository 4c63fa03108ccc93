use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Read URLs from one column of a CSV file with a header row.
///
/// `column` is matched against the header names first and otherwise read as a
/// 0-based index. Rows with an empty cell in that column are skipped.
pub fn read_urls_from_csv(path: &Path, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    let idx = match resolve_column(&headers, column) {
        Some(idx) => idx,
        None => {
            let available: Vec<&str> = headers.iter().collect();
            bail!(
                "Column '{}' not found in CSV. Available columns: {}",
                column,
                available.join(", ")
            );
        }
    };
    debug!(column, idx, "reading URLs from CSV column");

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed row in {}", path.display()))?;
        if let Some(cell) = record.get(idx).map(str::trim).filter(|c| !c.is_empty()) {
            urls.push(cell.to_string());
        }
    }
    Ok(urls)
}

fn resolve_column(headers: &csv::StringRecord, column: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .or_else(|| column.parse::<usize>().ok().filter(|i| *i < headers.len()))
}
