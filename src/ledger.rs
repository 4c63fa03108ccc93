use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::{ArticleMetadata, Status};

pub const CSV_FILENAME: &str = "meta.csv";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-domain `meta.csv` files under the output directory, plus a cache of
/// URLs already converted successfully in each domain.
pub struct MetadataLedger {
    output_dir: PathBuf,
    skip_existing: bool,
    processed: HashMap<String, HashSet<String>>,
}

impl MetadataLedger {
    pub fn new(output_dir: impl Into<PathBuf>, skip_existing: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            skip_existing,
            processed: HashMap::new(),
        }
    }

    pub fn csv_path(&self, domain: &str) -> PathBuf {
        self.output_dir.join(domain).join(CSV_FILENAME)
    }

    /// False only when skipping is on and `url` already succeeded in `domain`.
    pub fn should_process(&mut self, url: &str, domain: &str) -> bool {
        if !self.skip_existing {
            return true;
        }
        !self.processed_urls(domain).contains(url)
    }

    /// Insert or replace the row for `metadata.url` and rewrite the file.
    pub fn add_or_update(&mut self, metadata: ArticleMetadata) {
        let path = self.csv_path(&metadata.domain);

        let mut rows = match read_rows(&path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Error reading {}: {}", path.display(), e);
                Vec::new()
            }
        };
        match rows.iter_mut().find(|r| r.url == metadata.url) {
            Some(existing) => *existing = metadata.clone(),
            None => rows.push(metadata.clone()),
        }

        if let Err(e) = write_rows(&path, &rows) {
            error!("Error writing to {}: {}", path.display(), e);
        } else {
            debug!(url = %metadata.url, status = %metadata.status, "ledger updated");
        }

        if metadata.status == Status::Success {
            // load earlier successes first so they are not shadowed by this entry
            self.processed_urls(&metadata.domain);
            if let Some(urls) = self.processed.get_mut(&metadata.domain) {
                urls.insert(metadata.url);
            }
        }
    }

    /// All rows recorded for `domain`, in file order.
    pub fn load_records(&self, domain: &str) -> Result<Vec<ArticleMetadata>, LedgerError> {
        read_rows(&self.csv_path(domain))
    }

    fn processed_urls(&mut self, domain: &str) -> &HashSet<String> {
        if !self.processed.contains_key(domain) {
            let urls = self.load_successful(domain);
            self.processed.insert(domain.to_string(), urls);
        }
        &self.processed[domain]
    }

    fn load_successful(&self, domain: &str) -> HashSet<String> {
        match self.load_records(domain) {
            Ok(rows) => rows
                .into_iter()
                .filter(|r| r.status == Status::Success)
                .map(|r| r.url)
                .collect(),
            Err(e) => {
                warn!("Error loading metadata for {}: {}", domain, e);
                HashSet::new()
            }
        }
    }
}

// ── File access ──

fn read_rows(path: &Path) -> Result<Vec<ArticleMetadata>, LedgerError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path).map_err(|source| LedgerError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rows = Vec::new();
    for (i, row) in reader.deserialize::<ArticleMetadata>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            // bad rows are dropped, the rest of the ledger survives
            Err(e) => warn!("Skipping row {} of {}: {}", i + 1, path.display(), e),
        }
    }
    Ok(rows)
}

fn write_rows(path: &Path, rows: &[ArticleMetadata]) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| LedgerError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let csv_err = |source| LedgerError::Csv { path: path.to_path_buf(), source };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })
}
