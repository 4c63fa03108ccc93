use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::models::Document;

pub struct MarkdownWriter {
    output_dir: PathBuf,
}

impl MarkdownWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
        info!("Using output directory: {}", output_dir.display());
        Ok(Self { output_dir })
    }

    /// Write `<output_dir>/<directory>/<title>.md`, replacing any existing file.
    pub fn save_document(&self, doc: &Document) -> Result<PathBuf> {
        let dir = self.output_dir.join(&doc.directory);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let target = dir.join(format!("{}.md", doc.title));
        let tmp = dir.join(format!(".{}.md.tmp", doc.title));
        fs::write(&tmp, &doc.content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to move {} into place", target.display()));
        }
        Ok(target)
    }

    /// Write every document; failures are logged and skipped. Returns the
    /// number of files written.
    pub fn save_documents(&self, docs: &[Document]) -> usize {
        let mut written = 0;
        for doc in docs {
            match self.save_document(doc) {
                Ok(path) => {
                    info!("Created: {}", path.display());
                    written += 1;
                }
                Err(e) => error!(url = %doc.url, "{:#}", e),
            }
        }
        written
    }
}
