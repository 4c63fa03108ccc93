use anyhow::{bail, Result};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::{directory_from_url, stem_from_url};
use crate::fetch::{FetchConfig, FetchError, Fetcher};
use crate::ledger::MetadataLedger;
use crate::markdown::{to_markdown, MarkdownOptions};
use crate::models::{ArticleMetadata, Document, Status};
use crate::text::{extract_title, is_rate_limited, unwrap_double_brackets, DEFAULT_SCAN_LINES};

const RATE_LIMITED_MSG: &str = "Rate limited - too many requests";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("markdown conversion failed: {0}")]
    Transform(#[from] std::io::Error),
    #[error("could not derive a title from page content")]
    EmptyTitle,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub markdown: MarkdownOptions,
    pub title_scan_lines: usize,
    /// When false, one failed fetch aborts the whole batch.
    pub continue_on_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            markdown: MarkdownOptions::default(),
            title_scan_lines: DEFAULT_SCAN_LINES,
            continue_on_failure: true,
        }
    }
}

/// Result of one `convert_urls` call.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub documents: Vec<Document>,
    pub skipped: usize,
    pub successful: usize,
    pub rate_limited: usize,
    pub failed: usize,
}

enum Outcome {
    Converted(Document),
    RateLimited,
}

/// Turns URLs into markdown documents and records every outcome in the ledger.
pub struct HtmlConverter {
    ledger: MetadataLedger,
    config: PipelineConfig,
}

impl HtmlConverter {
    pub fn new(ledger: MetadataLedger, config: PipelineConfig) -> Self {
        Self { ledger, config }
    }

    pub async fn convert_urls(&mut self, urls: &[String]) -> BatchReport {
        if urls.is_empty() {
            return BatchReport::default();
        }

        let (to_process, skipped) = self.filter_urls(urls);
        if !skipped.is_empty() {
            debug!("Skipping {} already processed URLs: {:?}", skipped.len(), skipped);
        }
        if to_process.is_empty() {
            info!("No new URLs to process");
            return BatchReport {
                skipped: skipped.len(),
                ..Default::default()
            };
        }
        info!("Processing {} new URLs out of {} total", to_process.len(), urls.len());

        let mut report = match self.fetch_and_transform(&to_process).await {
            Ok(pages) => self.classify_and_record(&to_process, pages),
            Err(e) => {
                error!("Batch processing error: {:#}", e);
                BatchReport::default()
            }
        };
        report.skipped = skipped.len();
        report
    }

    /// Split `urls` into (to process, already converted).
    fn filter_urls(&mut self, urls: &[String]) -> (Vec<String>, Vec<String>) {
        urls.iter().cloned().partition(|url| {
            let domain = directory_from_url(url);
            self.ledger.should_process(url, &domain)
        })
    }

    /// Shared fetch + HTML → markdown phase. An `Err` here drops the batch.
    async fn fetch_and_transform(&self, urls: &[String]) -> Result<Vec<Result<String, ConvertError>>> {
        let fetcher = Fetcher::new(&self.config.fetch)?;
        let pages = fetcher.fetch_all(urls).await?;

        if !self.config.continue_on_failure {
            if let Some(err) = pages.iter().find_map(|p| p.as_ref().err()) {
                bail!("aborting batch: {}", err);
            }
        }

        Ok(pages
            .into_iter()
            .map(|page| -> Result<String, ConvertError> {
                Ok(to_markdown(&page?, &self.config.markdown)?)
            })
            .collect())
    }

    /// Classify each transformed page (aligned with `urls`), then persist
    /// every outcome to the ledger.
    pub fn classify_and_record(
        &mut self,
        urls: &[String],
        pages: Vec<Result<String, ConvertError>>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut records = Vec::with_capacity(urls.len());
        let mut rate_limited_urls = Vec::new();
        let mut failed_urls = Vec::new();

        for (url, page) in urls.iter().zip(pages) {
            let domain = directory_from_url(url);
            match page.and_then(|md| self.classify(url, &domain, md)) {
                Ok(Outcome::Converted(doc)) => {
                    records.push(ArticleMetadata::success(url, &domain, &doc.title));
                    report.documents.push(doc);
                }
                Ok(Outcome::RateLimited) => {
                    records.push(ArticleMetadata::error(url, &domain, RATE_LIMITED_MSG, Status::RateLimited));
                    rate_limited_urls.push(url.as_str());
                }
                Err(e) => {
                    error!("Error processing {}: {}", url, e);
                    records.push(ArticleMetadata::error(url, &domain, &e.to_string(), Status::Failed));
                    failed_urls.push(url.as_str());
                }
            }
        }

        report.successful = report.documents.len();
        report.rate_limited = rate_limited_urls.len();
        report.failed = failed_urls.len();
        info!(
            "Processing complete: {} successful, {} rate limited, {} failed",
            report.successful, report.rate_limited, report.failed
        );
        if !rate_limited_urls.is_empty() {
            warn!("Rate limited URLs:");
            for url in &rate_limited_urls {
                warn!("  - {}", url);
            }
        }
        if !failed_urls.is_empty() {
            error!("Failed URLs:");
            for url in &failed_urls {
                error!("  - {}", url);
            }
        }

        for record in records {
            self.ledger.add_or_update(record);
        }
        report
    }

    fn classify(&self, url: &str, domain: &str, markdown: String) -> Result<Outcome, ConvertError> {
        if is_rate_limited(&markdown) {
            return Ok(Outcome::RateLimited);
        }
        let content = unwrap_double_brackets(&markdown);
        let mut title = extract_title(&content, self.config.title_scan_lines);
        if title.is_empty() {
            // no usable text near the top; an empty stem would never be
            // recorded as a success and the URL would be refetched every run
            title = stem_from_url(url);
        }
        if title.is_empty() {
            return Err(ConvertError::EmptyTitle);
        }
        Ok(Outcome::Converted(Document {
            url: url.to_string(),
            content,
            title,
            directory: domain.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve;
    use tempfile::TempDir;

    fn converter(dir: &TempDir, config: PipelineConfig) -> HtmlConverter {
        HtmlConverter::new(MetadataLedger::new(dir.path(), true), config)
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn converted_page_becomes_document() {
        let dir = TempDir::new().unwrap();
        let mut conv = converter(&dir, PipelineConfig::default());
        let input = urls(&["https://www.example.com/post"]);

        let report = conv.classify_and_record(
            &input,
            vec![Ok("# My Article Title\n\nSee [[Docs]](https://example.com/docs)".into())],
        );

        assert_eq!(report.successful, 1);
        let doc = &report.documents[0];
        assert_eq!(doc.title, "my_article_title");
        assert_eq!(doc.directory, "example");
        assert!(doc.content.contains("[Docs](https://example.com/docs)"));

        let rows = conv.ledger.load_records("example").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "my_article_title.md");
        assert_eq!(rows[0].status, Status::Success);
    }

    #[test]
    fn too_many_requests_is_rate_limited() {
        let dir = TempDir::new().unwrap();
        let mut conv = converter(&dir, PipelineConfig::default());
        let input = urls(&["https://www.example.com/busy"]);

        let report = conv.classify_and_record(
            &input,
            vec![Ok("# Oops\n\nToo Many Requests, slow down".into())],
        );

        assert!(report.documents.is_empty());
        assert_eq!(report.rate_limited, 1);
        let rows = conv.ledger.load_records("example").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, Status::RateLimited);
        assert_eq!(rows[0].path, "failed_downloads.md");
        assert_eq!(rows[0].title, "failed_download");
        assert_eq!(rows[0].error_str, RATE_LIMITED_MSG);
    }

    #[test]
    fn per_url_errors_are_isolated() {
        let dir = TempDir::new().unwrap();
        let mut conv = converter(&dir, PipelineConfig::default());
        let input = urls(&["https://example.com/broken", "https://example.com/fine", "not a url"]);

        let report = conv.classify_and_record(
            &input,
            vec![
                Err(ConvertError::Transform(std::io::Error::other("bad html"))),
                Ok("# Fine".into()),
                Ok("!!!\n\n???".into()),
            ],
        );

        assert_eq!((report.successful, report.failed), (1, 2));
        let rows = conv.ledger.load_records("example").unwrap();
        let statuses: Vec<_> = rows.iter().map(|r| r.status).collect();
        assert_eq!(statuses, [Status::Failed, Status::Success]);
        assert!(rows[0].error_str.contains("bad html"));
        // an unparseable URL has an empty domain key
        let rows = conv.ledger.load_records("").unwrap();
        assert_eq!(rows[0].error_str, ConvertError::EmptyTitle.to_string());
    }

    #[test]
    fn untitled_page_named_after_url() {
        let dir = TempDir::new().unwrap();
        let mut conv = converter(&dir, PipelineConfig::default());
        let input = urls(&["https://example.com/notes/release-notes.html"]);

        let report = conv.classify_and_record(&input, vec![Ok("!!!\n\n???".into())]);

        assert_eq!(report.successful, 1);
        assert_eq!(report.documents[0].title, "release_notes");
        assert!(!conv.ledger.should_process(&input[0], "example"));
    }

    #[tokio::test]
    async fn end_to_end_then_skip_on_rerun() {
        let base = serve(vec![
            ("/article", "200 OK", "<html><body><h1>Hello World</h1><p>Body text</p></body></html>"),
            ("/busy", "429 Too Many Requests", "<h1>Too Many Requests</h1>"),
        ])
        .await;
        let dir = TempDir::new().unwrap();
        let input = vec![format!("{base}/article"), format!("{base}/busy")];

        let mut conv = converter(&dir, PipelineConfig::default());
        let report = conv.convert_urls(&input).await;
        assert_eq!((report.successful, report.rate_limited, report.failed), (1, 1, 0));
        assert_eq!(report.documents[0].title, "hello_world");

        // a fresh converter sees the ledger on disk
        let mut again = converter(&dir, PipelineConfig::default());
        let report = again.convert_urls(&input).await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rate_limited, 1);
        assert!(report.documents.is_empty());

        let domain = directory_from_url(&input[0]);
        let rows = again.ledger.load_records(&domain).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn nothing_to_do_when_all_skipped() {
        let dir = TempDir::new().unwrap();
        let mut conv = converter(&dir, PipelineConfig::default());
        // port 9 is never contacted: the ledger already has this URL
        let url = "http://127.0.0.1:9/done";
        conv.ledger.add_or_update(ArticleMetadata::success(url, &directory_from_url(url), "done"));

        let report = conv.convert_urls(&urls(&[url])).await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.successful + report.failed + report.rate_limited, 0);
    }

    #[tokio::test]
    async fn fetch_failure_recorded_or_fatal() {
        let base = serve(vec![("/ok", "200 OK", "<h1>Ok Page</h1>")]).await;
        let input = vec![format!("{base}/ok"), "http://127.0.0.1:1/unreachable".to_string()];

        let dir = TempDir::new().unwrap();
        let mut lenient = converter(&dir, PipelineConfig::default());
        let report = lenient.convert_urls(&input).await;
        assert_eq!((report.successful, report.failed), (1, 1));

        let strict_dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            continue_on_failure: false,
            ..Default::default()
        };
        let mut strict = converter(&strict_dir, config);
        let report = strict.convert_urls(&input).await;
        assert!(report.documents.is_empty());
        assert_eq!(report.failed, 0);
        let domain = directory_from_url(&input[0]);
        assert!(strict.ledger.load_records(&domain).unwrap().is_empty());
    }
}
