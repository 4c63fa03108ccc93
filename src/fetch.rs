use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{redirect::Policy, Client};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::settings::DEFAULT_USER_AGENT;

pub const CONCURRENCY: usize = 10;
pub const TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch of {0} was cancelled")]
    Cancelled(String),
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: CONCURRENCY,
            timeout: Duration::from_secs(TIMEOUT_SECS),
        }
    }
}

pub struct Fetcher {
    http: Client,
    concurrency: usize,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            concurrency: config.concurrency.max(1),
        })
    }

    /// Fetch every URL concurrently. The returned bodies line up with `urls`.
    ///
    /// Per-URL failures come back as `Err` entries; the outer error means the
    /// batch itself broke (a task panicked or was aborted).
    pub async fn fetch_all(&self, urls: &[String]) -> Result<Vec<Result<String, FetchError>>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let pb = ProgressBar::new(urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        let handles: Vec<_> = urls
            .iter()
            .cloned()
            .map(|url| {
                let http = self.http.clone();
                let sem = Arc::clone(&semaphore);
                let pb = pb.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return Err(FetchError::Cancelled(url));
                    };
                    let result = fetch_one(&http, &url).await;
                    pb.inc(1);
                    result
                })
            })
            .collect();

        let mut pages = Vec::with_capacity(handles.len());
        for handle in handles {
            pages.push(handle.await.context("Fetch task did not complete")?);
        }

        pb.finish_and_clear();
        let ok = pages.iter().filter(|p| p.is_ok()).count();
        info!("Fetched {} pages ({} ok, {} errors)", pages.len(), ok, pages.len() - ok);
        Ok(pages)
    }
}

/// GET one page. The body is returned whatever the status code, since
/// throttling pages are recognised by their text later on.
async fn fetch_one(http: &Client, url: &str) -> Result<String, FetchError> {
    let request_err = |source| FetchError::Request {
        url: url.to_string(),
        source,
    };
    let res = http.get(url).send().await.map_err(request_err)?;
    let status = res.status();
    if !status.is_success() {
        debug!(%url, status = status.as_u16(), "non-success response, keeping body");
    }
    res.text().await.map_err(request_err)
}
