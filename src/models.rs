use std::fmt;

use serde::{Deserialize, Serialize};

pub const FAILED_PATH: &str = "failed_downloads.md";
pub const FAILED_TITLE: &str = "failed_download";

/// A converted page, ready to be written to `<directory>/<title>.md`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub url: String,
    pub content: String,
    pub title: String,
    pub directory: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failed,
    RateLimited,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Success => "success",
            Status::Failed => "failed",
            Status::RateLimited => "rate_limited",
        };
        f.write_str(s)
    }
}

/// One row of a domain's `meta.csv`. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub path: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub status: Status,
    #[serde(default)]
    pub error_str: String,
}

impl ArticleMetadata {
    pub fn success(url: &str, domain: &str, title: &str) -> Self {
        Self {
            path: format!("{}.md", title),
            title: title.to_string(),
            url: url.to_string(),
            domain: domain.to_string(),
            status: Status::Success,
            error_str: String::new(),
        }
    }

    /// Record for a URL that produced no document.
    pub fn error(url: &str, domain: &str, error: &str, status: Status) -> Self {
        Self {
            path: FAILED_PATH.to_string(),
            title: FAILED_TITLE.to_string(),
            url: url.to_string(),
            domain: domain.to_string(),
            status,
            error_str: error.to_string(),
        }
    }
}
