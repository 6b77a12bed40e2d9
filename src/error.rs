use std::path::PathBuf;
use thiserror::Error;

/// Failure to retrieve one page from the classifieds site
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. } => url,
            FetchError::Status { url, .. } => url,
        }
    }
}

/// Only the first result page is fatal for a crawl
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("first result page could not be fetched: {0}")]
    FirstPage(#[source] FetchError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReferenceDataError {
    #[error("failed to open reference table {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed reference row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: csv::Error,
    },
}
