//! Top-level error type for a crawl run.
//!
//! Only configuration problems and failures to durably record progress end a
//! run with an error. Per-article fetch failures never reach this type; they
//! are folded into the scan's miss accounting instead.

use crate::cursor::CursorError;
use crate::outputs::FeedError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Feed(#[from] FeedError),
}

pub type CrawlResult<T> = Result<T, CrawlError>;
