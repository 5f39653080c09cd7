//! Concurrent page fetching and readable-text extraction.
//!
//! - [`PageFetcher`]: fetch one URL and return its readable text
//! - [`HttpFetcher`]: the reqwest-backed implementation
//! - [`Fetcher`]: bounded fan-out over a batch, yielding a [`FetchResult`]

mod engine;
mod http;
mod result;

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

pub use engine::{FetchOptions, Fetcher};
pub use http::HttpFetcher;
pub use result::{FetchEntry, FetchResult, FetchedPage};

/// Why a single URL produced no content.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("body too large ({0} bytes)")]
    TooLarge(u64),

    #[error("page has no readable content")]
    EmptyContent,

    #[error("extraction failed: {0}")]
    Extract(String),

    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Load one page and extract its readable text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        timeout: Duration,
        settle_delay: Duration,
    ) -> Result<FetchedPage, FetchError>;
}
