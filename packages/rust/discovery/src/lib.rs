//! Source discovery: turn a topic into a deduplicated set of candidate URLs.
//!
//! Several search queries are built from the subject and its parent subject
//! ([`build_queries`]), each is sent to a [`SearchProvider`], and the results
//! are merged in first-seen order. A failing query contributes nothing; the
//! discovery step itself never fails.

mod duckduckgo;
mod query;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use tracing::{debug, info, instrument, warn};
use url::Url;

use topicdoc_shared::{SourceSet, TopicContext};

pub use duckduckgo::DuckDuckGoSearch;
pub use query::{build_queries, general_query};

// ---------------------------------------------------------------------------
// Search provider seam
// ---------------------------------------------------------------------------

/// A failed search request. Absorbed by [`Discovery`], never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("search '{query}' failed: {message}")]
    Http { query: String, message: String },

    #[error("search '{query}' returned HTTP {status}")]
    Status { query: String, status: u16 },
}

/// External web search capability.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Return up to `num_results` result URLs for `query`, best first.
    async fn search(&self, query: &str, num_results: usize)
    -> Result<Vec<Url>, DiscoveryError>;
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Multi-query source discovery over a shared [`SearchProvider`].
#[derive(Clone)]
pub struct Discovery {
    provider: Arc<dyn SearchProvider>,
}

impl Discovery {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Discover up to `n` URLs per query for `ctx`.
    ///
    /// The result holds at most `4 * n` URLs, with no duplicates, ordered by
    /// first appearance across the queries.
    #[instrument(skip_all, fields(subject = %ctx.subject(), parent = ?ctx.parent_subject(), n = n))]
    pub async fn discover_sources(&self, ctx: &TopicContext, n: usize) -> SourceSet {
        self.discover(ctx, None, n).await
    }

    /// Like [`discover_sources`](Self::discover_sources) with `question`
    /// appended to every query.
    #[instrument(skip_all, fields(subject = %ctx.subject(), n = n))]
    pub async fn discover_for_question(
        &self,
        ctx: &TopicContext,
        question: &str,
        n: usize,
    ) -> SourceSet {
        self.discover(ctx, Some(question), n).await
    }

    /// Run one query, returning at most `n` URLs. Failures yield an empty list.
    pub async fn search(&self, query: &str, n: usize) -> Vec<Url> {
        if n == 0 {
            return Vec::new();
        }
        match self.provider.search(query, n).await {
            Ok(mut urls) => {
                urls.truncate(n);
                debug!(query, found = urls.len(), "query complete");
                urls
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "search failed, continuing without results");
                Vec::new()
            }
        }
    }

    async fn discover(&self, ctx: &TopicContext, question: Option<&str>, n: usize) -> SourceSet {
        let year = chrono::Utc::now().year();
        let queries = build_queries(ctx, question, year);

        let mut sources = SourceSet::new();
        for query in &queries {
            let urls = self.search(query, n).await;
            sources.extend(urls);
        }

        info!(
            queries = queries.len(),
            sources = sources.len(),
            "discovery complete"
        );
        sources
    }
}
