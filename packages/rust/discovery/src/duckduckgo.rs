//! DuckDuckGo HTML endpoint search backend.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use topicdoc_shared::{Result, SearchConfig, TopicDocError};

use crate::{DiscoveryError, SearchProvider};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("TopicDoc/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow for a results page.
const MAX_REDIRECTS: usize = 3;

/// Scrapes the no-JavaScript results page at `{base_url}/html/`.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TopicDocError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    #[instrument(skip(self), fields(provider = "duckduckgo"))]
    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> std::result::Result<Vec<Url>, DiscoveryError> {
        let endpoint = format!("{}/html/", self.base_url);
        let response = self
            .client
            .get(&endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| DiscoveryError::Http {
                query: query.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                query: query.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| DiscoveryError::Http {
            query: query.to_string(),
            message: format!("failed to read body: {e}"),
        })?;

        let urls = parse_results(&body, num_results);
        debug!(found = urls.len(), "search results parsed");
        Ok(urls)
    }
}

// ---------------------------------------------------------------------------
// Result parsing
// ---------------------------------------------------------------------------

/// Pull up to `limit` unique result URLs out of a results page.
fn parse_results(html: &str, limit: usize) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a.result__a") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    doc.select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(decode_result_href)
        .filter(|url| seen.insert(url.to_string()))
        .take(limit)
        .collect()
}

/// Resolve a result anchor to its target, unwrapping `/l/?uddg=` redirects
/// and rejecting ads and non-web targets.
fn decode_result_href(href: &str) -> Option<Url> {
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let url = base.join(href).ok()?;

    let target = if is_duckduckgo_host(&url) {
        if url.path() != "/l/" {
            return None;
        }
        let (_, uddg) = url.query_pairs().find(|(k, _)| k == "uddg")?;
        Url::parse(&uddg).ok()?
    } else {
        url
    };

    let web = matches!(target.scheme(), "http" | "https");
    (web && !is_duckduckgo_host(&target)).then_some(target)
}

fn is_duckduckgo_host(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"<html><body>
        <div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdocs.example.com%2Fguide&amp;rut=abc">Guide</a></div>
        <div class="result"><a class="result__a" href="https://duckduckgo.com/y.js?ad_provider=x">Ad</a></div>
        <div class="result"><a class="result__a" href="https://blog.example.org/post">Post</a></div>
        <div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdocs.example.com%2Fguide">Dup</a></div>
        <div class="result"><a class="result__a" href="javascript:void(0)">Bad</a></div>
        <div class="result"><a class="result__a" href="https://third.example.net/">Third</a></div>
    </body></html>"#;

    #[test]
    fn parses_and_decodes_results() {
        let urls = parse_results(RESULTS_PAGE, 10);
        let got: Vec<&str> = urls.iter().map(Url::as_str).collect();
        assert_eq!(
            got,
            [
                "https://docs.example.com/guide",
                "https://blog.example.org/post",
                "https://third.example.net/",
            ]
        );
    }

    #[test]
    fn respects_limit() {
        assert_eq!(parse_results(RESULTS_PAGE, 2).len(), 2);
    }

    #[test]
    fn empty_page_has_no_results() {
        assert!(parse_results("<html><body>No results.</body></html>", 5).is_empty());
    }

    fn config_for(server: &wiremock::MockServer) -> SearchConfig {
        SearchConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn search_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/html/"))
            .and(wiremock::matchers::query_param("q", "tokio runtime"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new(&config_for(&server)).unwrap();
        let urls = search.search("tokio runtime", 2).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].as_str(), "https://docs.example.com/guide");
    }

    #[tokio::test]
    async fn search_reports_http_status() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/html/"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new(&config_for(&server)).unwrap();
        let err = search.search("anything", 2).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Status { status: 503, .. }));
    }
}
