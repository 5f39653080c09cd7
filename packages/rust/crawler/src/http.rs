//! HTTP page fetcher with readable-text extraction and SSRF protection.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::{Host, Url};

use topicdoc_shared::{FetchConfig, Result, TopicDocError};

use crate::{FetchError, FetchedPage, PageFetcher};

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("TopicDoc/", env!("CARGO_PKG_VERSION"));

/// Largest body accepted (10 MB).
const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Fetches pages over HTTP(S) and converts HTML to Markdown.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    /// Allow loopback/private targets (local mirrors, mock servers).
    allow_private_hosts: bool,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| TopicDocError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_private_hosts: config.allow_private_hosts,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(
        &self,
        url: &Url,
        timeout: Duration,
        settle_delay: Duration,
    ) -> std::result::Result<FetchedPage, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::Blocked(format!("unsupported scheme '{}'", url.scheme())));
        }
        if !self.allow_private_hosts && is_private_target(url) {
            return Err(FetchError::Blocked("private or loopback host".into()));
        }

        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if let Some(len) = response.content_length() {
            if len > MAX_BODY_BYTES {
                return Err(FetchError::TooLarge(len));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();

        let body = response.text().await.map_err(|e| classify(e, timeout))?;
        if body.len() as u64 > MAX_BODY_BYTES {
            return Err(FetchError::TooLarge(body.len() as u64));
        }

        if !settle_delay.is_zero() {
            tokio::time::sleep(settle_delay).await;
        }

        let (title, text) = if is_plain_text(&content_type) {
            (None, body.trim().to_string())
        } else {
            let page = topicdoc_markdown::html_to_markdown(&body)
                .map_err(|e| FetchError::Extract(e.to_string()))?;
            (page.title, page.markdown)
        };

        if text.trim().is_empty() {
            return Err(FetchError::EmptyContent);
        }

        debug!(status = status.as_u16(), chars = text.chars().count(), "page extracted");
        Ok(FetchedPage {
            text,
            title,
            status_code: Some(status.as_u16()),
        })
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Network(err.to_string())
    }
}

fn is_plain_text(content_type: &str) -> bool {
    content_type.starts_with("text/plain") || content_type.starts_with("text/markdown")
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Whether a URL points at a loopback, private, or local-only host.
pub(crate) fn is_private_target(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(Host::Domain(host)) => {
            let host = host.to_ascii_lowercase();
            host == "localhost"
                || host.ends_with(".localhost")
                || host.ends_with(".local")
                || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 carrier-grade NAT
                || (a == 100 && (b & 0xC0) == 64)
                // 192.0.0.0/24
                || (a == 192 && b == 0 && c == 0)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link local
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}
