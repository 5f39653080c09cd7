//! Bounded concurrent fetch of a URL batch.
//!
//! One task per URL, capped by a semaphore, joined in input order. Every
//! failure (network, timeout, panic) is recorded against its own URL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use topicdoc_shared::AppConfig;

use crate::{FetchError, FetchResult, PageFetcher};

/// Headroom on the outer deadline for extraction after the settle delay.
const EXTRACTION_GRACE: Duration = Duration::from_secs(1);

/// Runtime fetch settings, derived from config.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum pages in flight.
    pub concurrency: usize,
    /// Page-load timeout handed to the fetcher.
    pub timeout: Duration,
    /// Pause after load, before extraction.
    pub settle_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.defaults.fetch_concurrency,
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            settle_delay: Duration::from_millis(config.fetch.settle_delay_ms),
        }
    }
}

/// Fans a URL batch out over a shared [`PageFetcher`].
#[derive(Clone)]
pub struct Fetcher {
    fetcher: Arc<dyn PageFetcher>,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, options: FetchOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch every URL and wait for all of them.
    ///
    /// The result has exactly one entry per input URL, in input order, even
    /// when a URL repeats. No failure escapes as an `Err`.
    #[instrument(skip_all, fields(urls = urls.len(), concurrency = self.options.concurrency))]
    pub async fn fetch_all(&self, urls: &[Url]) -> FetchResult {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let timeout = self.options.timeout;
        let settle_delay = self.options.settle_delay;
        // Outer deadline in case a fetcher ignores its own timeout.
        let deadline = timeout + settle_delay + EXTRACTION_GRACE;

        let handles: Vec<_> = urls
            .iter()
            .cloned()
            .map(|url| {
                let sem = semaphore.clone();
                let fetcher = self.fetcher.clone();
                tokio::spawn(async move {
                    let _permit = sem
                        .acquire_owned()
                        .await
                        .map_err(|e| FetchError::Task(e.to_string()))?;

                    debug!(%url, "fetching");
                    tokio::time::timeout(deadline, fetcher.fetch(&url, timeout, settle_delay))
                        .await
                        .unwrap_or(Err(FetchError::Timeout(deadline)))
                })
            })
            .collect();

        let mut result = FetchResult::new();
        for (url, handle) in urls.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(FetchError::Task(e.to_string())),
            };
            if let Err(e) = &outcome {
                warn!(%url, error = %e, "fetch failed");
            }
            result.push(url.clone(), outcome);
        }

        info!(
            fetched = result.success_count(),
            failed = result.len() - result.success_count(),
            elapsed_ms = start.elapsed().as_millis(),
            "fetch batch complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::FetchedPage;

    /// Behaves according to the URL host; tracks peak concurrency.
    #[derive(Default)]
    struct ScriptedFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            url: &Url,
            _timeout: Duration,
            _settle_delay: Duration,
        ) -> Result<FetchedPage, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match url.host_str().unwrap_or_default() {
                "blocked.example" => Err(FetchError::Status(403)),
                "panic.example" => panic!("fetcher bug"),
                "slow.example" => {
                    tokio::time::sleep(Duration::from_millis(430)).await;
                    Ok(FetchedPage::text("extracted late"))
                }
                "hang.example" => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(FetchedPage::text("too late"))
                }
                host => Ok(FetchedPage::text(format!("content of {host}"))),
            }
        }
    }

    fn options(concurrency: usize) -> FetchOptions {
        FetchOptions {
            concurrency,
            timeout: Duration::from_millis(300),
            settle_delay: Duration::ZERO,
        }
    }

    fn urls(list: &[&str]) -> Vec<Url> {
        list.iter().map(|s| Url::parse(s).unwrap()).collect()
    }

    #[tokio::test]
    async fn failing_url_does_not_affect_sibling() {
        let fetcher = Fetcher::new(Arc::new(ScriptedFetcher::default()), options(4));
        let input = urls(&["https://valid.example", "https://blocked.example"]);

        let result = fetcher.fetch_all(&input).await;

        assert_eq!(result.len(), 2);
        let valid = result.get(&input[0]).unwrap().as_ref().unwrap();
        assert_eq!(valid.text, "content of valid.example");
        assert!(matches!(result.get(&input[1]), Some(Err(FetchError::Status(403)))));
    }

    #[tokio::test]
    async fn one_entry_per_input_in_order() {
        let fetcher = Fetcher::new(Arc::new(ScriptedFetcher::default()), options(2));
        let input = urls(&[
            "https://c.example/",
            "https://blocked.example/",
            "https://a.example/",
            "https://c.example/",
            "https://b.example/",
        ]);

        let result = fetcher.fetch_all(&input).await;

        assert_eq!(result.len(), input.len());
        let order: Vec<&Url> = result.urls().collect();
        assert_eq!(order, input.iter().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrency_is_capped() {
        let scripted = Arc::new(ScriptedFetcher::default());
        let fetcher = Fetcher::new(scripted.clone(), options(2));
        let input: Vec<Url> = (0..8)
            .map(|i| Url::parse(&format!("https://site{i}.example/")).unwrap())
            .collect();

        let result = fetcher.fetch_all(&input).await;

        assert_eq!(result.success_count(), 8);
        assert!(scripted.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_fetch_is_isolated() {
        let fetcher = Fetcher::new(Arc::new(ScriptedFetcher::default()), options(4));
        let input = urls(&["https://panic.example/", "https://fine.example/"]);

        let result = fetcher.fetch_all(&input).await;

        assert!(matches!(result.get(&input[0]), Some(Err(FetchError::Task(_)))));
        assert!(result.get(&input[1]).unwrap().is_ok());
    }

    #[tokio::test]
    async fn hung_fetch_hits_outer_deadline() {
        let fetcher = Fetcher::new(Arc::new(ScriptedFetcher::default()), options(4));
        let input = urls(&["https://hang.example/", "https://fine.example/"]);

        let result = fetcher.fetch_all(&input).await;

        assert!(matches!(result.get(&input[0]), Some(Err(FetchError::Timeout(_)))));
        assert!(result.get(&input[1]).unwrap().is_ok());
    }

    #[tokio::test]
    async fn extraction_past_load_timeout_is_not_a_timeout() {
        let fetcher = Fetcher::new(Arc::new(ScriptedFetcher::default()), options(2));
        let input = urls(&["https://slow.example/"]);

        let result = fetcher.fetch_all(&input).await;

        let page = result.get(&input[0]).unwrap().as_ref().unwrap();
        assert_eq!(page.text, "extracted late");
    }

    #[tokio::test]
    async fn empty_batch() {
        let fetcher = Fetcher::new(Arc::new(ScriptedFetcher::default()), options(4));
        assert!(fetcher.fetch_all(&[]).await.is_empty());
    }
}
