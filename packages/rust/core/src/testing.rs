//! In-memory collaborators for core tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use topicdoc_crawler::{FetchError, FetchedPage, PageFetcher};
use topicdoc_discovery::{DiscoveryError, SearchProvider};

use crate::llm::{GenerationError, Generator};

type Responder = Box<dyn Fn(&str) -> Result<String, GenerationError> + Send + Sync>;

/// Answers prompts with a closure and records every prompt it saw.
pub struct FakeGenerator {
    respond: Responder,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(
        respond: impl Fn(&str) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.respond)(prompt)
    }
}

/// Serves page text from a map; unknown URLs fail with HTTP 404.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    pub fetched: Mutex<Vec<Url>>,
}

impl FakeFetcher {
    pub fn with_pages(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(u, t)| (u.to_string(), t.to_string()))
                .collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.to_string())
            .collect()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(
        &self,
        url: &Url,
        _timeout: Duration,
        _settle_delay: Duration,
    ) -> Result<FetchedPage, FetchError> {
        self.fetched.lock().unwrap().push(url.clone());
        self.pages
            .get(url.as_str())
            .map(|text| FetchedPage::text(text.clone()))
            .ok_or(FetchError::Status(404))
    }
}

/// Returns URLs for queries containing a key; everything else finds nothing.
#[derive(Default)]
pub struct FakeSearch {
    answers: Vec<(String, Vec<Url>)>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    /// Queries containing `key` return `urls`.
    pub fn answer(mut self, key: &str, urls: &[&str]) -> Self {
        self.answers.push((
            key.to_string(),
            urls.iter().map(|u| Url::parse(u).unwrap()).collect(),
        ));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str, _num_results: usize) -> Result<Vec<Url>, DiscoveryError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self
            .answers
            .iter()
            .filter(|(key, _)| query.contains(key.as_str()))
            .flat_map(|(_, urls)| urls.iter().cloned())
            .collect())
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}
