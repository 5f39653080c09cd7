//! Per-URL fetch outcomes.

use url::Url;

use crate::FetchError;

/// Readable text extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub text: String,
    pub title: Option<String>,
    pub status_code: Option<u16>,
}

impl FetchedPage {
    /// A page with only text, as produced by non-HTTP fetchers.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            status_code: None,
        }
    }
}

/// One input URL and what happened when it was fetched.
#[derive(Debug, Clone)]
pub struct FetchEntry {
    pub url: Url,
    pub outcome: Result<FetchedPage, FetchError>,
}

/// Exactly one entry per fetched URL, in input order.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    entries: Vec<FetchEntry>,
}

impl FetchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<FetchEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, url: Url, outcome: Result<FetchedPage, FetchError>) {
        self.entries.push(FetchEntry { url, outcome });
    }

    /// Append another batch after this one.
    pub fn merge(&mut self, other: FetchResult) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FetchEntry> {
        self.entries.iter()
    }

    /// The first entry recorded for `url`.
    pub fn get(&self, url: &Url) -> Option<&Result<FetchedPage, FetchError>> {
        self.entries.iter().find(|e| &e.url == url).map(|e| &e.outcome)
    }

    /// Successful pages in input order.
    pub fn successes(&self) -> impl Iterator<Item = (&Url, &FetchedPage)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().ok().map(|page| (&e.url, page)))
    }

    /// Failed URLs in input order.
    pub fn errors(&self) -> impl Iterator<Item = (&Url, &FetchError)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().err().map(|err| (&e.url, err)))
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    /// Every URL in this result, in order.
    pub fn urls(&self) -> impl Iterator<Item = &Url> {
        self.entries.iter().map(|e| &e.url)
    }
}

impl<'a> IntoIterator for &'a FetchResult {
    type Item = &'a FetchEntry;
    type IntoIter = std::slice::Iter<'a, FetchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
