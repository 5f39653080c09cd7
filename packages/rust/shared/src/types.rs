//! Core domain types for TopicDoc runs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, TopicDocError};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TopicContext
// ---------------------------------------------------------------------------

/// The subject being documented, optionally scoped by an enclosing subject.
///
/// Immutable once built. A blank parent is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicContext {
    subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_subject: Option<String>,
}

impl TopicContext {
    /// Build a context, rejecting an empty subject.
    pub fn new(subject: impl Into<String>, parent_subject: Option<&str>) -> Result<Self> {
        let subject = subject.into().trim().to_string();
        if subject.is_empty() {
            return Err(TopicDocError::validation("subject must not be empty"));
        }
        let parent_subject = parent_subject
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);

        Ok(Self {
            subject,
            parent_subject,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn parent_subject(&self) -> Option<&str> {
        self.parent_subject.as_deref()
    }

    /// Human-readable label: `"subject"` or `"subject in parent"`.
    pub fn label(&self) -> String {
        match &self.parent_subject {
            Some(parent) => format!("{} in {parent}", self.subject),
            None => self.subject.clone(),
        }
    }
}

impl std::fmt::Display for TopicContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

// ---------------------------------------------------------------------------
// SourceSet
// ---------------------------------------------------------------------------

/// Ordered set of unique candidate URLs.
///
/// Insertion order is preserved and the first occurrence wins. Two URLs that
/// differ only by fragment are the same source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSet {
    urls: Vec<Url>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a URL. Returns `false` when an equivalent URL is already present.
    pub fn insert(&mut self, url: Url) -> bool {
        let mut url = url;
        url.set_fragment(None);
        if !self.seen.insert(url.as_str().to_string()) {
            return false;
        }
        self.urls.push(url);
        true
    }

    /// Whether an equivalent URL is already present.
    pub fn contains(&self, url: &Url) -> bool {
        let mut url = url.clone();
        url.set_fragment(None);
        self.seen.contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Url> {
        self.urls.iter()
    }

    pub fn as_slice(&self) -> &[Url] {
        &self.urls
    }

    pub fn into_vec(self) -> Vec<Url> {
        self.urls
    }
}

impl Extend<Url> for SourceSet {
    fn extend<T: IntoIterator<Item = Url>>(&mut self, iter: T) {
        for url in iter {
            self.insert(url);
        }
    }
}

impl FromIterator<Url> for SourceSet {
    fn from_iter<T: IntoIterator<Item = Url>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a SourceSet {
    type Item = &'a Url;
    type IntoIter = std::slice::Iter<'a, Url>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.iter()
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// The final, normalized document handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(String);

impl Artifact {
    /// Wrap already-normalized text.
    pub fn from_normalized(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Artifact {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// TopicOutline
// ---------------------------------------------------------------------------

/// One topic of a lesson outline with its ordered subtopics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicOutline {
    pub topic: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
}
