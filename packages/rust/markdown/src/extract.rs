//! Readable-text extraction from fetched HTML pages.

use scraper::{Html, Selector};
use tracing::{debug, instrument};

use topicdoc_shared::{Result, TopicDocError};

use crate::cleanup;

/// Tags whose content never carries article text.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "svg", "form",
    "button",
];

/// Content containers tried in priority order before falling back to `<body>`.
const CONTENT_SELECTORS: &[&str] = &[
    "article .markdown",
    ".vp-doc",
    ".markdown-section",
    "[role=\"main\"]",
    "article",
    "main",
    "#content",
    ".content",
];

/// Readable content pulled out of an HTML page.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// Page title from `<title>` or the first `<h1>`, if any.
    pub title: Option<String>,
    /// Cleaned Markdown body.
    pub markdown: String,
}

/// Convert an HTML page to cleaned Markdown suitable for a model prompt.
///
/// Picks the most specific content container, converts it with `htmd`
/// (dropping page chrome), then runs the cleanup passes.
#[instrument(skip_all, fields(html_len = html.len()))]
pub fn html_to_markdown(html: &str) -> Result<ExtractedPage> {
    let doc = Html::parse_document(html);
    let title = extract_title(&doc);
    let content_html = select_content_html(&doc).unwrap_or_else(|| html.to_string());

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    let raw = converter
        .convert(&content_html)
        .map_err(|e| TopicDocError::parse(format!("html to markdown failed: {e}")))?;

    let markdown = cleanup::run_pipeline(&raw);
    debug!(raw_len = raw.len(), cleaned_len = markdown.len(), "page converted");

    Ok(ExtractedPage { title, markdown })
}

fn select_content_html(doc: &Html) -> Option<String> {
    CONTENT_SELECTORS
        .iter()
        .chain(std::iter::once(&"body"))
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| doc.select(&sel).next().map(|el| el.inner_html()))
}

fn extract_title(doc: &Html) -> Option<String> {
    ["title", "h1"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            doc.select(&sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        })
}
