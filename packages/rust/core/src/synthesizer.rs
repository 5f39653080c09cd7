//! Document synthesis with a knowledge-only fallback.
//!
//! Two states:
//!
//! - **Grounded**: the aggregated fetched content meets `min_grounding_chars`,
//!   and the prompt tells the model to rely on it.
//! - **Knowledge-only**: too little content, so the model writes from what it
//!   knows without claiming fresh sources.
//!
//! Either way the returned document starts with the metadata header, so it is
//! never empty. A failed generation call is fatal and comes back as a
//! [`SynthesisError`]; nothing is retried here.
//!
//! Multi-topic lessons go through [`Synthesizer::synthesize_outline`], which
//! first narrows every page to each subtopic with one extraction call per page.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use topicdoc_crawler::FetchResult;
use topicdoc_markdown::{
    DOCUMENT_FENCE_MARKERS, normalize, normalize_text, prepend_front_matter, unwrap_fence,
};
use topicdoc_shared::{AppConfig, Artifact, TopicContext, TopicDocError, TopicOutline};

use crate::llm::{GenerationError, Generator};
use crate::prompts;

// ---------------------------------------------------------------------------
// Config and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Aggregate size (chars, trimmed) needed for the grounded state.
    pub min_grounding_chars: usize,
    /// A subtopic escalates to knowledge-only at or below this many fragment chars.
    pub min_fragment_chars: usize,
    /// Per-page cap before aggregation.
    pub max_source_chars: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SynthesisConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_grounding_chars: config.defaults.min_grounding_chars,
            min_fragment_chars: config.defaults.min_fragment_chars,
            max_source_chars: config.defaults.max_source_chars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesisMode {
    Grounded,
    KnowledgeOnly,
}

impl fmt::Display for SynthesisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grounded => "grounded",
            Self::KnowledgeOnly => "knowledge-only",
        })
    }
}

/// Raw (not yet normalized) synthesis output.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisOutcome {
    pub document: String,
    pub sources_used: Vec<Url>,
    pub used_fallback_knowledge: bool,
    pub currency_known: bool,
}

impl SynthesisOutcome {
    pub fn mode(&self) -> SynthesisMode {
        if self.used_fallback_knowledge {
            SynthesisMode::KnowledgeOnly
        } else {
            SynthesisMode::Grounded
        }
    }
}

/// The top-level generation call failed.
#[derive(Debug, thiserror::Error)]
#[error("synthesis of '{subject}' failed ({mode}): {source}")]
pub struct SynthesisError {
    pub subject: String,
    pub mode: SynthesisMode,
    #[source]
    pub source: GenerationError,
}

impl From<SynthesisError> for TopicDocError {
    fn from(err: SynthesisError) -> Self {
        TopicDocError::Synthesis {
            subject: err.subject,
            mode: err.mode.to_string(),
            message: err.source.to_string(),
        }
    }
}

/// One subtopic document of a lesson.
#[derive(Debug, Clone, Serialize)]
pub struct LessonSection {
    pub subtopic: String,
    pub document: Artifact,
    pub used_fallback_knowledge: bool,
    pub fragments_used: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonTopic {
    pub topic: String,
    pub sections: Vec<LessonSection>,
}

/// Ordered lesson: one heading per topic, one document per subtopic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LessonPlan {
    pub topics: Vec<LessonTopic>,
}

impl LessonPlan {
    pub fn section_count(&self) -> usize {
        self.topics.iter().map(|t| t.sections.len()).sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# Lesson Plan\n\n");
        for topic in &self.topics {
            out.push_str(&format!("## {}\n\n", topic.topic));
            for section in &topic.sections {
                out.push_str(section.document.as_str());
                out.push('\n');
            }
        }
        out
    }
}

impl fmt::Display for LessonPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Successful pages rendered for a prompt, plus the URLs that made it in.
#[derive(Debug, Clone, Default)]
pub(crate) struct Aggregate {
    pub text: String,
    pub sources: Vec<Url>,
}

impl Aggregate {
    /// Build from successful entries, in order, skipping identical page texts.
    pub fn from_result(result: &FetchResult, max_source_chars: usize) -> Self {
        let mut seen: HashSet<[u8; 32]> = HashSet::new();
        let mut agg = Self::default();

        for (url, page) in result.successes() {
            let text = page.text.trim();
            if text.is_empty() {
                continue;
            }
            let digest: [u8; 32] = Sha256::digest(text.as_bytes()).into();
            if !seen.insert(digest) {
                debug!(%url, "duplicate page content skipped");
                continue;
            }
            agg.text.push_str(&format!(
                "Content from {url}:\n{}\n\n",
                truncate_chars(text, max_source_chars)
            ));
            agg.sources.push(url.clone());
        }
        agg
    }

    pub fn char_count(&self) -> usize {
        self.text.trim().chars().count()
    }

    /// Non-empty and at least `min_chars` long.
    pub fn is_sufficient(&self, min_chars: usize) -> bool {
        let count = self.char_count();
        count > 0 && count >= min_chars
    }
}

/// Longest prefix of `s` with at most `max` chars.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>, config: SynthesisConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Synthesize a document from whatever `content` holds.
    pub async fn synthesize(
        &self,
        ctx: &TopicContext,
        content: &FetchResult,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        self.synthesize_with_currency(ctx, content, false).await
    }

    /// [`synthesize`](Self::synthesize), recording the oracle verdict.
    #[instrument(skip_all, fields(subject = %ctx.subject(), pages = content.len()))]
    pub async fn synthesize_with_currency(
        &self,
        ctx: &TopicContext,
        content: &FetchResult,
        currency_known: bool,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        let agg = Aggregate::from_result(content, self.config.max_source_chars);
        let grounded = agg.is_sufficient(self.config.min_grounding_chars);
        if !grounded && agg.char_count() > 0 {
            debug!(
                chars = agg.char_count(),
                min = self.config.min_grounding_chars,
                "aggregated content below threshold"
            );
        }

        let sources = grounded.then_some(agg.text.as_str());
        let document = self.generate_document(ctx, sources).await?;

        let outcome = SynthesisOutcome {
            document,
            sources_used: if grounded { agg.sources } else { Vec::new() },
            used_fallback_knowledge: !grounded,
            currency_known,
        };
        info!(
            mode = %outcome.mode(),
            sources = outcome.sources_used.len(),
            "document synthesized"
        );
        Ok(outcome)
    }

    /// Build a lesson from an outline, narrowing every page per subtopic.
    ///
    /// Failed extractions are skipped. A subtopic whose fragments total at most
    /// `min_fragment_chars` is written from model knowledge.
    #[instrument(skip_all, fields(topics = outline.len(), pages = content.len()))]
    pub async fn synthesize_outline(
        &self,
        outline: &[TopicOutline],
        content: &FetchResult,
    ) -> Result<LessonPlan, SynthesisError> {
        let mut plan = LessonPlan::default();

        for entry in outline {
            let mut lesson_topic = LessonTopic {
                topic: entry.topic.clone(),
                sections: Vec::new(),
            };

            for subtopic in &entry.subtopics {
                let Ok(ctx) = TopicContext::new(subtopic.as_str(), Some(entry.topic.as_str())) else {
                    warn!(topic = %entry.topic, "blank subtopic skipped");
                    continue;
                };
                lesson_topic.sections.push(self.synthesize_subtopic(&ctx, content).await?);
            }
            plan.topics.push(lesson_topic);
        }

        info!(sections = plan.section_count(), "lesson synthesized");
        Ok(plan)
    }

    async fn synthesize_subtopic(
        &self,
        ctx: &TopicContext,
        content: &FetchResult,
    ) -> Result<LessonSection, SynthesisError> {
        let topic = ctx.parent_subject().unwrap_or_default();
        let mut fragments = String::new();
        let mut used = 0;

        for (url, page) in content.successes() {
            let page_text = truncate_chars(page.text.trim(), self.config.max_source_chars);
            let prompt = prompts::fragment_extraction(topic, ctx.subject(), page_text);
            match self.generator.generate(&prompt).await {
                Ok(raw) => {
                    let fragment = normalize_text(&raw);
                    if !fragment.trim().is_empty() {
                        fragments.push_str(&fragment);
                        fragments.push('\n');
                        used += 1;
                    }
                }
                Err(e) => {
                    warn!(%url, subtopic = %ctx.subject(), error = %e, "fragment extraction failed, skipping");
                }
            }
        }

        let total = fragments.trim().chars().count();
        let grounded = total > 0 && total > self.config.min_fragment_chars;
        if !grounded {
            debug!(subtopic = %ctx.subject(), total, "no usable fragments, escalating to model knowledge");
        }

        let document = self
            .generate_document(ctx, grounded.then_some(fragments.as_str()))
            .await?;

        Ok(LessonSection {
            subtopic: ctx.subject().to_string(),
            document: normalize(&document),
            used_fallback_knowledge: !grounded,
            fragments_used: if grounded { used } else { 0 },
        })
    }

    /// One generation call; fence-unwrapped, header guaranteed.
    async fn generate_document(
        &self,
        ctx: &TopicContext,
        sources: Option<&str>,
    ) -> Result<String, SynthesisError> {
        let header = prompts::front_matter(ctx, chrono::Local::now().date_naive());
        let (mode, prompt) = match sources {
            Some(text) => (
                SynthesisMode::Grounded,
                prompts::grounded_document(ctx, &header, text),
            ),
            None => (
                SynthesisMode::KnowledgeOnly,
                prompts::knowledge_document(ctx, &header),
            ),
        };

        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|source| SynthesisError {
                subject: ctx.subject().to_string(),
                mode,
                source,
            })?;

        let body = unwrap_fence(&raw, DOCUMENT_FENCE_MARKERS).unwrap_or(&raw);
        Ok(prepend_front_matter(&header, body))
    }
}

#[cfg(test)]
mod tests {
    use topicdoc_crawler::{FetchError, FetchedPage};

    use super::*;
    use crate::testing::{FakeGenerator, url};

    fn config() -> SynthesisConfig {
        SynthesisConfig {
            min_grounding_chars: 50,
            min_fragment_chars: 0,
            max_source_chars: 12_000,
        }
    }

    fn synthesizer(generator: Arc<FakeGenerator>) -> Synthesizer {
        Synthesizer::new(generator, config())
    }

    fn long_text(tag: &str) -> String {
        format!("{tag} ").repeat(40)
    }

    #[test]
    fn aggregate_skips_failures_and_duplicates() {
        let mut result = FetchResult::new();
        result.push(url("https://a.example/"), Ok(FetchedPage::text("same body")));
        result.push(url("https://b.example/"), Err(FetchError::Status(500)));
        result.push(url("https://c.example/"), Ok(FetchedPage::text("  same body\n")));
        result.push(url("https://d.example/"), Ok(FetchedPage::text("other")));

        let agg = Aggregate::from_result(&result, 100);
        assert_eq!(
            agg.text,
            "Content from https://a.example/:\nsame body\n\n\
             Content from https://d.example/:\nother\n\n"
        );
        let sources: Vec<&str> = agg.sources.iter().map(Url::as_str).collect();
        assert_eq!(sources, ["https://a.example/", "https://d.example/"]);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("日本語", 5), "日本語");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn empty_aggregate_is_never_sufficient() {
        assert!(!Aggregate::default().is_sufficient(0));
    }

    #[tokio::test]
    async fn all_failures_still_yield_a_document() {
        let generator = Arc::new(FakeGenerator::new(|_| Ok("# Tokio\n\nFrom memory.".into())));
        let mut result = FetchResult::new();
        result.push(url("https://a.example/"), Err(FetchError::Timeout(std::time::Duration::from_secs(30))));
        result.push(url("https://b.example/"), Err(FetchError::Blocked("private".into())));

        let ctx = TopicContext::new("Tokio", None).unwrap();
        let outcome = synthesizer(generator.clone()).synthesize(&ctx, &result).await.unwrap();

        assert!(outcome.used_fallback_knowledge);
        assert!(!outcome.currency_known);
        assert!(outcome.sources_used.is_empty());
        assert!(outcome.document.starts_with("---\ntitle: \"Tokio\"\n"));
        assert!(outcome.document.contains("From memory."));
        assert_eq!(generator.count_containing("No reference material is available"), 1);
    }

    #[tokio::test]
    async fn sufficient_content_is_grounded() {
        let generator = Arc::new(FakeGenerator::new(|_| {
            Ok("---\ntitle: \"Binary Search\"\n---\n\n# Binary Search\n".into())
        }));
        let mut result = FetchResult::new();
        result.push(url("https://a.example/"), Ok(FetchedPage::text(long_text("halving"))));

        let ctx = TopicContext::new("Binary Search", Some("Algorithms")).unwrap();
        let outcome = synthesizer(generator.clone())
            .synthesize_with_currency(&ctx, &result, true)
            .await
            .unwrap();

        assert!(!outcome.used_fallback_knowledge);
        assert!(outcome.currency_known);
        assert_eq!(outcome.sources_used, [url("https://a.example/")]);
        assert_eq!(outcome.document.matches("---").count(), 2);
        let prompts = generator.prompts();
        assert!(prompts[0].contains("Content from https://a.example/:"));
        assert!(prompts[0].contains("Algorithms"));
    }

    #[tokio::test]
    async fn thin_content_falls_back_to_knowledge() {
        let generator = Arc::new(FakeGenerator::new(|_| Ok("body".into())));
        let mut result = FetchResult::new();
        result.push(url("https://a.example/"), Ok(FetchedPage::text("tiny")));

        let ctx = TopicContext::new("Tokio", None).unwrap();
        let outcome = synthesizer(generator).synthesize(&ctx, &result).await.unwrap();
        assert!(outcome.used_fallback_knowledge);
        assert!(outcome.sources_used.is_empty());
    }

    #[tokio::test]
    async fn fenced_output_is_unwrapped_before_header_check() {
        let generator = Arc::new(FakeGenerator::new(|_| {
            Ok("```mdx\n---\ntitle: \"X\"\n---\n\n# X\n```".into())
        }));
        let ctx = TopicContext::new("X", None).unwrap();
        let outcome = synthesizer(generator)
            .synthesize(&ctx, &FetchResult::new())
            .await
            .unwrap();
        assert_eq!(outcome.document, "---\ntitle: \"X\"\n---\n\n# X");
    }

    #[tokio::test]
    async fn leading_rule_without_metadata_still_gets_header() {
        let generator = Arc::new(FakeGenerator::new(|_| Ok("---\n\n# Tokio\n\nBody text.".into())));
        let ctx = TopicContext::new("Tokio", None).unwrap();
        let outcome = synthesizer(generator)
            .synthesize(&ctx, &FetchResult::new())
            .await
            .unwrap();

        let doc = normalize(&outcome.document);
        assert!(doc.as_str().starts_with("---\ntitle: \"Tokio\""));
        assert!(doc.as_str().ends_with("# Tokio\n\nBody text.\n"));
    }

    #[tokio::test]
    async fn generation_failure_is_a_typed_error() {
        let generator = Arc::new(FakeGenerator::new(|_| {
            Err(GenerationError::Status {
                status: 503,
                body: "overloaded".into(),
            })
        }));
        let ctx = TopicContext::new("Tokio", None).unwrap();
        let err = synthesizer(generator)
            .synthesize(&ctx, &FetchResult::new())
            .await
            .unwrap_err();

        assert_eq!(err.subject, "Tokio");
        assert_eq!(err.mode, SynthesisMode::KnowledgeOnly);
        let top: TopicDocError = err.into();
        assert!(matches!(top, TopicDocError::Synthesis { ref mode, .. } if mode == "knowledge-only"));
    }

    #[tokio::test]
    async fn outline_extracts_fragments_per_page_and_escalates_empty_subtopics() {
        let generator = Arc::new(FakeGenerator::new(|prompt| {
            if prompt.starts_with("Extract") {
                if prompt.contains("subtopic \"Ownership\"") && prompt.contains("borrowck page") {
                    return Err(GenerationError::Http("reset".into()));
                }
                if prompt.contains("subtopic \"Ownership\"") {
                    return Ok("Ownership moves values.".into());
                }
                return Ok("   ".into());
            }
            Ok("# Section\n\nBody.".into())
        }));

        let mut content = FetchResult::new();
        content.push(url("https://a.example/"), Ok(FetchedPage::text("ownership page")));
        content.push(url("https://b.example/"), Ok(FetchedPage::text("borrowck page")));
        content.push(url("https://c.example/"), Err(FetchError::Status(404)));

        let outline = vec![TopicOutline {
            topic: "Rust".into(),
            subtopics: vec!["Ownership".into(), "Macros".into()],
        }];

        let plan = synthesizer(generator.clone())
            .synthesize_outline(&outline, &content)
            .await
            .unwrap();

        assert_eq!(generator.count_containing("Extract the content relevant"), 4);
        let sections = &plan.topics[0].sections;
        assert_eq!(sections.len(), 2);
        assert!(!sections[0].used_fallback_knowledge);
        assert_eq!(sections[0].fragments_used, 1);
        assert!(sections[1].used_fallback_knowledge);
        assert!(sections[0].document.as_str().starts_with("---\ntitle: \"Ownership\""));
        assert!(sections[0].document.as_str().contains("main_topic: \"Rust\""));

        let rendered = plan.render();
        assert!(rendered.starts_with("# Lesson Plan\n\n## Rust\n\n---\n"));
    }

    #[tokio::test]
    async fn short_fragments_below_threshold_escalate() {
        let generator = Arc::new(FakeGenerator::new(|prompt| {
            if prompt.starts_with("Extract") {
                if prompt.contains("subtopic \"Ownership\"") {
                    return Ok("Every value has exactly one owner at a time.".into());
                }
                return Ok("Macros.".into());
            }
            Ok("# Section\n\nBody.".into())
        }));
        let synthesizer = Synthesizer::new(
            generator.clone(),
            SynthesisConfig {
                min_fragment_chars: 20,
                ..config()
            },
        );

        let mut content = FetchResult::new();
        content.push(url("https://a.example/"), Ok(FetchedPage::text("rust page")));
        let outline = vec![TopicOutline {
            topic: "Rust".into(),
            subtopics: vec!["Ownership".into(), "Macros".into()],
        }];

        let plan = synthesizer.synthesize_outline(&outline, &content).await.unwrap();
        let sections = &plan.topics[0].sections;

        assert!(!sections[0].used_fallback_knowledge);
        assert_eq!(sections[0].fragments_used, 1);
        assert!(sections[1].used_fallback_knowledge);
        assert_eq!(sections[1].fragments_used, 0);
        assert_eq!(generator.count_containing("No reference material is available"), 1);
    }

    #[tokio::test]
    async fn subtopic_generation_failure_is_fatal() {
        let generator = Arc::new(FakeGenerator::new(|prompt| {
            if prompt.starts_with("Extract") {
                Ok("fragment".into())
            } else {
                Err(GenerationError::EmptyResponse)
            }
        }));
        let outline = vec![TopicOutline {
            topic: "Rust".into(),
            subtopics: vec!["Traits".into()],
        }];
        let mut content = FetchResult::new();
        content.push(url("https://a.example/"), Ok(FetchedPage::text("traits page")));

        let err = synthesizer(generator)
            .synthesize_outline(&outline, &content)
            .await
            .unwrap_err();
        assert_eq!(err.subject, "Traits");
        assert_eq!(err.mode, SynthesisMode::Grounded);
    }
}
