//! Refinement of a selected passage, optionally grounded in fetched pages.

use serde::Serialize;
use tracing::{info, instrument};
use url::Url;

use topicdoc_crawler::Fetcher;
use topicdoc_discovery::Discovery;
use topicdoc_shared::{Result, TopicContext, TopicDocError};

use crate::llm::Generator;
use crate::prompts;
use crate::synthesizer::Aggregate;

#[derive(Debug, Clone)]
pub struct RefineRequest {
    pub document: String,
    pub selected_text: String,
    pub question: String,
    pub topic: String,
}

/// Where extra material for the answer comes from.
#[derive(Debug, Clone)]
pub enum Grounding {
    None,
    /// Discover pages for the topic with the question appended to every query.
    Search { results_per_query: usize },
    /// Fetch exactly these pages.
    Urls(Vec<Url>),
}

/// The refined snippet, as generated (fragments are not normalized).
#[derive(Debug, Clone, Serialize)]
pub struct Refinement {
    pub text: String,
    pub sources: Vec<Url>,
}

pub(crate) struct Refiner<'a> {
    pub discovery: &'a Discovery,
    pub fetcher: &'a Fetcher,
    pub generator: &'a dyn Generator,
    pub max_source_chars: usize,
}

impl Refiner<'_> {
    #[instrument(skip_all, fields(topic = %request.topic))]
    pub async fn refine(&self, request: &RefineRequest, grounding: &Grounding) -> Result<Refinement> {
        if request.question.trim().is_empty() {
            return Err(TopicDocError::validation("question cannot be empty"));
        }
        let ctx = TopicContext::new(request.topic.as_str(), None)?;

        let (extra, sources) = match grounding {
            Grounding::None => (None, Vec::new()),
            Grounding::Search { results_per_query } => {
                let found = self
                    .discovery
                    .discover_for_question(&ctx, request.question.trim(), *results_per_query)
                    .await;
                if found.is_empty() {
                    return Err(TopicDocError::validation(
                        "could not find relevant websites to ground the refinement",
                    ));
                }
                let fetched = self.fetcher.fetch_all(found.as_slice()).await;
                let agg = Aggregate::from_result(&fetched, self.max_source_chars);
                (Some(agg.text), agg.sources)
            }
            Grounding::Urls(urls) => {
                if urls.is_empty() {
                    return Err(TopicDocError::validation("no URLs provided for grounding"));
                }
                let fetched = self.fetcher.fetch_all(urls).await;
                let agg = Aggregate::from_result(&fetched, self.max_source_chars);
                if agg.sources.is_empty() {
                    return Err(TopicDocError::validation(
                        "could not extract content from any of the provided URLs",
                    ));
                }
                (Some(agg.text), agg.sources)
            }
        };

        let prompt = prompts::refine(
            ctx.subject(),
            &request.document,
            &request.selected_text,
            request.question.trim(),
            extra.as_deref(),
        );
        let text = self.generator.generate(&prompt).await?;
        info!(sources = sources.len(), "refinement generated");
        Ok(Refinement { text, sources })
    }
}
