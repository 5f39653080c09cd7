//! Lesson outline generation: query in, `[TopicOutline]` out.

use tracing::{info, instrument};

use topicdoc_markdown::unwrap_fence;
use topicdoc_shared::{Result, TopicDocError, TopicOutline};

use crate::llm::Generator;
use crate::prompts;

/// Ask the model for topics and subtopics covering `query`.
#[instrument(skip_all, fields(query = %query))]
pub async fn generate_outline(generator: &dyn Generator, query: &str) -> Result<Vec<TopicOutline>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(TopicDocError::validation("query cannot be empty"));
    }

    let raw = generator.generate(&prompts::outline(query)).await?;
    let outline = parse_outline(&raw)?;
    info!(topics = outline.len(), "outline generated");
    Ok(outline)
}

/// Parse the model's JSON, tolerating a ```json or bare fence around it.
pub fn parse_outline(raw: &str) -> Result<Vec<TopicOutline>> {
    let json = unwrap_fence(raw, &["json", ""]).unwrap_or(raw).trim();
    let outline: Vec<TopicOutline> = serde_json::from_str(json)
        .map_err(|e| TopicDocError::parse(format!("outline is not valid JSON: {e}")))?;

    Ok(outline
        .into_iter()
        .filter(|entry| !entry.topic.trim().is_empty())
        .map(|entry| TopicOutline {
            topic: entry.topic.trim().to_string(),
            subtopics: entry
                .subtopics
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
        .collect())
}
