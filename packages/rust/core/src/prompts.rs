//! Prompt templates for every model call the pipeline makes.

use chrono::NaiveDate;

use topicdoc_shared::TopicContext;

/// The fixed-shape metadata header every document starts with.
pub fn front_matter(ctx: &TopicContext, date: NaiveDate) -> String {
    let subject = yaml_value(ctx.subject());
    let mut header = format!("---\ntitle: \"{subject}\"\n");
    match ctx.parent_subject().map(yaml_value) {
        Some(parent) => {
            header.push_str(&format!(
                "description: \"Comprehensive guide about {subject} in {parent}\"\n"
            ));
            header.push_str(&format!("date: \"{}\"\n", date.format("%Y-%m-%d")));
            header.push_str(&format!("main_topic: \"{parent}\"\n"));
        }
        None => {
            header.push_str(&format!(
                "description: \"Comprehensive guide about {subject}\"\n"
            ));
            header.push_str(&format!("date: \"{}\"\n", date.format("%Y-%m-%d")));
        }
    }
    header.push_str("---\n");
    header
}

/// Double quotes would end the YAML string early.
fn yaml_value(s: &str) -> String {
    s.replace('"', "'")
}

pub fn currency_check(ctx: &TopicContext) -> String {
    let mut prompt = format!(
        "Do you have up-to-date information about the topic \"{}\"?\n",
        ctx.subject()
    );
    if let Some(parent) = ctx.parent_subject() {
        prompt.push_str(&format!(
            "The topic is part of the broader subject \"{parent}\"; judge your knowledge in that context.\n"
        ));
    }
    prompt.push_str(
        "\nAnswer with exactly one word: YES if your knowledge of it is current \
         (covers roughly the last six months), NO otherwise.",
    );
    prompt
}

/// Shared formatting rules appended to document prompts.
const FORMAT_RULES: &str = "\
Formatting rules:
- Output raw MDX. Do not wrap the answer in a ```mdx code block.
- Do not escape quotes or newlines.
- Start with the metadata header shown above, then a `# ` heading with the topic name.
- Use a proper heading hierarchy (##, ###) with a blank line before every heading and list.
- Separate paragraphs with a blank line.
- Use fenced code blocks with a language tag for code.
- Do not use `---` horizontal rules in the body.
- End with a short summary section.";

fn relation_line(ctx: &TopicContext) -> String {
    match ctx.parent_subject() {
        Some(parent) => format!(
            "The topic is part of \"{parent}\". Throughout the document, explain how \"{}\" relates to \"{parent}\" and why it matters there.\n",
            ctx.subject()
        ),
        None => String::new(),
    }
}

/// Document prompt grounded in fetched source content.
pub fn grounded_document(ctx: &TopicContext, header: &str, sources: &str) -> String {
    format!(
        "You are a documentation writer producing MDX.\n\
         Write a comprehensive document about \"{subject}\".\n\
         {relation}\n\
         Base the document on the reference material below. Rely on it for facts \
         and do not invent details it does not support.\n\n\
         Reference material:\n{sources}\n\
         The document must begin with exactly this header:\n{header}\n\
         {FORMAT_RULES}\n",
        subject = ctx.subject(),
        relation = relation_line(ctx),
    )
}

/// Document prompt for when no usable sources were fetched.
pub fn knowledge_document(ctx: &TopicContext, header: &str) -> String {
    format!(
        "You are a documentation writer producing MDX.\n\
         Write a comprehensive document about \"{subject}\".\n\
         {relation}\n\
         No reference material is available. Write from your own trained knowledge. \
         Do not claim the content was freshly researched or sourced, and do not \
         make up facts, links or version numbers.\n\n\
         The document must begin with exactly this header:\n{header}\n\
         {FORMAT_RULES}\n",
        subject = ctx.subject(),
        relation = relation_line(ctx),
    )
}

/// Narrow one page to what matters for `subtopic` within `topic`.
pub fn fragment_extraction(topic: &str, subtopic: &str, page: &str) -> String {
    format!(
        "Extract the content relevant to the subtopic \"{subtopic}\", which is part of \
         the main topic \"{topic}\", from the Markdown below. Keep material that explains \
         how \"{subtopic}\" relates to \"{topic}\". Return Markdown only. If nothing is \
         relevant, return an empty response.\n\n{page}"
    )
}

pub fn outline(query: &str) -> String {
    format!(
        "Given the query \"{query}\", produce a structured list of main topics and their \
         subtopics suitable for a lesson plan.\n\n\
         Respond with JSON only, in this shape:\n\
         [\n  {{ \"topic\": \"Main Topic\", \"subtopics\": [\"Subtopic 1\", \"Subtopic 2\"] }}\n]"
    )
}

/// Refine a selected part of an existing document.
pub fn refine(
    topic: &str,
    document: &str,
    selected_text: &str,
    question: &str,
    extra: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Here is MDX content about the topic \"{topic}\":\n\n{document}\n\n\
         The user selected this text:\n\"{selected_text}\"\n\n\
         The user asks: {question}\n\n"
    );
    if let Some(extra) = extra {
        prompt.push_str("Additional information gathered from the web:\n\n");
        prompt.push_str(extra);
        prompt.push_str("\nUse this information where it helps. ");
    }
    prompt.push_str(
        "Return an updated MDX snippet that answers the request, focused on improving \
         or modifying the selected text. Keep valid MDX formatting.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn header_with_parent() {
        let ctx = TopicContext::new("Binary Search", Some("Algorithms")).unwrap();
        assert_eq!(
            front_matter(&ctx, date()),
            "---\n\
             title: \"Binary Search\"\n\
             description: \"Comprehensive guide about Binary Search in Algorithms\"\n\
             date: \"2025-03-14\"\n\
             main_topic: \"Algorithms\"\n\
             ---\n"
        );
    }

    #[test]
    fn header_without_parent_has_no_main_topic() {
        let ctx = TopicContext::new("Tokio", None).unwrap();
        let header = front_matter(&ctx, date());
        assert!(header.contains("description: \"Comprehensive guide about Tokio\"\n"));
        assert!(!header.contains("main_topic"));
    }

    #[test]
    fn header_quotes_are_replaced() {
        let ctx = TopicContext::new("The \"new\" API", None).unwrap();
        assert!(front_matter(&ctx, date()).contains("title: \"The 'new' API\""));
    }

    #[test]
    fn grounded_prompt_carries_sources_and_parent() {
        let ctx = TopicContext::new("Binary Search", Some("Algorithms")).unwrap();
        let prompt = grounded_document(&ctx, "---\n---\n", "Content from https://a/:\nbody\n\n");
        assert!(prompt.contains("Content from https://a/:"));
        assert!(prompt.contains("relates to \"Algorithms\""));
        assert!(prompt.contains("do not invent"));
    }

    #[test]
    fn knowledge_prompt_forbids_sourcing_claims() {
        let ctx = TopicContext::new("Tokio", None).unwrap();
        let prompt = knowledge_document(&ctx, "---\n---\n");
        assert!(prompt.contains("Do not claim the content was freshly researched"));
        assert!(!prompt.contains("Reference material:"));
    }

    #[test]
    fn refine_prompt_includes_extra_only_when_given() {
        let plain = refine("Rust", "# Doc", "sel", "why?", None);
        assert!(!plain.contains("Additional information"));
        let grounded = refine("Rust", "# Doc", "sel", "why?", Some("Content from x"));
        assert!(grounded.contains("Additional information"));
        assert!(grounded.contains("Content from x"));
    }
}
