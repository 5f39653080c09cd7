//! Search query construction from a topic context.

use topicdoc_shared::TopicContext;

/// Build the discovery queries for `ctx`, in the order they are issued.
///
/// 1. base: subject plus official documentation
/// 2. relational: subject in the context of the parent (parent only)
/// 3. relationship: subject and parent with examples (parent only)
/// 4. recency: latest updates qualified by `year`
///
/// With a parent, the recency query names the parent too, narrowing news to
/// the subject's use within it.
///
/// A refinement `question`, when given, is appended to every query.
pub fn build_queries(ctx: &TopicContext, question: Option<&str>, year: i32) -> Vec<String> {
    let subject = ctx.subject();
    let mut queries = vec![format!("{subject} official documentation OR guide")];

    if let Some(parent) = ctx.parent_subject() {
        queries.push(format!("{subject} in context of {parent} tutorial OR guide"));
        queries.push(format!("{subject} {parent} relationship examples"));
        queries.push(format!("{subject} {parent} latest updates {year}"));
    } else {
        queries.push(format!("{subject} latest updates {year}"));
    }

    match question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => queries.into_iter().map(|query| format!("{query} {q}")).collect(),
        None => queries,
    }
}

/// The broad query used for supplementary sourcing.
pub fn general_query(ctx: &TopicContext) -> String {
    let subject = ctx.subject();
    match ctx.parent_subject() {
        Some(parent) => format!("{subject} {parent} OR {subject} in {parent}"),
        None => subject.to_string(),
    }
}
