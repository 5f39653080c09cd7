//! Markdown handling for TopicDoc.
//!
//! Two directions:
//! - [`html_to_markdown`] turns fetched HTML pages into compact Markdown for prompts.
//! - [`normalize`] turns raw model output into the final document, enforcing a
//!   single front matter block, block spacing, and fence stripping. It is pure
//!   and idempotent.

mod cleanup;
mod extract;
mod fence;
mod normalize;

pub use extract::{ExtractedPage, html_to_markdown};
pub use fence::{DOCUMENT_FENCE_MARKERS, is_fence_line, unwrap_fence};
pub use normalize::{has_front_matter, normalize, normalize_text, prepend_front_matter};
