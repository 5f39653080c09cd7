//! Cleanup passes applied to Markdown converted from fetched pages.
//!
//! The output feeds a model prompt, not a reader, so the passes strip what
//! costs tokens without carrying content: images, link targets, leftover
//! layout tags, and blank-line padding. Each pass is `&str -> String`.

use std::sync::LazyLock;

use regex::Regex;

use crate::fence::code_mask;

/// Run the full cleanup pipeline on converted Markdown.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.replace("\r\n", "\n");

    result = outside_code(&result, drop_images);
    result = outside_code(&result, flatten_links);
    result = outside_code(&result, strip_layout_tags);
    result = trim_line_ends(&result);
    result = collapse_blank_lines(&result);

    result.trim().to_string()
}

/// Apply a line pass to every line outside fenced code blocks.
fn outside_code(md: &str, pass: fn(&str) -> String) -> String {
    let lines: Vec<&str> = md.lines().collect();
    let mask = code_mask(&lines);

    lines
        .iter()
        .zip(mask)
        .map(|(line, in_code)| if in_code { line.to_string() } else { pass(line) })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Line passes
// ---------------------------------------------------------------------------

/// Remove `![alt](src)` images entirely.
fn drop_images(line: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));

    IMAGE_RE.replace_all(line, "").into_owned()
}

/// Replace `[text](href)` with `text`.
fn flatten_links(line: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

    LINK_RE.replace_all(line, "$1").into_owned()
}

/// Remove layout tags that survive conversion, keeping their text.
fn strip_layout_tags(line: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|button|form|input|label)(?:\s[^>]*)?/?>",
        )
        .expect("valid regex")
    });

    TAG_RE.replace_all(line, "").into_owned()
}

// ---------------------------------------------------------------------------
// Whole-text passes
// ---------------------------------------------------------------------------

fn trim_line_ends(md: &str) -> String {
    md.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// Collapse runs of blank lines to a single blank line.
fn collapse_blank_lines(md: &str) -> String {
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    BLANK_RUN_RE.replace_all(md, "\n\n").into_owned()
}
