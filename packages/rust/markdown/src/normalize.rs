//! Deterministic post-processing of generated documents.
//!
//! [`normalize`] never fails and is idempotent: running it on its own output
//! returns the same text. Each pass is a `&str -> String` function; the order
//! in [`normalize_text`] matters for idempotence (un-escaping happens before
//! any structural pass so later passes see the real line breaks).

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use topicdoc_shared::Artifact;

use crate::fence::{DOCUMENT_FENCE_MARKERS, code_mask, is_fence_line, unwrap_fence};

/// Normalize a raw generated document into an [`Artifact`].
pub fn normalize(raw: &str) -> Artifact {
    Artifact::from_normalized(normalize_text(raw))
}

/// Normalize raw generated text. Blank input yields an empty string.
pub fn normalize_text(raw: &str) -> String {
    let mut text = raw.replace("\r\n", "\n");

    text = unwrap_and_unescape(&text);
    text = keep_single_front_matter(&text);
    text = trim_line_ends(&text);
    text = collapse_blank_runs(&text);
    text = apply_spacing(&text);
    text = strip_leading_blank_lines(&text);

    if text.trim().is_empty() {
        return String::new();
    }
    ensure_trailing_newline(&text)
}

/// Whether the document opens with a closed `---` block carrying a `title:` key.
///
/// Leading blank lines are ignored. A lone `---` rule is not front matter.
pub fn has_front_matter(text: &str) -> bool {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());
    if !lines.next().is_some_and(is_delimiter) {
        return false;
    }
    let mut titled = false;
    for line in lines {
        if is_delimiter(line) {
            return titled;
        }
        titled |= line.trim_start().starts_with("title:");
    }
    false
}

/// Put `header` in front of `body` unless the body already carries front matter.
///
/// Stray `---` lines in the body become `***` so the normalizer's
/// single-header pass cannot discard `header`.
pub fn prepend_front_matter(header: &str, body: &str) -> String {
    if has_front_matter(body) {
        return body.to_string();
    }
    let lines: Vec<&str> = body.trim_start().lines().collect();
    let mask = code_mask(&lines);
    let body = lines
        .iter()
        .zip(&mask)
        .map(|(line, in_code)| if !in_code && is_delimiter(line) { "***" } else { *line })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{header}\n{body}")
}

// ---------------------------------------------------------------------------
// Pass 1: Fence unwrapping + un-escaping
// ---------------------------------------------------------------------------

/// Alternate fence unwrapping and un-escaping until neither changes the text.
///
/// A document that arrives as one escaped line only reveals its wrapping fence
/// after un-escaping, and un-escaping can expose further escapes, so both run
/// to a fixed point. Each round strictly shortens the text, so this terminates.
fn unwrap_and_unescape(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let unwrapped = unwrap_fence(&current, DOCUMENT_FENCE_MARKERS)
            .map(String::from)
            .unwrap_or_else(|| current.clone());
        let next = unescape_outside_code(&unwrapped);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Replace literal `\n` and `\"` with a newline and a quote.
///
/// Lines inside fenced code blocks keep their escapes; fence lines themselves
/// are processed so an escaped one-line document can be split.
fn unescape_outside_code(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mask = code_mask(&lines);

    lines
        .iter()
        .zip(mask)
        .map(|(line, in_code)| {
            if in_code && !is_fence_line(line) {
                Cow::Borrowed(*line)
            } else if line.contains('\\') {
                Cow::Owned(line.replace("\\n", "\n").replace("\\\"", "\""))
            } else {
                Cow::Borrowed(*line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Single front matter block
// ---------------------------------------------------------------------------

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

/// While more than two delimiter lines remain outside code, drop everything
/// before the second one.
fn keep_single_front_matter(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    loop {
        let mask = code_mask(&lines);
        let delimiters: Vec<usize> = lines
            .iter()
            .zip(&mask)
            .enumerate()
            .filter(|(_, (line, in_code))| !**in_code && is_delimiter(line))
            .map(|(i, _)| i)
            .collect();

        if delimiters.len() <= 2 {
            break;
        }
        lines.drain(..delimiters[1]);
    }
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Whitespace
// ---------------------------------------------------------------------------

fn trim_line_ends(text: &str) -> String {
    text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// Collapse runs of three or more newlines into exactly two.
fn collapse_blank_runs(text: &str) -> String {
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    BLANK_RUN_RE.replace_all(text, "\n\n").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 4: Block spacing
// ---------------------------------------------------------------------------

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}(\s|$)").expect("valid regex"));

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d{1,9}[.)])\s").expect("valid regex"));

fn is_heading(line: &str) -> bool {
    HEADING_RE.is_match(line)
}

fn is_list_item(line: &str) -> bool {
    LIST_ITEM_RE.is_match(line)
}

fn is_top_level_list_item(line: &str) -> bool {
    !line.starts_with(char::is_whitespace) && is_list_item(line)
}

/// Index of the closing delimiter when the document opens with front matter.
fn front_matter_end(lines: &[&str], mask: &[bool]) -> Option<usize> {
    let start = lines.iter().position(|l| !l.trim().is_empty())?;
    if mask[start] || !is_delimiter(lines[start]) {
        return None;
    }
    (start + 1..lines.len()).find(|&i| !mask[i] && is_delimiter(lines[i]))
}

/// Blank lines around headings and before the first item of a list.
///
/// Fenced code and the leading front matter are left untouched. A list item
/// directly after another item or an indented continuation stays tight.
fn apply_spacing(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mask = code_mask(&lines);
    let header_end = front_matter_end(&lines, &mask);

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + lines.len() / 4);
    for (i, line) in lines.iter().enumerate() {
        let protected = mask[i] || header_end.is_some_and(|end| i <= end);

        if !protected {
            let prev = out.last().copied().filter(|p| !p.trim().is_empty());
            let needs_gap = match prev {
                None => false,
                Some(_) if is_heading(line) => true,
                Some(p) if is_top_level_list_item(line) => {
                    !is_list_item(p) && !p.starts_with(char::is_whitespace)
                }
                Some(_) => false,
            };
            if needs_gap {
                out.push("");
            }
        }

        out.push(line);

        if !protected && is_heading(line) {
            if let Some(next) = lines.get(i + 1) {
                if !next.trim().is_empty() {
                    out.push("");
                }
            }
        }
    }
    out.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Edges
// ---------------------------------------------------------------------------

fn strip_leading_blank_lines(text: &str) -> String {
    let mut rest = text;
    while let Some((first, tail)) = rest.split_once('\n') {
        if !first.trim().is_empty() {
            break;
        }
        rest = tail;
    }
    rest.to_string()
}

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(text: &str) -> String {
    let trimmed = text.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
