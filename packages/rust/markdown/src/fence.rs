//! Fenced code block helpers shared by the normalizer and extraction cleanup.

/// Language markers that identify a fence wrapping a whole generated document.
pub const DOCUMENT_FENCE_MARKERS: &[&str] = &["mdx", "md", "markdown"];

/// Whether a line opens or closes a fenced code block.
pub fn is_fence_line(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Mark every line that is a fence line or sits between a pair of fences.
///
/// An unclosed fence marks everything after it.
pub(crate) fn code_mask(lines: &[&str]) -> Vec<bool> {
    let mut in_code = false;
    lines
        .iter()
        .map(|line| {
            if is_fence_line(line) {
                in_code = !in_code;
                true
            } else {
                in_code
            }
        })
        .collect()
}

/// If `text` is entirely one fenced block whose marker is in `markers`
/// (case-insensitive), return the inner text.
///
/// Surrounding whitespace is ignored. The inner text must contain a balanced
/// number of fence lines, otherwise the closing fence belongs to an inner block
/// and nothing is unwrapped. An empty marker in `markers` accepts a bare fence.
pub fn unwrap_fence<'a>(text: &'a str, markers: &[&str]) -> Option<&'a str> {
    let trimmed = text.trim();
    let (first, rest) = trimmed.split_once('\n')?;
    let marker = first.trim_end().strip_prefix("```")?.trim();
    if !markers.iter().any(|m| m.eq_ignore_ascii_case(marker)) {
        return None;
    }

    let (inner, last) = rest.rsplit_once('\n')?;
    if last.trim() != "```" {
        return None;
    }

    let inner_fences = inner.lines().filter(|l| is_fence_line(l)).count();
    (inner_fences % 2 == 0).then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mask_covers_fences_and_body() {
        let lines = ["text", "```rust", "let x = 1;", "```", "after"];
        assert_eq!(code_mask(&lines), [false, true, true, true, false]);
    }

    #[test]
    fn unwrap_fence_known_marker() {
        let text = "\n```mdx\n# Title\nbody\n```\n";
        assert_eq!(unwrap_fence(text, DOCUMENT_FENCE_MARKERS), Some("# Title\nbody"));
    }

    #[test]
    fn unwrap_fence_rejects_unknown_marker() {
        let text = "```python\nprint(1)\n```";
        assert_eq!(unwrap_fence(text, DOCUMENT_FENCE_MARKERS), None);
    }

    #[test]
    fn unwrap_fence_rejects_partial_wrap() {
        let text = "Intro\n```mdx\n# T\n```";
        assert_eq!(unwrap_fence(text, DOCUMENT_FENCE_MARKERS), None);
    }

    #[test]
    fn unwrap_fence_keeps_inner_blocks() {
        let text = "```markdown\n# T\n\n```rust\nfn main() {}\n```\n```";
        assert_eq!(
            unwrap_fence(text, DOCUMENT_FENCE_MARKERS),
            Some("# T\n\n```rust\nfn main() {}\n```")
        );
    }

    #[test]
    fn unwrap_fence_unbalanced_inner_is_not_a_wrap() {
        // The last fence closes the inner block, not the outer one.
        let text = "```md\n# T\n```rust\nfn main() {}\n```";
        assert_eq!(unwrap_fence(text, DOCUMENT_FENCE_MARKERS), None);
    }

    #[test]
    fn unwrap_fence_bare_marker_when_allowed() {
        let text = "```\n[1, 2]\n```";
        assert_eq!(unwrap_fence(text, &["json", ""]), Some("[1, 2]"));
        assert_eq!(unwrap_fence(text, &["json"]), None);
    }
}
