//! Post-processing: deterministic cleanup of model-generated descriptions.
//!
//! A description is spliced into the middle of a Markdown document, so it has
//! to behave as an inert block of prose. Models occasionally wrap the answer
//! in a ```` ```markdown ```` fence, emit `\r\n`, pad with blank lines, or
//! invent `![…](…)` image links. The last one matters most: a description
//! line that looks like a placeholder would be picked up as an image the next
//! time the enriched document is scanned.
//!
//! Rules (applied in order):
//! 1. Strip an outer markdown fence
//! 2. Normalise line endings (CRLF → LF)
//! 3. Trim trailing whitespace per line
//! 4. Collapse 3+ consecutive blank lines down to 1
//! 5. Replace image links with their alt text in italics
//! 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 7. Trim leading/trailing blank space

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model answer.
pub fn clean_description(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = neutralise_image_links(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Neutralise image links ───────────────────────────────────────────

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

/// Repeated until stable: removing one link can splice its neighbours into a
/// new one (`!![](a)[](b)` → `![](b)`). Every pass that changes anything
/// shortens the text, so the loop ends.
fn neutralise_image_links(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = RE_IMAGE
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let alt = caps[1].trim();
                if alt.is_empty() {
                    String::new()
                } else {
                    format!("*{}*", alt)
                }
            })
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

// ── Rule 6: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{classify_line, StreamItem};

    #[test]
    fn strips_fences() {
        assert_eq!(strip_markdown_fences("```markdown\nA chart\n```"), "A chart");
        assert_eq!(strip_markdown_fences("```\nA chart\n```"), "A chart");
        assert_eq!(strip_markdown_fences("A chart"), "A chart");
    }

    #[test]
    fn inner_code_blocks_survive() {
        let input = "Overview\n```\nx = 1\n```\nMore";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn normalises_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn image_links_become_italic_alt_text() {
        assert_eq!(neutralise_image_links("see ![Bar chart](chart.png)"), "see *Bar chart*");
        assert_eq!(neutralise_image_links("![](x.png)"), "");
    }

    #[test]
    fn spliced_image_links_are_removed_too() {
        assert_eq!(neutralise_image_links("!![](a)[](b)"), "");
        assert_eq!(neutralise_image_links("!!![](a)[](b)[](c)"), "");
        let cleaned = clean_description("Chart\n!![](a.png)[](b.png)\nDone");
        assert!(cleaned
            .split('\n')
            .all(|l| !matches!(classify_line(l), StreamItem::ImagePlaceholder { .. })));
    }

    #[test]
    fn cleaned_description_never_contains_a_placeholder_line() {
        let raw = "**Overview**\n![](fig1.png)\nA pie chart.";
        let cleaned = clean_description(raw);
        for line in cleaned.split('\n') {
            assert!(
                !matches!(classify_line(line), StreamItem::ImagePlaceholder { .. }),
                "placeholder survived: {line:?}"
            );
        }
    }

    #[test]
    fn removes_invisible_chars() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}d"), "abcd");
    }

    #[test]
    fn full_cleanup() {
        let raw = "```markdown\r\na. Overview   \r\n\r\n\r\n\r\nb. Detail\u{200B}\r\n```\n";
        assert_eq!(clean_description(raw), "a. Overview\n\nb. Detail");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(clean_description("  \n\n \t"), "");
    }
}
