//! The line-based document stream produced by the extractor.
//!
//! The extractor emits Markdown with one `![](filename)` placeholder line per
//! embedded image. [`DocumentStream::parse`] splits on `'\n'` and classifies
//! every line once, so later stages branch on [`StreamItem`] instead of
//! re-inspecting strings.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;

/// Classification of one line of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamItem {
    /// Ordinary prose, headings, list items, blank lines.
    Text,
    /// A table row (`| … |`).
    Table,
    /// An image placeholder naming an asset relative to the output folder.
    ImagePlaceholder { filename: String },
}

/// Ordered lines of the extracted Markdown plus their classification.
///
/// `lines.join("\n")` reproduces the extractor output byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStream {
    lines: Vec<String>,
    items: Vec<StreamItem>,
}

impl DocumentStream {
    pub fn parse(markdown: &str) -> Self {
        let lines: Vec<String> = markdown.split('\n').map(str::to_string).collect();
        let items = lines.iter().map(|l| classify_line(l)).collect();
        Self { lines, items }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn items(&self) -> &[StreamItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// `(line index, filename)` for every placeholder, in document order.
    pub fn placeholders(&self) -> impl Iterator<Item = (usize, &str)> {
        self.items.iter().enumerate().filter_map(|(i, item)| match item {
            StreamItem::ImagePlaceholder { filename } => Some((i, filename.as_str())),
            StreamItem::Text | StreamItem::Table => None,
        })
    }

    /// Rebuild the Markdown text.
    pub fn to_markdown(&self) -> String {
        self.lines.join("\n")
    }
}

/// Classify a single line.
pub fn classify_line(line: &str) -> StreamItem {
    let trimmed = line.trim();
    if let Some(filename) = placeholder_filename(trimmed) {
        return StreamItem::ImagePlaceholder {
            filename: filename.to_string(),
        };
    }
    if trimmed.len() > 1 && trimmed.starts_with('|') && trimmed.ends_with('|') {
        return StreamItem::Table;
    }
    StreamItem::Text
}

/// The filename inside `![](filename)`, if `trimmed` is exactly one placeholder.
///
/// Only a bare file name counts: anything with a directory component, `..`,
/// or an absolute path would resolve outside the output folder.
fn placeholder_filename(trimmed: &str) -> Option<&str> {
    let inner = trimmed.strip_prefix("![](")?.strip_suffix(')')?;
    let inner = inner.trim();
    if inner.contains(')') || !is_bare_file_name(inner) {
        None
    } else {
        Some(inner)
    }
}

/// `true` when `name` is a single path component naming a file.
pub fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name() == Some(OsStr::new(name))
}

/// Render the placeholder line for `filename`.
pub fn placeholder_line(filename: &str) -> String {
    format!("![]({filename})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_placeholder_lines() {
        assert_eq!(
            classify_line("![](img1.png)"),
            StreamItem::ImagePlaceholder {
                filename: "img1.png".into()
            }
        );
        assert_eq!(
            classify_line("   ![](doc.pdf-0-1.png)  "),
            StreamItem::ImagePlaceholder {
                filename: "doc.pdf-0-1.png".into()
            }
        );
    }

    #[test]
    fn alt_text_or_inline_images_are_text() {
        assert_eq!(classify_line("![Figure](img1.png)"), StreamItem::Text);
        assert_eq!(classify_line("see ![](img1.png) here"), StreamItem::Text);
        assert_eq!(classify_line("![]()"), StreamItem::Text);
        assert_eq!(classify_line("![](a.png)![](b.png)"), StreamItem::Text);
    }

    #[test]
    fn paths_outside_the_output_folder_are_text() {
        for line in [
            "![](/home/u/.ssh/id_rsa)",
            "![](../../secret)",
            "![](..)",
            "![](.)",
            "![](sub/img.png)",
            "![](sub\\img.png)",
        ] {
            assert_eq!(classify_line(line), StreamItem::Text, "{line}");
        }
        assert!(is_bare_file_name("doc.pdf-0-0.png"));
        assert!(!is_bare_file_name(""));
    }

    #[test]
    fn classifies_tables() {
        assert_eq!(classify_line("| a | b |"), StreamItem::Table);
        assert_eq!(classify_line("|---|---|"), StreamItem::Table);
        assert_eq!(classify_line("|"), StreamItem::Text);
    }

    #[test]
    fn parse_round_trips_exactly() {
        let md = "# Title\n\nIntro\n![](img1.png)\n| a |\n\n";
        let s = DocumentStream::parse(md);
        assert_eq!(s.to_markdown(), md);
        assert_eq!(s.len(), 7);
    }

    #[test]
    fn placeholders_in_document_order() {
        let s = DocumentStream::parse("a\n![](x.png)\nb\n![](y.png)");
        let found: Vec<_> = s.placeholders().collect();
        assert_eq!(found, vec![(1, "x.png"), (3, "y.png")]);
    }

    #[test]
    fn empty_input_is_one_empty_line() {
        let s = DocumentStream::parse("");
        assert_eq!(s.len(), 1);
        assert_eq!(s.to_markdown(), "");
    }

    #[test]
    fn placeholder_line_renders_marker() {
        assert_eq!(placeholder_line("p.png"), "![](p.png)");
        assert!(matches!(
            classify_line(&placeholder_line("p.png")),
            StreamItem::ImagePlaceholder { .. }
        ));
    }
}
