//! Stream reconstruction: splice descriptions back into the document.
//!
//! The walk copies every line of the original stream verbatim and, right
//! after each resolved placeholder, appends
//!
//! ```text
//! (blank)
//! **Image Description:**
//! <description>
//! (blank)
//! ```
//!
//! Placeholders without a resolution (missing assets) are copied unchanged.
//! The original lines are never edited, so removing the inserted blocks gives
//! the plain document back.

use crate::document::DocumentStream;
use crate::error::PdfChatError;
use crate::pipeline::context::ContextWindow;
use crate::pipeline::describe::DescriptionResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Heading line that introduces every inserted description.
pub const DESCRIPTION_LABEL: &str = "**Image Description:**";

/// A placeholder the orchestrator resolved to an asset and described.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Line index of the placeholder in the stream.
    pub index: usize,
    /// 1-based image number in document order.
    pub number: usize,
    pub filename: String,
    pub window: ContextWindow,
    pub result: DescriptionResult,
}

/// The stream with description blocks inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedDocument {
    lines: Vec<String>,
}

impl EnrichedDocument {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn to_markdown(&self) -> String {
        self.lines.join("\n")
    }
}

/// Context and description of one image, persisted as
/// `image_description_{number}.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub number: usize,
    pub filename: String,
    pub context_before: String,
    pub context_after: String,
    pub description: String,
}

impl ProvenanceRecord {
    pub fn from_resolution(r: &Resolution) -> Self {
        Self {
            number: r.number,
            filename: r.filename.clone(),
            context_before: r.window.before.clone(),
            context_after: r.window.after.clone(),
            description: r.result.text(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("image_description_{}.txt", self.number)
    }

    /// File body: the two windows, then the description.
    pub fn render(&self) -> String {
        format!(
            "Context before:\n{}\n\nContext after:\n{}\n\nImage Description:\n{}\n",
            self.context_before, self.context_after, self.description
        )
    }

    /// Write the record into `dir`, returning the file path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, PdfChatError> {
        let path = dir.join(self.file_name());
        crate::output::write_atomic(&path, &self.render())?;
        Ok(path)
    }
}

/// Build the enriched document and one provenance record per resolution.
///
/// `resolutions` may arrive in any order; they are matched to placeholders by
/// line index. A resolution whose index is not a placeholder line is ignored.
pub fn reconstruct(
    stream: &DocumentStream,
    resolutions: &[Resolution],
) -> (EnrichedDocument, Vec<ProvenanceRecord>) {
    let mut ordered: Vec<&Resolution> = resolutions.iter().collect();
    ordered.sort_by_key(|r| r.index);

    let mut lines = Vec::with_capacity(stream.len() + ordered.len() * 4);
    let mut records = Vec::with_capacity(ordered.len());
    let mut pending = ordered.into_iter().peekable();

    let placeholders: std::collections::HashSet<usize> =
        stream.placeholders().map(|(i, _)| i).collect();

    for (i, line) in stream.lines().iter().enumerate() {
        lines.push(line.clone());

        // Drop stray resolutions that point before this line.
        while pending.peek().is_some_and(|r| r.index < i) {
            if let Some(r) = pending.next() {
                debug!("Ignoring resolution for non-placeholder line {}", r.index);
            }
        }

        if !placeholders.contains(&i) {
            continue;
        }
        match pending.next_if(|r| r.index == i) {
            Some(r) => {
                lines.push(String::new());
                lines.push(DESCRIPTION_LABEL.to_string());
                lines.push(r.result.text());
                lines.push(String::new());
                records.push(ProvenanceRecord::from_resolution(r));
            }
            None => debug!("Placeholder on line {} left unresolved", i),
        }
    }

    (EnrichedDocument { lines }, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackendError, DescriptionError};
    use crate::pipeline::context::build_context;

    fn resolution(stream: &DocumentStream, index: usize, number: usize, text: &str) -> Resolution {
        let filename = match &stream.items()[index] {
            crate::document::StreamItem::ImagePlaceholder { filename } => filename.clone(),
            other => panic!("line {index} is {other:?}"),
        };
        Resolution {
            index,
            number,
            filename,
            window: build_context(stream.lines(), index, 1),
            result: DescriptionResult::Described(text.to_string()),
        }
    }

    #[test]
    fn inserts_block_after_each_placeholder() {
        let s = DocumentStream::parse("# Title\nIntro text\n![](img1.png)\nMore text\n![](img2.png)\nEnd");
        let rs = vec![resolution(&s, 2, 1, "D1"), resolution(&s, 4, 2, "D2")];
        let (doc, records) = reconstruct(&s, &rs);
        assert_eq!(
            doc.to_markdown(),
            "# Title\nIntro text\n![](img1.png)\n\n**Image Description:**\nD1\n\nMore text\n![](img2.png)\n\n**Image Description:**\nD2\n\nEnd"
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].context_before, "Intro text");
        assert_eq!(records[0].context_after, "More text");
        assert_eq!(records[1].file_name(), "image_description_2.txt");
    }

    #[test]
    fn out_of_order_resolutions_are_sorted() {
        let s = DocumentStream::parse("![](a.png)\nx\n![](b.png)");
        let rs = vec![resolution(&s, 2, 2, "B"), resolution(&s, 0, 1, "A")];
        let (doc, records) = reconstruct(&s, &rs);
        let md = doc.to_markdown();
        assert!(md.find("A").unwrap() < md.find("B").unwrap());
        assert_eq!(records.iter().map(|r| r.number).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn unresolved_placeholder_is_copied_unchanged() {
        let s = DocumentStream::parse("![](missing.png)\n![](b.png)");
        let (doc, records) = reconstruct(&s, &[resolution(&s, 1, 1, "B")]);
        assert_eq!(
            doc.lines(),
            &["![](missing.png)", "![](b.png)", "", "**Image Description:**", "B", ""]
        );
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn stripping_blocks_recovers_the_plain_document() {
        let md = "a\n![](x.png)\nb\n| t |\n![](y.png)";
        let s = DocumentStream::parse(md);
        let rs = vec![resolution(&s, 1, 1, "X"), resolution(&s, 4, 2, "Y")];
        let (doc, _) = reconstruct(&s, &rs);

        let mut kept = Vec::new();
        let mut lines = doc.lines().iter();
        while let Some(line) = lines.next() {
            kept.push(line.as_str());
            if line.starts_with("![](") {
                for _ in 0..4 {
                    lines.next();
                }
            }
        }
        assert_eq!(kept.join("\n"), md);
    }

    #[test]
    fn failure_text_is_inlined_and_recorded() {
        let s = DocumentStream::parse("![](a.png)");
        let r = Resolution {
            result: DescriptionResult::Failed(DescriptionError::Model {
                source: BackendError::Timeout(5),
                attempts: 1,
            }),
            ..resolution(&s, 0, 1, "")
        };
        let (doc, records) = reconstruct(&s, &[r]);
        assert!(doc.lines()[3].starts_with("Error in image description:"));
        assert_eq!(records[0].description, doc.lines()[3]);
    }

    #[test]
    fn reconstruction_is_deterministic() {
        let s = DocumentStream::parse("t\n![](a.png)\nu");
        let rs = vec![resolution(&s, 1, 1, "A")];
        assert_eq!(reconstruct(&s, &rs), reconstruct(&s, &rs));
    }

    #[test]
    fn provenance_layout() {
        let record = ProvenanceRecord {
            number: 1,
            filename: "a.png".into(),
            context_before: "before".into(),
            context_after: "after".into(),
            description: "desc".into(),
        };
        assert_eq!(
            record.render(),
            "Context before:\nbefore\n\nContext after:\nafter\n\nImage Description:\ndesc\n"
        );
    }

    #[test]
    fn write_to_persists_the_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let record = ProvenanceRecord {
            number: 3,
            filename: "a.png".into(),
            context_before: String::new(),
            context_after: String::new(),
            description: "desc".into(),
        };
        let path = record.write_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("image_description_3.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), record.render());
    }
}
