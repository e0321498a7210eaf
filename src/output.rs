//! Output types and on-disk layout of a pipeline run.
//!
//! A run on `report.pdf` writes into `<output_root>/report/`:
//!
//! ```text
//! report/
//! ├── report.md                        plain extraction
//! ├── report_with_descriptions.md      enriched document
//! ├── report.pdf-0-0.png               extracted images
//! └── image_description_1.txt          one provenance file per image
//! ```

use crate::error::PdfChatError;
use crate::pipeline::describe::DescriptionResult;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File and folder names for one PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// `<output_root>/<stem>`
    pub dir: PathBuf,
    /// `<dir>/<stem>.md`
    pub plain: PathBuf,
    /// `<dir>/<stem>_with_descriptions.md`
    pub enriched: PathBuf,
}

impl OutputLayout {
    pub fn for_pdf(output_root: &Path, pdf: &Path) -> Self {
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let dir = output_root.join(&stem);
        Self {
            plain: dir.join(format!("{stem}.md")),
            enriched: dir.join(format!("{stem}_with_descriptions.md")),
            dir,
        }
    }

    /// Create the output folder (and parents).
    pub fn create(&self) -> Result<(), PdfChatError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| PdfChatError::OutputWriteFailed {
            path: self.dir.clone(),
            source: e,
        })
    }

    /// Delete the enriched document and provenance files a previous run left
    /// behind. The plain document and extracted images are overwritten anyway.
    pub fn remove_stale_outputs(&self) -> Result<(), PdfChatError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| PdfChatError::OutputWriteFailed {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut stale: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(is_provenance_file_name)
            })
            .collect();
        stale.push(self.enriched.clone());

        for path in stale {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale output {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PdfChatError::OutputWriteFailed { path, source: e }),
            }
        }
        Ok(())
    }
}

/// `image_description_<n>.txt`
fn is_provenance_file_name(name: &str) -> bool {
    name.strip_prefix("image_description_")
        .and_then(|rest| rest.strip_suffix(".txt"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Write `contents` to `path` via a temp file in the same folder plus rename,
/// so a reader never sees a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), PdfChatError> {
    let fail = |e: std::io::Error| PdfChatError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(fail)?;
    tmp.write_all(contents.as_bytes()).map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    Ok(())
}

/// How one placeholder was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Described,
    Failed,
    /// The asset was not on disk; the placeholder was left as-is.
    Missing,
}

/// Per-placeholder report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReport {
    /// 1-based number; `None` for missing assets, which are not numbered.
    pub number: Option<usize>,
    pub filename: String,
    /// Line index of the placeholder in the plain document.
    pub line: usize,
    pub status: ImageStatus,
    /// Description or failure text. Empty for missing assets.
    pub text: String,
    pub provenance_path: Option<PathBuf>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl ImageReport {
    pub fn missing(filename: &str, line: usize) -> Self {
        Self {
            number: None,
            filename: filename.to_string(),
            line,
            status: ImageStatus::Missing,
            text: String::new(),
            provenance_path: None,
            attempts: 0,
            duration_ms: 0,
        }
    }

    pub(crate) fn status_of(result: &DescriptionResult) -> ImageStatus {
        if result.is_success() {
            ImageStatus::Described
        } else {
            ImageStatus::Failed
        }
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Placeholder lines found in the plain document.
    pub placeholders: usize,
    /// Placeholders whose asset was missing.
    pub missing_images: usize,
    /// Numbered images whose description failed.
    pub failed_descriptions: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extract_duration_ms: u64,
    pub describe_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// The plain extracted Markdown.
    pub markdown: String,
    pub plain_path: PathBuf,
    /// `None` when image processing was disabled.
    pub enriched_path: Option<PathBuf>,
    /// Images that were found on disk and sent for description.
    pub image_count: usize,
    pub images: Vec<ImageReport>,
    pub stats: RunStats,
}

impl PipelineOutput {
    /// The document a conversation should be seeded with: the enriched file
    /// when one exists, else the plain Markdown.
    pub fn conversation_document(&self) -> Result<String, PdfChatError> {
        match &self.enriched_path {
            Some(p) => std::fs::read_to_string(p).map_err(|e| PdfChatError::OutputWriteFailed {
                path: p.clone(),
                source: e,
            }),
            None => Ok(self.markdown.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_uses_pdf_stem() {
        let l = OutputLayout::for_pdf(Path::new("out"), Path::new("/data/Annual Report.pdf"));
        assert_eq!(l.dir, PathBuf::from("out/Annual Report"));
        assert_eq!(l.plain, PathBuf::from("out/Annual Report/Annual Report.md"));
        assert_eq!(
            l.enriched,
            PathBuf::from("out/Annual Report/Annual Report_with_descriptions.md")
        );
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("a.md");
        write_atomic(&p, "first").unwrap();
        write_atomic(&p, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "second");
        // No stray temp files.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn atomic_write_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("nope").join("a.md");
        assert!(matches!(
            write_atomic(&p, "x").unwrap_err(),
            PdfChatError::OutputWriteFailed { .. }
        ));
    }

    #[test]
    fn stale_outputs_are_removed_and_others_kept() {
        let root = TempDir::new().unwrap();
        let l = OutputLayout::for_pdf(root.path(), Path::new("doc.pdf"));
        l.create().unwrap();
        for name in [
            "image_description_1.txt",
            "image_description_12.txt",
            "image_description_notes.txt",
            "doc.pdf-0-0.png",
        ] {
            std::fs::write(l.dir.join(name), "x").unwrap();
        }
        std::fs::write(&l.plain, "plain").unwrap();
        std::fs::write(&l.enriched, "old").unwrap();

        l.remove_stale_outputs().unwrap();

        let mut left: Vec<String> = std::fs::read_dir(&l.dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec!["doc.md", "doc.pdf-0-0.png", "image_description_notes.txt"]
        );

        // Nothing left to remove is not an error.
        l.remove_stale_outputs().unwrap();
    }

    #[test]
    fn report_serialises_status_in_snake_case() {
        let r = ImageReport::missing("x.png", 4);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"status\":\"missing\""), "got: {json}");
    }
}
