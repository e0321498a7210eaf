//! Input validation: check a user-supplied path before any work starts.
//!
//! ## Why check the magic bytes ourselves?
//!
//! pdfium reports a non-PDF as a generic format error, which reads like a
//! corrupt document. Looking for `%PDF` first gives the user a meaningful
//! error and keeps the output folder from being created for a typo.

use crate::error::PdfChatError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What kind of document a chat session was pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDocument {
    /// A PDF that still has to go through the pipeline.
    Pdf(PathBuf),
    /// An already-extracted (possibly enriched) Markdown file.
    Markdown(PathBuf),
}

impl SourceDocument {
    pub fn path(&self) -> &Path {
        match self {
            SourceDocument::Pdf(p) | SourceDocument::Markdown(p) => p,
        }
    }
}

/// Validate that `path` exists, is readable, and starts with `%PDF`.
pub fn resolve_pdf(path: &Path) -> Result<PathBuf, PdfChatError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(PdfChatError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => {}
                // Wrong magic, or shorter than four bytes.
                _ => return Err(PdfChatError::NotAPdf { path, magic }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfChatError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PdfChatError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Decide whether `path` is a PDF or a Markdown file.
///
/// `.md` / `.markdown` files are taken as-is; everything else must pass
/// [`resolve_pdf`].
pub fn resolve_source(path: &Path) -> Result<SourceDocument, PdfChatError> {
    let is_markdown = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false);

    if is_markdown {
        if !path.is_file() {
            return Err(PdfChatError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        return Ok(SourceDocument::Markdown(path.to_path_buf()));
    }
    resolve_pdf(path).map(SourceDocument::Pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_pdf(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, PdfChatError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("fake.pdf");
        std::fs::write(&p, b"PK\x03\x04zip").unwrap();
        let err = resolve_pdf(&p).unwrap_err();
        assert!(matches!(err, PdfChatError::NotAPdf { magic, .. } if &magic == b"PK\x03\x04"));
    }

    #[test]
    fn tiny_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("tiny.pdf");
        std::fs::write(&p, b"%P").unwrap();
        assert!(matches!(
            resolve_pdf(&p).unwrap_err(),
            PdfChatError::NotAPdf { .. }
        ));
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("ok.pdf");
        std::fs::write(&p, b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_pdf(&p).unwrap(), p);
    }

    #[test]
    fn markdown_sources_skip_the_magic_check() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("notes.MD");
        std::fs::write(&p, "# Notes").unwrap();
        assert_eq!(resolve_source(&p).unwrap(), SourceDocument::Markdown(p.clone()));

        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        assert!(matches!(resolve_source(&pdf).unwrap(), SourceDocument::Pdf(_)));
    }
}
