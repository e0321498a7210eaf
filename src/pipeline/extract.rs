//! Document extraction: PDF → Markdown text with one placeholder per image.
//!
//! The pipeline only needs a line-based stream, so extraction sits behind
//! [`DocumentExtractor`]. [`PdfiumExtractor`] is the production
//! implementation; tests inject a fake that writes canned Markdown and image
//! files.
//!
//! ## Why write images straight into the output folder?
//!
//! Placeholders name assets relative to the folder the enriched document
//! lives in. Writing them there at extraction time means the scan can
//! resolve `![](name)` with a single `join` and nothing has to be moved
//! afterwards.
//!
//! ## Why blocking?
//!
//! pdfium is a C++ library with thread-local state. The trait is synchronous
//! and the orchestrator calls it from `tokio::task::spawn_blocking`.

use crate::document::{classify_line, placeholder_line, StreamItem};
use crate::error::PdfChatError;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Line inserted between pages.
pub const PAGE_SEPARATOR: &str = "-----";

/// Turns a PDF into Markdown and writes its embedded images into `image_dir`.
pub trait DocumentExtractor: Send + Sync {
    fn extract(
        &self,
        pdf: &Path,
        image_dir: &Path,
        password: Option<&str>,
    ) -> Result<String, PdfChatError>;
}

/// Extractor backed by the pdfium library.
///
/// Binding order: explicit library path, `PDFIUM_LIB_PATH`, a library next
/// to the working directory, then the system library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a specific library file (or a directory containing it).
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, PdfChatError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => {
                let path = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&path)
                } else {
                    path
                };
                debug!("Binding pdfium from {}", path.display());
                Pdfium::bind_to_library(&path)
            }
            None => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| PdfChatError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl DocumentExtractor for PdfiumExtractor {
    fn extract(
        &self,
        pdf: &Path,
        image_dir: &Path,
        password: Option<&str>,
    ) -> Result<String, PdfChatError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(pdf, password)
            .map_err(|e| load_error(pdf, password, &format!("{:?}", e)))?;

        let prefix = asset_prefix(pdf);
        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut extracted = Vec::with_capacity(pages.len() as usize);
        for (page_index, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| PdfChatError::ExtractionFailed {
                    path: pdf.to_path_buf(),
                    detail: format!("page {}: {:?}", page_index + 1, e),
                })?
                .all();

            let mut images = Vec::new();
            for object in page.objects().iter() {
                let Some(image_object) = object.as_image_object() else {
                    continue;
                };
                let raw = match image_object.get_raw_image() {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!("Page {}: skipping unreadable image ({:?})", page_index + 1, e);
                        continue;
                    }
                };
                let filename = asset_filename(&prefix, page_index, images.len());
                let target = image_dir.join(&filename);
                raw.save_with_format(&target, ImageFormat::Png)
                    .map_err(|e| PdfChatError::OutputWriteFailed {
                        path: target.clone(),
                        source: std::io::Error::other(e.to_string()),
                    })?;
                images.push(filename);
            }

            debug!(
                "Page {}: {} chars of text, {} image(s)",
                page_index + 1,
                text.len(),
                images.len()
            );
            extracted.push(PageContent { text, images });
        }

        Ok(assemble_pages(&extracted))
    }
}

/// Text and asset filenames gathered from one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub text: String,
    pub images: Vec<String>,
}

/// Lay out extracted pages as Markdown.
///
/// Each page contributes its text lines followed by one placeholder line per
/// image; pages are separated by [`PAGE_SEPARATOR`].
pub fn assemble_pages(pages: &[PageContent]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
            lines.push(PAGE_SEPARATOR.to_string());
            lines.push(String::new());
        }
        lines.extend(page.text.lines().map(|l| escape_text_line(l.trim_end())));
        for image in &page.images {
            lines.push(String::new());
            lines.push(placeholder_line(image));
        }
    }
    lines.join("\n")
}

/// `report.pdf` → `report.pdf`; assets are named `<prefix>-<page>-<n>.png`.
///
/// Characters that would break the `![](name)` line (brackets, parentheses,
/// whitespace, path separators) become `_`.
fn asset_prefix(pdf: &Path) -> String {
    pdf.file_name()
        .map(|n| {
            n.to_string_lossy()
                .chars()
                .map(|c| match c {
                    '(' | ')' | '[' | ']' | '/' | '\\' => '_',
                    c if c.is_whitespace() => '_',
                    c => c,
                })
                .collect()
        })
        .unwrap_or_else(|| "document.pdf".to_string())
}

/// Page text that happens to read as a placeholder is escaped, so only the
/// lines written for extracted images are ever resolved against disk.
fn escape_text_line(line: &str) -> String {
    match classify_line(line) {
        StreamItem::ImagePlaceholder { .. } => format!("\\{line}"),
        StreamItem::Text | StreamItem::Table => line.to_string(),
    }
}

fn asset_filename(prefix: &str, page_index: usize, image_index: usize) -> String {
    format!("{prefix}-{page_index}-{image_index}.png")
}

/// Map a pdfium load failure onto the fatal error it represents.
fn load_error(pdf: &Path, password: Option<&str>, detail: &str) -> PdfChatError {
    if detail.to_lowercase().contains("password") {
        if password.is_some() {
            PdfChatError::WrongPassword {
                path: pdf.to_path_buf(),
            }
        } else {
            PdfChatError::PasswordRequired {
                path: pdf.to_path_buf(),
            }
        }
    } else {
        PdfChatError::CorruptPdf {
            path: pdf.to_path_buf(),
            detail: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStream;

    #[test]
    fn asset_names_follow_pdf_filename() {
        let prefix = asset_prefix(Path::new("/tmp/in/report.pdf"));
        assert_eq!(asset_filename(&prefix, 0, 1), "report.pdf-0-1.png");
    }

    #[test]
    fn awkward_pdf_names_still_yield_placeholders() {
        let prefix = asset_prefix(Path::new("/tmp/in/Report (final) [v2].pdf"));
        let name = asset_filename(&prefix, 0, 0);
        assert_eq!(name, "Report__final___v2_.pdf-0-0.png");
        assert_eq!(
            classify_line(&placeholder_line(&name)),
            StreamItem::ImagePlaceholder { filename: name }
        );
    }

    #[test]
    fn page_text_never_becomes_a_placeholder() {
        let pages = vec![PageContent {
            text: "Intro\n![](/home/u/.ssh/id_rsa)\n  ![](notes.png)".into(),
            images: vec!["r.pdf-0-0.png".into()],
        }];
        let stream = DocumentStream::parse(&assemble_pages(&pages));
        let found: Vec<_> = stream.placeholders().collect();
        assert_eq!(found, vec![(4, "r.pdf-0-0.png")]);
        assert_eq!(stream.items()[1], StreamItem::Text);
        assert_eq!(stream.lines()[2], "\\  ![](notes.png)");
    }

    #[test]
    fn pages_are_separated_and_images_follow_text() {
        let pages = vec![
            PageContent {
                text: "Title\nIntro   ".into(),
                images: vec!["r.pdf-0-0.png".into()],
            },
            PageContent {
                text: "Second page".into(),
                images: vec![],
            },
        ];
        let md = assemble_pages(&pages);
        assert_eq!(
            md,
            "Title\nIntro\n\n![](r.pdf-0-0.png)\n\n-----\n\nSecond page"
        );

        let stream = DocumentStream::parse(&md);
        let found: Vec<_> = stream.placeholders().collect();
        assert_eq!(found, vec![(3, "r.pdf-0-0.png")]);
        assert_eq!(stream.items()[5], StreamItem::Text);
    }

    #[test]
    fn empty_document_is_empty_text() {
        assert_eq!(assemble_pages(&[]), "");
    }

    #[test]
    fn password_failures_are_distinguished() {
        let p = Path::new("locked.pdf");
        assert!(matches!(
            load_error(p, None, "PdfiumLibraryInternalError(PasswordError)"),
            PdfChatError::PasswordRequired { .. }
        ));
        assert!(matches!(
            load_error(p, Some("guess"), "PasswordError"),
            PdfChatError::WrongPassword { .. }
        ));
        assert!(matches!(
            load_error(p, None, "FormatError"),
            PdfChatError::CorruptPdf { .. }
        ));
    }
}
