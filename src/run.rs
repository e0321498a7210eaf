//! Pipeline orchestration: PDF → plain Markdown → described images →
//! enriched Markdown.
//!
//! ## Step order
//!
//! 1. Validate the input and, when images will be described, resolve the
//!    backend. A missing credential is rejected here, before anything is
//!    written.
//! 2. Clear outputs of an earlier run, extract on a blocking thread and
//!    persist `{name}.md` immediately, so a later failure still leaves the
//!    plain document behind.
//! 3. One linear scan assigns image numbers and context windows in document
//!    order. Missing assets are reported and skipped.
//! 4. Describe through an order-preserving buffered stream; each provenance
//!    file is written as its result is yielded.
//! 5. Reconstruct and persist `{name}_with_descriptions.md`.
//!
//! ## Why `buffered`, not `buffer_unordered`?
//!
//! Numbers, provenance files and the enriched document must come out in
//! document order whatever the latency of individual calls. `buffered`
//! still runs up to `concurrency` requests at once but yields in input order.

use crate::backend::{resolve_backend, ModelBackend};
use crate::config::{PipelineConfig, DEFAULT_DESCRIPTION_MODEL};
use crate::document::{DocumentStream, StreamItem};
use crate::error::PdfChatError;
use crate::output::{write_atomic, ImageReport, OutputLayout, PipelineOutput, RunStats};
use crate::pipeline::context::{ContextWindow, RollingContext};
use crate::pipeline::describe::{describe_file, DescribeOptions};
use crate::pipeline::extract::{DocumentExtractor, PdfiumExtractor};
use crate::pipeline::input;
use crate::pipeline::reconstruct::{reconstruct, ProvenanceRecord, Resolution};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Extracting,
    DescribingImages,
    Reconstructing,
    Done,
    Failed,
}

impl RunState {
    /// Legal forward moves. No state is ever re-entered.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Extracting)
                | (Extracting, Done)
                | (Extracting, Failed)
                | (Extracting, DescribingImages)
                | (DescribingImages, Reconstructing)
                | (Reconstructing, Done)
        )
    }
}

/// Validates transitions and reports them to the progress callback.
struct RunTracker {
    state: RunState,
    callback: Option<ProgressCallback>,
}

impl RunTracker {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            state: RunState::Idle,
            callback,
        }
    }

    fn advance(&mut self, next: RunState) -> Result<(), PdfChatError> {
        if !self.state.can_transition_to(next) {
            return Err(PdfChatError::Internal(format!(
                "invalid run transition {:?} → {:?}",
                self.state, next
            )));
        }
        debug!("Run state {:?} → {:?}", self.state, next);
        self.state = next;
        if let Some(ref cb) = self.callback {
            cb.on_stage(next);
        }
        Ok(())
    }
}

/// One placeholder whose asset exists, numbered during the scan.
#[derive(Debug, Clone)]
struct ImageJob {
    index: usize,
    number: usize,
    filename: String,
    path: PathBuf,
    window: ContextWindow,
}

/// Run the whole pipeline on one PDF.
///
/// # Returns
/// `Ok(PipelineOutput)` even when some descriptions failed; failed images
/// carry their failure text inline and in `output.images`.
///
/// # Errors
/// Only for fatal conditions: invalid input file, missing credential,
/// extraction failure, or an output file that cannot be written.
pub async fn run(
    pdf_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PdfChatError> {
    let total_start = Instant::now();
    let pdf = input::resolve_pdf(pdf_path.as_ref())?;
    info!("Starting pipeline: {}", pdf.display());

    // ── Step 1: Resolve backend before any output exists ─────────────────
    let backend = if config.process_images {
        Some(config_backend(config)?)
    } else {
        None
    };

    let layout = OutputLayout::for_pdf(&config.output_root, &pdf);
    let mut tracker = RunTracker::new(config.progress_callback.clone());

    // ── Step 2: Extract and persist the plain document ───────────────────
    tracker.advance(RunState::Extracting)?;
    let extract_start = Instant::now();
    let markdown = match extract_document(&pdf, &layout, config).await {
        Ok(md) => md,
        Err(e) => {
            warn!("Extraction failed: {}", e);
            tracker.advance(RunState::Failed)?;
            return Err(e);
        }
    };
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} bytes of Markdown in {}ms → {}",
        markdown.len(),
        extract_duration_ms,
        layout.plain.display()
    );

    let stream = DocumentStream::parse(&markdown);
    let mut stats = RunStats {
        placeholders: stream.placeholders().count(),
        extract_duration_ms,
        ..Default::default()
    };

    let Some(backend) = backend else {
        tracker.advance(RunState::Done)?;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        return Ok(PipelineOutput {
            markdown,
            plain_path: layout.plain,
            enriched_path: None,
            image_count: 0,
            images: Vec::new(),
            stats,
        });
    };

    // ── Step 3: Scan ─────────────────────────────────────────────────────
    tracker.advance(RunState::DescribingImages)?;
    let (jobs, mut images) = scan(&stream, &layout.dir, config);
    stats.missing_images = images.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_complete(stats.placeholders, jobs.len());
    }
    info!(
        "Found {} image placeholder(s), {} with assets on disk",
        stats.placeholders,
        jobs.len()
    );

    // ── Step 4: Describe in document order ───────────────────────────────
    let describe_start = Instant::now();
    let options = DescribeOptions::from_config(config);
    let image_count = jobs.len();
    let mut resolutions = Vec::with_capacity(image_count);

    {
        let backend: &dyn ModelBackend = backend.as_ref();
        let options = &options;
        let callback = config.progress_callback.as_ref();

        let mut described = stream::iter(jobs.into_iter().map(move |job| async move {
            if let Some(cb) = callback {
                cb.on_image_start(job.number, &job.filename);
            }
            let description = describe_file(backend, &job.path, &job.window, options).await;
            (job, description)
        }))
        .buffered(config.concurrency.max(1));

        while let Some((job, description)) = described.next().await {
            let text = description.result.text();
            match (&description.result, callback) {
                (r, Some(cb)) if r.is_success() => {
                    cb.on_image_complete(job.number, &job.filename, text.len())
                }
                (_, Some(cb)) => cb.on_image_error(job.number, &job.filename, &text),
                (_, None) => {}
            }
            if !description.result.is_success() {
                stats.failed_descriptions += 1;
            }
            stats.total_input_tokens += description.prompt_tokens;
            stats.total_output_tokens += description.completion_tokens;

            let resolution = Resolution {
                index: job.index,
                number: job.number,
                filename: job.filename,
                window: job.window,
                result: description.result,
            };
            let provenance_path =
                ProvenanceRecord::from_resolution(&resolution).write_to(&layout.dir)?;

            images.push(ImageReport {
                number: Some(resolution.number),
                filename: resolution.filename.clone(),
                line: resolution.index,
                status: ImageReport::status_of(&resolution.result),
                text,
                provenance_path: Some(provenance_path),
                attempts: description.attempts,
                duration_ms: description.duration_ms,
            });
            resolutions.push(resolution);
        }
    }
    stats.describe_duration_ms = describe_start.elapsed().as_millis() as u64;

    // ── Step 5: Reconstruct ──────────────────────────────────────────────
    tracker.advance(RunState::Reconstructing)?;
    let (enriched, records) = reconstruct(&stream, &resolutions);
    debug!("Reconstructed document with {} description block(s)", records.len());
    write_atomic(&layout.enriched, &enriched.to_markdown())?;
    tracker.advance(RunState::Done)?;

    images.sort_by_key(|r| r.line);
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Pipeline complete: {} image(s) described ({} failed, {} missing), {}ms total",
        image_count, stats.failed_descriptions, stats.missing_images, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(image_count, stats.failed_descriptions);
    }

    Ok(PipelineOutput {
        markdown,
        plain_path: layout.plain,
        enriched_path: Some(layout.enriched),
        image_count,
        images,
        stats,
    })
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    pdf_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PdfChatError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfChatError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(pdf_path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// A pre-built backend wins; otherwise fall back to provider resolution.
fn config_backend(config: &PipelineConfig) -> Result<Arc<dyn ModelBackend>, PdfChatError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    resolve_backend(
        config.provider_name.as_deref(),
        config.model.as_deref(),
        DEFAULT_DESCRIPTION_MODEL,
    )
}

/// Create the output folder, run the extractor off the async workers, and
/// persist the plain Markdown.
async fn extract_document(
    pdf: &Path,
    layout: &OutputLayout,
    config: &PipelineConfig,
) -> Result<String, PdfChatError> {
    layout.create()?;
    layout.remove_stale_outputs()?;

    let extractor: Arc<dyn DocumentExtractor> = match config.extractor {
        Some(ref e) => Arc::clone(e),
        None => Arc::new(PdfiumExtractor::new()),
    };
    let pdf = pdf.to_path_buf();
    let dir = layout.dir.clone();
    let password = config.password.clone();

    let markdown = tokio::task::spawn_blocking(move || {
        extractor.extract(&pdf, &dir, password.as_deref())
    })
    .await
    .map_err(|e| PdfChatError::Internal(format!("Extraction task panicked: {}", e)))??;

    write_atomic(&layout.plain, &markdown)?;
    Ok(markdown)
}

/// Single pass over the stream: number resolvable placeholders and capture
/// their windows. Missing assets come back as reports.
fn scan(
    stream: &DocumentStream,
    asset_dir: &Path,
    config: &PipelineConfig,
) -> (Vec<ImageJob>, Vec<ImageReport>) {
    let lines = stream.lines();
    let mut rolling = RollingContext::new(config.context_size);
    let mut jobs = Vec::new();
    let mut missing = Vec::new();

    for (index, (line, item)) in lines.iter().zip(stream.items()).enumerate() {
        if let StreamItem::ImagePlaceholder { filename } = item {
            let path = asset_dir.join(filename);
            if path.is_file() {
                jobs.push(ImageJob {
                    index,
                    number: jobs.len() + 1,
                    filename: filename.clone(),
                    path,
                    window: rolling.window(lines, index),
                });
            } else {
                warn!("Image file not found, leaving placeholder: {}", path.display());
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_missing(filename);
                }
                missing.push(ImageReport::missing(filename, index));
            }
        }
        rolling.push(line);
    }

    (jobs, missing)
}
