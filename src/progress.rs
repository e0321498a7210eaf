//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to follow a run
//! stage by stage and image by image.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a terminal progress bar, a channel or a log
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because descriptions may run concurrently.
//!
//! # Example
//!
//! ```rust
//! use pdfchat::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl PipelineProgressCallback for Counter {
//!     fn on_image_complete(&self, number: usize, filename: &str, len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("image {number} ({filename}): {len} chars");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::run::RunState;
use std::sync::Arc;

/// Called by the orchestrator as a run progresses.
///
/// All methods default to no-ops. With `concurrency > 1` the per-image start
/// events may interleave; completion events always arrive in document order.
pub trait PipelineProgressCallback: Send + Sync {
    /// The run entered `state`.
    fn on_stage(&self, state: RunState) {
        let _ = state;
    }

    /// The scan finished.
    ///
    /// * `placeholders`: placeholder lines found
    /// * `resolvable`: of those, how many have an asset on disk
    fn on_scan_complete(&self, placeholders: usize, resolvable: usize) {
        let _ = (placeholders, resolvable);
    }

    /// A description request for image `number` is about to be sent.
    fn on_image_start(&self, number: usize, filename: &str) {
        let _ = (number, filename);
    }

    /// Image `number` was described; `description_len` is in bytes.
    fn on_image_complete(&self, number: usize, filename: &str, description_len: usize) {
        let _ = (number, filename, description_len);
    }

    /// Image `number` could not be described; its failure text was inlined.
    fn on_image_error(&self, number: usize, filename: &str, error: &str) {
        let _ = (number, filename, error);
    }

    /// A placeholder's asset was not found and was left unresolved.
    fn on_image_missing(&self, filename: &str) {
        let _ = filename;
    }

    /// Called once after the enriched document was written.
    fn on_run_complete(&self, image_count: usize, failed: usize) {
        let _ = (image_count, failed);
    }
}

/// Callback that ignores every event.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
