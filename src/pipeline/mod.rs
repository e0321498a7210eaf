//! Pipeline stages for image-context description.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the extractor or model can be swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ context ──▶ encode ──▶ describe ──▶ postprocess ──▶ reconstruct
//! (%PDF)    (pdfium)    (windows)  (base64)   (VLM)        (cleanup)       (splice)
//! ```
//!
//! 1. [`input`]    — validate the user-supplied path
//! 2. [`extract`]  — PDF → Markdown with `![](file)` placeholders; blocking,
//!    run on `spawn_blocking`
//! 3. [`context`]  — before/after line windows around each placeholder
//! 4. [`encode`]   — base64-wrap asset bytes for the multimodal request
//! 5. [`describe`] — the model call with retry/backoff; the only stage with
//!    network I/O, and it never fails the run
//! 6. [`postprocess`] — deterministic cleanup of the model answer
//! 7. [`reconstruct`] — insert description blocks, emit provenance records

pub mod context;
pub mod describe;
pub mod encode;
pub mod extract;
pub mod input;
pub mod postprocess;
pub mod reconstruct;
