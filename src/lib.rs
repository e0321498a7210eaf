//! # pdfchat
//!
//! Describe the images inside a PDF in the context of the text around them,
//! then chat with the enriched document.
//!
//! ## Why this crate?
//!
//! Text extraction loses figures entirely: a chart becomes a gap in the
//! Markdown and any question about it is unanswerable. This crate keeps the
//! extractor's text, finds each image placeholder, and asks a vision model
//! to describe the image *given the lines before and after it*. The answer
//! is spliced in right below the placeholder, so a text-only model reading
//! the result knows what every figure shows and why it is there.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input        check the file is a PDF
//!  ├─ 2. Extract      pdfium → Markdown + images (spawn_blocking) → {name}.md
//!  ├─ 3. Scan         number placeholders, carve context windows
//!  ├─ 4. Describe     image + context → vision model (retry, timeout)
//!  ├─ 5. Polish       deterministic cleanup of each answer
//!  └─ 6. Reconstruct  splice descriptions → {name}_with_descriptions.md
//!                     + image_description_{n}.txt per image
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfchat::{run, ChatConfig, ConversationSession, PipelineConfig};
//! use pdfchat::backend::resolve_backend;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::builder()
//!         .instructions("This is a quarterly sales report.")
//!         .build()?;
//!     let output = run("report.pdf", &config).await?;
//!     eprintln!("{} image(s) described", output.image_count);
//!
//!     let chat = ChatConfig::default();
//!     let backend = resolve_backend(None, Some(&chat.model), &chat.model)?;
//!     let mut session = ConversationSession::seeded(&output.conversation_document()?);
//!     println!("{}", session.ask(backend.as_ref(), "What does figure 1 show?", &chat).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfchat = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod chat;
pub mod config;
pub mod document;
pub mod error;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{ModelBackend, ModelReply, ModelRequest, ProviderBackend, Role, Turn};
pub use chat::ConversationSession;
pub use config::{ChatConfig, PipelineConfig, PipelineConfigBuilder};
pub use document::{DocumentStream, StreamItem};
pub use error::{BackendError, DescriptionError, PdfChatError};
pub use models::list_models;
pub use output::{ImageReport, ImageStatus, PipelineOutput, RunStats};
pub use pipeline::context::{build_context, ContextWindow, RollingContext};
pub use pipeline::describe::{describe, DescribeOptions, Description, DescriptionResult};
pub use pipeline::extract::{DocumentExtractor, PdfiumExtractor};
pub use pipeline::reconstruct::{reconstruct, EnrichedDocument, ProvenanceRecord, Resolution};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{run, run_sync, RunState};
