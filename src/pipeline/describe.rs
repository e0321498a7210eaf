//! Image description: one figure plus its context → one model call.
//!
//! This is the only stage with network I/O. It never returns `Err`: every
//! failure is folded into [`DescriptionResult::Failed`] so one bad image
//! cannot abort the document.
//!
//! ## Retry Strategy
//!
//! Rate limits, timeouts and generic API errors are retried with exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`). Authentication failures and
//! empty answers are returned immediately.

use crate::backend::{complete_with_timeout, ModelBackend, ModelRequest, Turn};
use crate::config::PipelineConfig;
use crate::error::{BackendError, DescriptionError};
use crate::pipeline::context::ContextWindow;
use crate::pipeline::encode::encode_image;
use crate::pipeline::postprocess::clean_description;
use crate::prompts::{description_prompt, DEFAULT_DESCRIPTION_PROMPT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Prefix of the inline text that replaces a failed description.
pub const FAILURE_PREFIX: &str = "Error in image description:";

/// What the describer produced for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum DescriptionResult {
    Described(String),
    Failed(DescriptionError),
}

impl DescriptionResult {
    /// The text spliced into the document and written to provenance.
    pub fn text(&self) -> String {
        match self {
            DescriptionResult::Described(text) => text.clone(),
            DescriptionResult::Failed(err) => format!("{FAILURE_PREFIX} {err}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DescriptionResult::Described(_))
    }
}

/// A [`DescriptionResult`] with call accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub result: DescriptionResult,
    /// Backend calls made, including retries (0 if the image was unreadable).
    pub attempts: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub duration_ms: u64,
}

/// Per-call knobs, lifted out of [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct DescribeOptions {
    pub template: String,
    pub instructions: String,
    pub temperature: Option<f32>,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub api_timeout_secs: u64,
}

impl DescribeOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            template: config
                .description_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION_PROMPT.to_string()),
            instructions: config.instructions.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Read `path` and describe it. A read failure becomes a failed result.
pub async fn describe_file(
    backend: &dyn ModelBackend,
    path: &Path,
    window: &ContextWindow,
    options: &DescribeOptions,
) -> Description {
    match tokio::fs::read(path).await {
        Ok(bytes) => describe(backend, &bytes, window, options).await,
        Err(e) => {
            warn!("Could not read image {}: {}", path.display(), e);
            Description {
                result: DescriptionResult::Failed(DescriptionError::ImageUnreadable {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                }),
                attempts: 0,
                prompt_tokens: 0,
                completion_tokens: 0,
                duration_ms: 0,
            }
        }
    }
}

/// Upper bound on a single retry delay.
const MAX_BACKOFF_MS: u64 = 60_000;

/// `base * 2^(attempt-1)`, saturating and capped at [`MAX_BACKOFF_MS`].
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Describe one image given its context windows.
///
/// The request is a single user turn carrying the prompt text and the image.
pub async fn describe(
    backend: &dyn ModelBackend,
    image_bytes: &[u8],
    window: &ContextWindow,
    options: &DescribeOptions,
) -> Description {
    let start = Instant::now();
    let prompt = description_prompt(&options.template, window, &options.instructions);
    let request = ModelRequest {
        turns: vec![Turn::user(prompt)],
        image: Some(encode_image(image_bytes)),
        temperature: options.temperature,
        max_tokens: Some(options.max_tokens),
    };

    let mut attempts = 0u32;
    let mut last_err = BackendError::EmptyResponse;

    for attempt in 0..=options.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(options.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                backend.label(),
                attempt,
                options.max_retries,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }
        attempts += 1;

        let outcome = complete_with_timeout(backend, request.clone(), options.api_timeout_secs)
            .await
            .and_then(|reply| {
                let cleaned = clean_description(&reply.content);
                if cleaned.is_empty() {
                    Err(BackendError::EmptyResponse)
                } else {
                    Ok((cleaned, reply))
                }
            });

        match outcome {
            Ok((text, reply)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    "Described image in {}ms ({} chars, {} attempt(s))",
                    duration_ms,
                    text.len(),
                    attempts
                );
                return Description {
                    result: DescriptionResult::Described(text),
                    attempts,
                    prompt_tokens: reply.prompt_tokens,
                    completion_tokens: reply.completion_tokens,
                    duration_ms,
                };
            }
            Err(e) => {
                warn!("{}: attempt {} failed: {}", backend.label(), attempts, e);
                let retry = e.is_retryable();
                last_err = e;
                if !retry {
                    break;
                }
            }
        }
    }

    Description {
        result: DescriptionResult::Failed(DescriptionError::Model {
            source: last_err,
            attempts,
        }),
        attempts,
        prompt_tokens: 0,
        completion_tokens: 0,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}
