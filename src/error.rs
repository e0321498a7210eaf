//! Error types for the pdfchat library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PdfChatError`] — **Fatal**: the run cannot proceed at all (bad input
//!   file, extractor failure, provider not configured, output folder not
//!   writable). Returned as `Err(PdfChatError)` from [`crate::run()`].
//!
//! * [`DescriptionError`] — **Non-fatal**: one image could not be described
//!   (unreadable file, remote call failed). Stored inside
//!   [`crate::DescriptionResult::Failed`] and rendered inline in the enriched
//!   document, so the rest of the document is unaffected.
//!
//! * [`BackendError`] — what a [`crate::backend::ModelBackend`] call returns.
//!   The describer folds it into a `DescriptionError`; the conversation
//!   session lifts it into a `PdfChatError`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfchat library.
#[derive(Debug, Error)]
pub enum PdfChatError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The document extractor could not produce a stream.
    #[error("Failed to extract Markdown from '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or place the library next to the binary."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned a non-retryable error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The API returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}': {detail}")]
    RateLimitExceeded { provider: String, detail: String },

    /// The API call timed out.
    #[error("API call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The API rejected the credentials (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The model-listing endpoint could not be queried.
    #[error("Failed to list models from '{url}': {reason}")]
    ModelListFailed { url: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output folder or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfChatError {
    /// Lift a backend failure into a fatal error, for callers (the
    /// conversation session) that have no inline fallback.
    pub fn from_backend(provider: &str, err: BackendError) -> Self {
        match err {
            BackendError::Auth(detail) => PdfChatError::AuthError {
                provider: provider.to_string(),
                detail,
            },
            BackendError::RateLimited(detail) => PdfChatError::RateLimitExceeded {
                provider: provider.to_string(),
                detail,
            },
            BackendError::Timeout(secs) => PdfChatError::ApiTimeout { secs },
            other => PdfChatError::LlmApiError {
                message: other.to_string(),
            },
        }
    }
}

/// A failed call to a [`crate::backend::ModelBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BackendError {
    /// Credentials were rejected. Retrying will not help.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The provider signalled a rate limit.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// No response within the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The model answered with nothing usable.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// Transport failure or any other API error.
    #[error("API error: {0}")]
    Api(String),
}

impl BackendError {
    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited(_) | BackendError::Timeout(_) | BackendError::Api(_)
        )
    }

    /// Classify a provider error from its rendered message.
    ///
    /// Provider crates surface HTTP status codes inside their messages. A
    /// code only counts when it appears as a status (`status: 401`,
    /// `HTTP 401`, `(429)`), never as a bare number inside an id or a size.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let status = http_status(&lower);
        if matches!(status, Some(401 | 403))
            || lower.contains("unauthorized")
            || lower.contains("invalid api key")
            || lower.contains("incorrect api key")
            || lower.contains("authentication")
        {
            BackendError::Auth(message)
        } else if status == Some(429) || lower.contains("rate limit") || lower.contains("rate_limit")
        {
            BackendError::RateLimited(message)
        } else {
            BackendError::Api(message)
        }
    }
}

static RE_HTTP_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\bstatus(?:\s+code)?\s*[:=]?\s*|\bhttp(?:/[\d.]+)?\s+|\()([1-5]\d{2})\b").unwrap()
});

/// The first status code in a lower-cased provider message.
fn http_status(lower: &str) -> Option<u16> {
    RE_HTTP_STATUS
        .captures(lower)
        .and_then(|caps| caps[1].parse().ok())
}

/// Why a single image could not be described.
///
/// Rendered into the enriched document as
/// `Error in image description: <this message>`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DescriptionError {
    /// The image file vanished or could not be read between scan and call.
    #[error("could not read image '{}': {detail}", path.display())]
    ImageUnreadable { path: PathBuf, detail: String },

    /// The remote model call failed after all retries.
    #[error("{source} (after {attempts} attempt(s))")]
    Model {
        source: BackendError,
        attempts: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_auth_errors() {
        let e = BackendError::classify("HTTP 401 Unauthorized: Incorrect API key provided");
        assert!(matches!(e, BackendError::Auth(_)));
        assert!(!e.is_retryable());
    }

    #[test]
    fn classify_rate_limit() {
        let e = BackendError::classify("Rate limit reached for gpt-4o-mini (429)");
        assert!(matches!(e, BackendError::RateLimited(_)));
        assert!(e.is_retryable());
    }

    #[test]
    fn status_codes_need_status_context() {
        let e = BackendError::classify("status: 403 Forbidden");
        assert!(matches!(e, BackendError::Auth(_)));

        let e = BackendError::classify("upstream 502 after 4013 bytes, request id req_401f403");
        assert!(matches!(e, BackendError::Api(_)));
        assert!(e.is_retryable());

        let e = BackendError::classify("HTTP/1.1 429 Too Many Requests");
        assert!(matches!(e, BackendError::RateLimited(_)));
    }

    #[test]
    fn classify_generic_api_error() {
        let e = BackendError::classify("connection reset by peer");
        assert_eq!(e, BackendError::Api("connection reset by peer".into()));
        assert!(e.is_retryable());
    }

    #[test]
    fn empty_response_is_not_retried() {
        assert!(!BackendError::EmptyResponse.is_retryable());
    }

    #[test]
    fn description_error_display_includes_attempts() {
        let e = DescriptionError::Model {
            source: BackendError::RateLimited("slow down".into()),
            attempts: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("rate limit exceeded"), "got: {msg}");
        assert!(msg.contains("3 attempt"), "got: {msg}");
    }

    #[test]
    fn backend_error_lifts_into_fatal_variants() {
        let e = PdfChatError::from_backend("openai", BackendError::Auth("bad key".into()));
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("bad key"));

        let e = PdfChatError::from_backend("openai", BackendError::Timeout(30));
        assert!(e.to_string().contains("30s"));

        let e = PdfChatError::from_backend("openai", BackendError::EmptyResponse);
        assert!(matches!(e, PdfChatError::LlmApiError { .. }));
    }

    #[test]
    fn missing_credential_display() {
        let e = PdfChatError::ProviderNotConfigured {
            provider: "auto".into(),
            hint: "Set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }
}
