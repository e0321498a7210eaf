//! Configuration types for the description pipeline and the chat session.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The conversation layer has its own, much
//! smaller [`ChatConfig`].

use crate::backend::ModelBackend;
use crate::error::PdfChatError;
use crate::pipeline::extract::DocumentExtractor;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of lines on each side of an image used as context.
pub const DEFAULT_CONTEXT_SIZE: usize = 100;

/// Model used for image descriptions when none is configured.
pub const DEFAULT_DESCRIPTION_MODEL: &str = "gpt-4o-mini";

/// Model used for the conversation when none is configured.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use pdfchat::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .context_size(50)
///     .instructions("Focus on the axis labels of every chart.")
///     .output_root("out")
///     .build()
///     .unwrap();
/// assert_eq!(config.context_size, 50);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Lines of surrounding text on each side of an image. Default: 100.
    ///
    /// The unit is lines of the extracted Markdown, not words. Must be ≥ 1.
    pub context_size: usize,

    /// Describe images at all. Default: true.
    ///
    /// When false only the plain Markdown is written and no model is needed.
    pub process_images: bool,

    /// Free-form caller instructions appended to every description prompt.
    pub instructions: String,

    /// Replacement for the built-in description instruction template.
    pub description_prompt: Option<String>,

    /// Model identifier for descriptions, e.g. "gpt-4o". If None, uses
    /// [`DEFAULT_DESCRIPTION_MODEL`] for OpenAI or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// Sampling temperature. None leaves the provider default.
    pub temperature: Option<f32>,

    /// Response-length budget per description. Default: 500.
    pub max_tokens: usize,

    /// Retries on a retryable model failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds; 0 disables it. Default: 60.
    pub api_timeout_secs: u64,

    /// Descriptions in flight at once. Default: 1 (strict document order).
    ///
    /// Numbering and output order never depend on this value.
    pub concurrency: usize,

    /// Folder under which `<pdf-stem>/` is created. Default: `pdf_output`.
    pub output_root: PathBuf,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Replacement for the pdfium extractor.
    pub extractor: Option<Arc<dyn DocumentExtractor>>,

    /// Receives per-stage and per-image events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_size: DEFAULT_CONTEXT_SIZE,
            process_images: true,
            instructions: String::new(),
            description_prompt: None,
            model: None,
            provider_name: None,
            backend: None,
            temperature: None,
            max_tokens: 500,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            concurrency: 1,
            output_root: PathBuf::from("pdf_output"),
            password: None,
            extractor: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("context_size", &self.context_size)
            .field("process_images", &self.process_images)
            .field("instructions", &self.instructions)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.label().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("output_root", &self.output_root)
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn DocumentExtractor>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn context_size(mut self, lines: usize) -> Self {
        self.config.context_size = lines;
        self
    }

    pub fn process_images(mut self, v: bool) -> Self {
        self.config.process_images = v;
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = text.into();
        self
    }

    pub fn description_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.description_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_root = dir.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PdfChatError> {
        let c = &self.config;
        if c.context_size == 0 {
            return Err(PdfChatError::InvalidConfig(
                "Context size must be ≥ 1 line".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(PdfChatError::InvalidConfig(
                "Description max_tokens must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(PdfChatError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Settings for a [`crate::chat::ConversationSession`].
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Completion model for the conversation. Default: gpt-4o-mini.
    pub model: String,
    /// Default: 0.7.
    pub temperature: f32,
    /// Response-length budget per answer. Default: 300.
    pub max_tokens: usize,
    /// Per-call timeout in seconds; 0 disables it. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 300,
            api_timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.context_size, 100);
        assert!(c.process_images);
        assert_eq!(c.max_tokens, 500);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.output_root, PathBuf::from("pdf_output"));
    }

    #[test]
    fn zero_context_size_is_rejected() {
        let err = PipelineConfig::builder().context_size(0).build().unwrap_err();
        assert!(matches!(err, PdfChatError::InvalidConfig(_)));
    }

    #[test]
    fn single_line_context_is_allowed() {
        let c = PipelineConfig::builder().context_size(1).build().unwrap();
        assert_eq!(c.context_size, 1);
    }

    #[test]
    fn concurrency_is_floored_at_one() {
        let c = PipelineConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn temperature_is_clamped() {
        let c = PipelineConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, Some(2.0));
    }

    #[test]
    fn debug_hides_trait_objects() {
        let out = format!("{:?}", PipelineConfig::default());
        assert!(out.contains("context_size"));
        assert!(out.contains("extractor: None"));
    }

    #[test]
    fn chat_defaults() {
        let c = ChatConfig::default();
        assert_eq!(c.model, "gpt-4o-mini");
        assert_eq!(c.max_tokens, 300);
    }
}
