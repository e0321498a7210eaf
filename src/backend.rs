//! The remote-model seam.
//!
//! Both the image describer and the conversation session talk to a model
//! through [`ModelBackend`]. The production implementation,
//! [`ProviderBackend`], wraps an `edgequake_llm` provider; tests inject a
//! scripted backend instead. One handle is created per run (or per chat) and
//! passed explicitly — there is no process-wide client.

use crate::error::{BackendError, PdfChatError};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Clone)]
pub struct ModelRequest {
    /// Conversation so far, oldest first.
    pub turns: Vec<Turn>,
    /// Inline image attached to the last user turn.
    pub image: Option<ImageData>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// The text the model produced plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReply {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Anything that can answer a [`ModelRequest`].
///
/// Returns a boxed future so the trait stays object-safe and can be shared as
/// `Arc<dyn ModelBackend>` across concurrently described images.
pub trait ModelBackend: Send + Sync {
    /// Short label used in logs and error messages (e.g. `openai/gpt-4o-mini`).
    fn label(&self) -> &str;

    fn complete<'a>(&'a self, request: ModelRequest) -> BoxFuture<'a, Result<ModelReply, BackendError>>;
}

/// Run `backend.complete` bounded by `timeout_secs` (0 disables the bound).
pub async fn complete_with_timeout(
    backend: &dyn ModelBackend,
    request: ModelRequest,
    timeout_secs: u64,
) -> Result<ModelReply, BackendError> {
    if timeout_secs == 0 {
        return backend.complete(request).await;
    }
    match tokio::time::timeout(Duration::from_secs(timeout_secs), backend.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout_secs)),
    }
}

/// [`ModelBackend`] over an `edgequake_llm` provider.
#[derive(Clone)]
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

impl fmt::Debug for ProviderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBackend")
            .field("label", &self.label)
            .finish()
    }
}

impl ModelBackend for ProviderBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn complete<'a>(&'a self, request: ModelRequest) -> BoxFuture<'a, Result<ModelReply, BackendError>> {
        Box::pin(async move {
            let options = CompletionOptions {
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                ..Default::default()
            };
            let messages = to_chat_messages(request.turns, request.image);

            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| BackendError::classify(e.to_string()))?;

            debug!(
                "{}: {} input tokens, {} output tokens",
                self.label, response.prompt_tokens, response.completion_tokens
            );

            Ok(ModelReply {
                content: response.content,
                prompt_tokens: response.prompt_tokens as u64,
                completion_tokens: response.completion_tokens as u64,
            })
        })
    }
}

// ── Provider resolution ─────────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn ModelBackend>, PdfChatError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PdfChatError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(ProviderBackend::new(
        provider,
        format!("{provider_name}/{model}"),
    )))
}

/// Build a backend from the environment, most specific source first:
///
/// 1. **Named provider** (`provider_name`) with `model` or `default_model`.
/// 2. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 3. **OpenAI** when `OPENAI_API_KEY` is set, so users holding several keys
///    get the documented default.
/// 4. **Auto-detection** via [`ProviderFactory::from_env`].
///
/// Fails with [`PdfChatError::ProviderNotConfigured`] when no credential is
/// available; callers check this before doing any work.
pub fn resolve_backend(
    provider_name: Option<&str>,
    model: Option<&str>,
    default_model: &str,
) -> Result<Arc<dyn ModelBackend>, PdfChatError> {
    if let Some(name) = provider_name {
        return create_provider(name, model.unwrap_or(default_model));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, model.unwrap_or(&env_model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model.unwrap_or(default_model));
        }
    }

    let (llm, _embedding) =
        ProviderFactory::from_env().map_err(|e| PdfChatError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(Arc::new(ProviderBackend::new(llm, "auto")))
}

/// Map turns onto provider messages, attaching `image` to the last user turn.
fn to_chat_messages(turns: Vec<Turn>, image: Option<ImageData>) -> Vec<ChatMessage> {
    let last_user = turns.iter().rposition(|t| t.role == Role::User);
    let mut image = image;

    turns
        .into_iter()
        .enumerate()
        .map(|(i, turn)| match turn.role {
            Role::System => ChatMessage::system(turn.content),
            Role::Assistant => ChatMessage::assistant(turn.content),
            Role::User if Some(i) == last_user => match image.take() {
                Some(img) => ChatMessage::user_with_images(turn.content, vec![img]),
                None => ChatMessage::user(turn.content),
            },
            Role::User => ChatMessage::user(turn.content),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy;

    impl ModelBackend for Sleepy {
        fn label(&self) -> &str {
            "sleepy"
        }

        fn complete<'a>(&'a self, _request: ModelRequest) -> BoxFuture<'a, Result<ModelReply, BackendError>> {
            Box::pin(futures::future::pending())
        }
    }

    fn request() -> ModelRequest {
        ModelRequest {
            turns: vec![Turn::user("hi")],
            image: None,
            temperature: None,
            max_tokens: Some(10),
        }
    }

    #[tokio::test]
    async fn timeout_is_reported_as_backend_error() {
        let err = complete_with_timeout(&Sleepy, request(), 1).await.unwrap_err();
        assert_eq!(err, BackendError::Timeout(1));
    }

    #[test]
    fn turn_constructors_tag_roles() {
        assert_eq!(Turn::system("s").role, Role::System);
        assert_eq!(Turn::user("u").role, Role::User);
        assert_eq!(Turn::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn role_serialises_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("ok")).unwrap();
        assert!(json.contains("\"assistant\""), "got: {json}");
    }
}
