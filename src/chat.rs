//! Conversation over a processed document.
//!
//! A session is seeded with three turns (system instruction, the document as
//! the first user turn, a fixed assistant acknowledgement) and then grows
//! append-only. Each [`ConversationSession::ask`] resends the whole history;
//! there is no summarisation or truncation.

use crate::backend::{complete_with_timeout, ModelBackend, ModelRequest, Turn};
use crate::config::ChatConfig;
use crate::error::{BackendError, PdfChatError};
use crate::prompts::{chat_document_turn, CHAT_ACKNOWLEDGEMENT, CHAT_SYSTEM_PROMPT};
use tracing::{debug, warn};

/// Turns before the first question: system, document, acknowledgement.
const SEED_TURNS: usize = 3;

/// An append-only dialogue about one document.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn seeded(document: &str) -> Self {
        Self {
            turns: vec![
                Turn::system(CHAT_SYSTEM_PROMPT),
                Turn::user(chat_document_turn(document)),
                Turn::assistant(CHAT_ACKNOWLEDGEMENT),
            ],
        }
    }

    /// Ask `question` and return the assistant's answer.
    ///
    /// On failure the question stays in the history and the error is
    /// returned; the caller decides whether to retry or [`reset`](Self::reset).
    pub async fn ask(
        &mut self,
        backend: &dyn ModelBackend,
        question: &str,
        config: &ChatConfig,
    ) -> Result<String, PdfChatError> {
        self.turns.push(Turn::user(question));
        let request = ModelRequest {
            turns: self.turns.clone(),
            image: None,
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        };

        debug!("Chat request with {} turns", self.turns.len());
        let reply = complete_with_timeout(backend, request, config.api_timeout_secs)
            .await
            .and_then(|reply| {
                let answer = reply.content.trim().to_string();
                if answer.is_empty() {
                    Err(BackendError::EmptyResponse)
                } else {
                    Ok(answer)
                }
            })
            .map_err(|e| {
                warn!("{}: chat request failed: {}", backend.label(), e);
                PdfChatError::from_backend(backend.label(), e)
            })?;

        self.turns.push(Turn::assistant(reply.clone()));
        Ok(reply)
    }

    /// Forget every question and answer, keeping the seed.
    pub fn reset(&mut self) {
        self.turns.truncate(SEED_TURNS);
    }

    /// All turns including the seed.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// What a chat UI shows: the acknowledgement and everything after it.
    pub fn transcript(&self) -> &[Turn] {
        &self.turns[SEED_TURNS - 1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ModelReply, Role};
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    /// Echoes the number of turns it received, or fails when told to.
    struct Echo {
        fail_with: Mutex<Option<BackendError>>,
        seen: Mutex<Vec<usize>>,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                fail_with: Mutex::new(None),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ModelBackend for Echo {
        fn label(&self) -> &str {
            "echo"
        }

        fn complete<'a>(&'a self, request: ModelRequest) -> BoxFuture<'a, Result<ModelReply, BackendError>> {
            assert!(request.image.is_none());
            self.seen.lock().unwrap().push(request.turns.len());
            let outcome = match self.fail_with.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(ModelReply {
                    content: format!("  answer after {} turns\n", request.turns.len()),
                    ..Default::default()
                }),
            };
            Box::pin(async move { outcome })
        }
    }

    #[test]
    fn seed_has_three_turns() {
        let s = ConversationSession::seeded("# Doc\nBody");
        let roles: Vec<Role> = s.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert!(s.turns()[1].content.contains("# Doc\nBody"));
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(s.transcript()[0].content, CHAT_ACKNOWLEDGEMENT);
    }

    #[tokio::test]
    async fn ask_appends_question_and_answer() {
        let backend = Echo::new();
        let mut s = ConversationSession::seeded("doc");
        let a = s.ask(&backend, "What is it?", &ChatConfig::default()).await.unwrap();
        assert_eq!(a, "answer after 4 turns");
        assert_eq!(s.turns().len(), 5);

        s.ask(&backend, "And then?", &ChatConfig::default()).await.unwrap();
        assert_eq!(*backend.seen.lock().unwrap(), vec![4, 6]);
    }

    #[tokio::test]
    async fn failure_keeps_question_and_returns_fatal_error() {
        let backend = Echo::new();
        *backend.fail_with.lock().unwrap() = Some(BackendError::Auth("401".into()));
        let mut s = ConversationSession::seeded("doc");
        let err = s.ask(&backend, "Hello?", &ChatConfig::default()).await.unwrap_err();
        assert!(matches!(err, PdfChatError::AuthError { .. }));
        assert_eq!(s.turns().len(), 4);
        assert_eq!(s.turns()[3].role, Role::User);
    }

    #[tokio::test]
    async fn reset_keeps_only_the_seed() {
        let backend = Echo::new();
        let mut s = ConversationSession::seeded("doc");
        s.ask(&backend, "q", &ChatConfig::default()).await.unwrap();
        s.reset();
        assert_eq!(s.turns().len(), 3);
    }
}
