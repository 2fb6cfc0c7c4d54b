//! The grounded chat request handler.

use std::sync::Arc;

use resumebot_retrieval::{AssembledContext, Citation, Retriever, assemble};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::HandlerError;
use crate::message::ChatMessage;
use crate::prompt::PersonaConfig;
use crate::provider::ChatProvider;

/// A user question plus optional prior turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = Some(history);
        self
    }
}

/// The generated reply and the passages it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(default)]
    pub sources: Vec<Citation>,
}

/// Answers questions about one person from their indexed knowledge document.
///
/// Holds no per-request state; share it behind an `Arc` across requests.
pub struct ChatHandler {
    retriever: Retriever,
    chat: Arc<dyn ChatProvider>,
    persona: PersonaConfig,
    system_prompt: String,
    top_k: usize,
    history_limit: usize,
}

impl ChatHandler {
    /// Passages retrieved per question.
    pub const DEFAULT_TOP_K: usize = 5;

    /// Most recent history messages forwarded to the generator.
    pub const DEFAULT_HISTORY_LIMIT: usize = 8;

    pub fn new(retriever: Retriever, chat: Arc<dyn ChatProvider>, persona: PersonaConfig) -> Self {
        let system_prompt = persona.system_prompt();
        Self {
            retriever,
            chat,
            persona,
            system_prompt,
            top_k: Self::DEFAULT_TOP_K,
            history_limit: Self::DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set the number of passages retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set how many trailing history messages are kept.
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    /// Retrieve and assemble the grounding context for `question`.
    pub async fn context(&self, question: &str) -> Result<AssembledContext, HandlerError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(HandlerError::EmptyMessage);
        }
        let results = self.retriever.search(question, self.top_k).await?;
        Ok(assemble(&results))
    }

    /// Answer one chat request.
    pub async fn answer(&self, request: ChatRequest) -> Result<ChatResponse, HandlerError> {
        let question = request.message.trim();
        if question.is_empty() {
            return Err(HandlerError::EmptyMessage);
        }

        let context = self.context(question).await?;
        debug!("Grounding answer on {} passages", context.sources.len());

        let history = request.history.as_deref().unwrap_or_default();
        let messages = self.messages(&context, history, question);
        let reply = self.chat.chat(&messages).await?;

        info!(
            "Generated {} byte reply with {} from {} sources",
            reply.len(),
            self.chat.model(),
            context.sources.len()
        );
        Ok(ChatResponse {
            reply,
            sources: context.citations(),
        })
    }

    /// System prompt, context, trailing history, then the question.
    fn messages(
        &self,
        context: &AssembledContext,
        history: &[ChatMessage],
        question: &str,
    ) -> Vec<ChatMessage> {
        let keep_from = history.len().saturating_sub(self.history_limit);
        let mut messages = Vec::with_capacity(history.len() - keep_from + 3);

        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.push(ChatMessage::system(format!(
            "Context for {}:\n{}\n\nRemember to cite [S#].",
            self.persona.owner_name, context.block
        )));
        messages.extend_from_slice(&history[keep_from..]);
        messages.push(ChatMessage::user(question));
        messages
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ChatError;
    use crate::message::Role;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use resumebot_embeddings::{Embedding, EmbeddingError, EmbeddingProvider};
    use resumebot_retrieval::{ChunkerConfig, RetrievalError, VectorIndex, split_markdown};

    const DOC: &str = "# Experience\nAlice is an engineer.\n# Hobbies\nAlice enjoys chess.";

    struct KeywordProvider {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordProvider {
        fn name(&self) -> &str {
            "keyword"
        }

        fn model(&self) -> &str {
            "keyword"
        }

        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> resumebot_embeddings::Result<Vec<Embedding>> {
            if self.fail {
                return Err(EmbeddingError::InvalidResponse("down".to_string()));
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("engineer").count() as f32,
                        t.matches("chess").count() as f32,
                        0.1,
                    ]
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatProvider for RecordingChat {
        fn model(&self) -> &str {
            "recording"
        }

        async fn chat(&self, messages: &[ChatMessage]) -> crate::Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if self.fail {
                return Err(ChatError::InvalidResponse("{}".to_string()));
            }
            Ok("Alice is an engineer [S1].".to_string())
        }
    }

    async fn handler(embed_fails: bool, chat: Arc<RecordingChat>) -> ChatHandler {
        let chunks = split_markdown(DOC, &ChunkerConfig::default()).unwrap();
        let index = VectorIndex::build(chunks, &KeywordProvider { fail: false }, 16)
            .await
            .unwrap();
        let retriever = Retriever::new(
            Arc::new(index),
            Arc::new(KeywordProvider { fail: embed_fails }),
        );
        ChatHandler::new(
            retriever,
            chat,
            PersonaConfig::default().with_owner_name("Alice"),
        )
    }

    #[tokio::test]
    async fn test_answer_grounds_reply_and_returns_citations() {
        let chat = Arc::new(RecordingChat::default());
        let handler = handler(false, chat.clone()).await;

        let response = handler
            .answer(ChatRequest::new("  What does Alice do as an engineer?  "))
            .await
            .unwrap();

        assert_eq!(response.reply, "Alice is an engineer [S1].");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].tag, "S1");
        assert_eq!(response.sources[0].section_title, "Experience");
        assert_eq!(response.sources[1].tag, "S2");

        let seen = chat.seen.lock().unwrap();
        let messages = &seen[0];
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("assistant for Alice"));
        assert!(
            messages[1]
                .content
                .starts_with("Context for Alice:\n[S1] Experience — Alice is an engineer.\n[S2] Hobbies")
        );
        assert!(messages[1].content.ends_with("\n\nRemember to cite [S#]."));
        assert_eq!(
            messages[2],
            ChatMessage::user("What does Alice do as an engineer?")
        );
    }

    #[tokio::test]
    async fn test_history_is_trimmed_to_most_recent() {
        let chat = Arc::new(RecordingChat::default());
        let handler = handler(false, chat.clone()).await;
        let history: Vec<ChatMessage> = (0..11)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{i}"))
                } else {
                    ChatMessage::assistant(format!("a{i}"))
                }
            })
            .collect();

        handler
            .answer(ChatRequest::new("chess?").with_history(history))
            .await
            .unwrap();

        let seen = chat.seen.lock().unwrap();
        let messages = &seen[0];
        assert_eq!(messages.len(), 2 + 8 + 1);
        assert_eq!(messages[2].content, "a3");
        assert_eq!(messages[9].content, "q10");
        assert_eq!(messages[10], ChatMessage::user("chess?"));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_before_any_call() {
        let chat = Arc::new(RecordingChat::default());
        let handler = handler(true, chat.clone()).await;

        let err = handler.answer(ChatRequest::new(" \n\t")).await.unwrap_err();

        assert!(matches!(err, HandlerError::EmptyMessage));
        assert!(chat.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_skips_generation() {
        let chat = Arc::new(RecordingChat::default());
        let handler = handler(true, chat.clone()).await;

        let err = handler.answer(ChatRequest::new("engineer?")).await.unwrap_err();

        assert!(matches!(
            err,
            HandlerError::Retrieval(RetrievalError::Embedding(_))
        ));
        assert!(err.to_string().starts_with("Retrieval failed: "));
        assert!(chat.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let chat = Arc::new(RecordingChat {
            fail: true,
            ..Default::default()
        });
        let handler = handler(false, chat).await;

        let err = handler.answer(ChatRequest::new("engineer?")).await.unwrap_err();

        assert!(matches!(err, HandlerError::Generation(_)));
        assert!(err.to_string().starts_with("LLM call failed: "));
    }

    #[tokio::test]
    async fn test_context_respects_top_k() {
        let handler = handler(false, Arc::new(RecordingChat::default()))
            .await
            .with_top_k(1);

        let context = handler.context("chess").await.unwrap();

        assert_eq!(context.block, "[S1] Hobbies — Alice enjoys chess.");
    }

    #[test]
    fn test_request_history_is_optional() {
        let request: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(request, ChatRequest::new("hi"));
    }
}
