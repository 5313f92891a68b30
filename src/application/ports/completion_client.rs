use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;

use crate::domain::{Message, MessageContent, MessageRole};

/// Incremental text fragments of a streamed reply. The stream ends after the
/// end-of-stream marker; a transport failure surfaces as a final `Err`.
pub type FragmentStream =
    Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send + 'static>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, CompletionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl CompletionMessage {
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for CompletionMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Model, token budget and temperature are passed through untouched; `None`
/// leaves the choice to whoever serves the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<CompletionMessage>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<CompletionMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CompletionError> {
        if self.messages.is_empty() {
            return Err(CompletionError::Validation(
                "Messages array is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("upstream returned an empty completion")]
    EmptyCompletion,
    #[error("transport error: {0}")]
    Transport(String),
}

impl CompletionError {
    /// Deployment defects, as opposed to transient failures.
    pub fn is_config(&self) -> bool {
        matches!(self, CompletionError::Config(_))
    }

    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            CompletionError::Upstream(_) | CompletionError::EmptyCompletion
        )
    }
}
