use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ports::{CompletionMessage, CompletionRequest};
use crate::domain::Attachment;
use crate::infrastructure::llm::WireMessage;

pub const MESSAGES_REQUIRED: &str = "Messages array is required";

/// Body of `POST /api/chat` and `POST /api/chat/stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl From<ChatRequest> for CompletionRequest {
    fn from(request: ChatRequest) -> Self {
        CompletionRequest {
            messages: request
                .messages
                .into_iter()
                .map(CompletionMessage::from)
                .collect(),
            model: request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamChunk {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file: Attachment,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Accepts any JSON object whose `messages` is a non-empty array of chat
/// messages; everything else is a 400.
pub fn parse_chat_request(body: Value) -> Result<CompletionRequest, Response> {
    let has_messages = body
        .get("messages")
        .and_then(Value::as_array)
        .is_some_and(|messages| !messages.is_empty());
    if !has_messages {
        return Err(error_response(StatusCode::BAD_REQUEST, MESSAGES_REQUIRED));
    }

    serde_json::from_value::<ChatRequest>(body)
        .map(CompletionRequest::from)
        .map_err(|e| {
            tracing::warn!(error = %e, "Malformed chat request");
            error_response(StatusCode::BAD_REQUEST, MESSAGES_REQUIRED)
        })
}
