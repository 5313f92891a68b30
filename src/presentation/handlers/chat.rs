use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::application::ports::{AttachmentStore, CompletionClient, CompletionError};
use crate::infrastructure::llm::{MISSING_API_KEY, NO_RESPONSE};
use crate::presentation::state::AppState;

use super::api_types::{ChatResponse, MESSAGES_REQUIRED, error_response, parse_chat_request};

pub const COMPLETION_FAILED: &str = "Failed to get response from OpenAI";

/// `POST /api/chat`: one complete reply for the given history.
pub async fn chat_handler<C, S>(
    State(state): State<AppState<C, S>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response
where
    C: CompletionClient + 'static,
    S: AttachmentStore + 'static,
{
    let Ok(Json(body)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, MESSAGES_REQUIRED);
    };
    let request = match parse_chat_request(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    tracing::debug!(messages = request.messages.len(), "Processing chat completion");

    match state.completion_client.complete(&request).await {
        Ok(message) => {
            tracing::info!(chars = message.chars().count(), "Chat completion successful");
            (StatusCode::OK, Json(ChatResponse { message })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Chat completion failed");
            let message = match e {
                CompletionError::Validation(_) => {
                    return error_response(StatusCode::BAD_REQUEST, MESSAGES_REQUIRED);
                }
                CompletionError::Config(_) => MISSING_API_KEY,
                CompletionError::EmptyCompletion => NO_RESPONSE,
                CompletionError::Upstream(_) | CompletionError::Transport(_) => COMPLETION_FAILED,
            };
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}
