use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::StreamExt;
use serde_json::Value;

use crate::application::ports::{AttachmentStore, CompletionClient, CompletionError};
use crate::infrastructure::llm::{DONE_MARKER, MISSING_API_KEY};
use crate::presentation::state::AppState;

use super::api_types::{MESSAGES_REQUIRED, StreamChunk, error_response, parse_chat_request};

pub const STREAM_FAILED: &str = "Failed to get streaming response from OpenAI";

/// `POST /api/chat/stream`: relays reply fragments as `data: {"content"}`
/// events followed by `data: [DONE]`. A failure after the first event
/// closes the stream without `[DONE]`.
pub async fn chat_stream_handler<C, S>(
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

    let mut fragments = match state.completion_client.complete_stream(&request).await {
        Ok(fragments) => fragments,
        Err(e) => {
            tracing::error!(error = %e, "Streaming chat completion failed to start");
            return match e {
                CompletionError::Validation(_) => {
                    error_response(StatusCode::BAD_REQUEST, MESSAGES_REQUIRED)
                }
                CompletionError::Config(_) => {
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, MISSING_API_KEY)
                }
                _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, STREAM_FAILED),
            };
        }
    };

    let keep_alive_seconds = state.settings.llm.sse_keep_alive_seconds;

    let sse_stream = async_stream::stream! {
        let mut relayed = 0usize;

        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(content) => {
                    relayed += 1;
                    let json = serde_json::to_string(&StreamChunk { content }).unwrap_or_default();
                    yield Ok::<_, Infallible>(Event::default().data(json));
                }
                Err(e) => {
                    tracing::error!(error = %e, fragments = relayed, "Stream interrupted");
                    return;
                }
            }
        }

        tracing::info!(fragments = relayed, "Stream completed");
        yield Ok(Event::default().data(DONE_MARKER));
    };

    Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(keep_alive_seconds.max(1)))
                .text("keep-alive"),
        )
        .into_response()
}
