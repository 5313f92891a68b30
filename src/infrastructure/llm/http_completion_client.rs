use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    CompletionClient, CompletionError, CompletionRequest, FragmentStream,
};

use super::openai_client::MISSING_API_KEY;
use super::sse::sse_fragments;
use super::wire::WireMessage;

pub const NO_RESPONSE: &str = "No response from OpenAI";

/// Client of this crate's own `/api/chat` and `/api/chat/stream` endpoints.
pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatReply {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamFrame {
    content: Option<String>,
}

impl HttpCompletionClient {
    /// `endpoint` is the server's base URL, e.g. `http://localhost:3000`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post(
        &self,
        path: &str,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response, CompletionError> {
        request.validate()?;

        let body = ChatRequestBody {
            messages: request.messages.iter().map(WireMessage::from).collect(),
            model: request.model.as_deref(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        self.client
            .post(format!("{}{}", self.endpoint, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let response = self.post("/api/chat", request).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(classify(status, error_message(response).await));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(format!("unreadable reply: {}", e)))?;

        reply
            .message
            .filter(|m| !m.is_empty())
            .ok_or(CompletionError::EmptyCompletion)
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, CompletionError> {
        let response = self.post("/api/chat/stream", request).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(classify(status, error_message(response).await));
        }

        Ok(sse_fragments(response.bytes_stream(), decode_frame))
    }
}

/// The `{error}` text of a failed reply; bodies that are not JSON (a proxy's
/// HTML error page, say) yield `None`.
async fn error_message(response: reqwest::Response) -> Option<String> {
    response
        .json::<ChatReply>()
        .await
        .ok()
        .and_then(|reply| reply.error)
}

fn decode_frame(payload: &str) -> Result<Option<String>, CompletionError> {
    let frame: StreamFrame = serde_json::from_str(payload)
        .map_err(|e| CompletionError::Transport(format!("invalid stream frame: {}", e)))?;
    Ok(frame.content.filter(|c| !c.is_empty()))
}

/// Maps the server's `{error}` replies back onto error kinds.
fn classify(status: StatusCode, error: Option<String>) -> CompletionError {
    let error = error.unwrap_or_else(|| format!("HTTP {}", status));

    if status == StatusCode::BAD_REQUEST {
        CompletionError::Validation(error)
    } else if error == MISSING_API_KEY {
        CompletionError::Config(error)
    } else if error == NO_RESPONSE {
        CompletionError::EmptyCompletion
    } else {
        CompletionError::Upstream(error)
    }
}
