use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    CompletionClient, CompletionError, CompletionRequest, FragmentStream,
};
use crate::presentation::config::{LlmProvider, LlmSettings};

use super::sse::sse_fragments;
use super::wire::WireMessage;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const AZURE_API_VERSION: &str = "2024-02-01";

pub const MISSING_API_KEY: &str = "OpenAI API key not configured";

/// Upstream chat-completions client for OpenAI-compatible providers.
pub struct OpenAiClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    fn api_key(&self) -> Result<&str, CompletionError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| CompletionError::Config(MISSING_API_KEY.to_string()))
    }

    fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::Azure => format!(
                "{}/chat/completions?api-version={}",
                self.base_url, AZURE_API_VERSION
            ),
            LlmProvider::OpenAi | LlmProvider::LmStudio => {
                format!("{}/chat/completions", self.base_url)
            }
        }
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
            stream: stream.then_some(true),
        }
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        match self.provider {
            LlmProvider::Azure => request.header("api-key", api_key),
            LlmProvider::OpenAi | LlmProvider::LmStudio => request.bearer_auth(api_key),
        }
    }

    async fn post(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, CompletionError> {
        request.validate()?;
        let api_key = self.api_key()?;

        let body = self.body(request, stream);
        tracing::debug!(
            model = body.model,
            messages = body.messages.len(),
            stream,
            "Calling chat completions"
        );

        let response = self
            .apply_auth(self.client.post(self.endpoint()).json(&body), api_key)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Chat completions request rejected");
            return Err(CompletionError::Upstream(format!("HTTP {}: {}", status, body)));
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let response = self.post(request, false).await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Upstream(format!("invalid response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::EmptyCompletion)
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, CompletionError> {
        let response = self.post(request, true).await?;
        Ok(sse_fragments(response.bytes_stream(), decode_chunk))
    }
}

fn decode_chunk(payload: &str) -> Result<Option<String>, CompletionError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| CompletionError::Upstream(format!("invalid stream chunk: {}", e)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

/// Builds the upstream client. A missing credential is not an error here;
/// every request then fails with a config error instead.
pub fn create_completion_client(settings: &LlmSettings) -> Result<OpenAiClient, CompletionError> {
    let configured_base = settings
        .base_url
        .as_deref()
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty());

    let base_url = match settings.provider {
        LlmProvider::OpenAi => configured_base.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
        LlmProvider::LmStudio => configured_base.ok_or_else(|| {
            CompletionError::Config("base_url required for lmstudio provider".to_string())
        })?,
        LlmProvider::Azure => {
            let endpoint = configured_base.ok_or_else(|| {
                CompletionError::Config("base_url required for azure provider".to_string())
            })?;
            format!("{}/openai/deployments/{}", endpoint, settings.chat_model)
        }
    };

    let api_key = Some(settings.api_key.trim().to_string()).filter(|key| !key.is_empty());
    if api_key.is_none() {
        tracing::warn!("No API key configured; chat requests will be refused");
    }

    Ok(OpenAiClient {
        client: Client::new(),
        provider: settings.provider,
        base_url,
        api_key,
        model: settings.chat_model.clone(),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_chunk_reads_delta_content() {
        let payload = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(decode_chunk(payload).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn decode_chunk_ignores_role_only_deltas() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(decode_chunk(payload).unwrap(), None);
    }

    #[test]
    fn lmstudio_without_base_url_is_a_config_error() {
        let settings = LlmSettings {
            provider: LlmProvider::LmStudio,
            ..LlmSettings::default()
        };

        let result = create_completion_client(&settings);

        assert!(matches!(result, Err(CompletionError::Config(_))));
    }
}
