use serde::{Deserialize, Serialize};

use crate::application::ports::CompletionMessage;
use crate::domain::{ContentPart, MessageContent, MessageRole};

/// Chat message in the OpenAI-compatible shape shared by the upstream
/// provider and this crate's own `/api/chat` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: MessageRole,
    pub content: WireContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl From<&CompletionMessage> for WireMessage {
    fn from(message: &CompletionMessage) -> Self {
        let content = match &message.content {
            MessageContent::Text(text) => WireContent::Text(text.clone()),
            MessageContent::Parts(parts) => WireContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => WirePart::Text { text: text.clone() },
                        ContentPart::Image { .. } => WirePart::ImageUrl {
                            image_url: ImageUrl {
                                url: part.data_uri().unwrap_or_default(),
                            },
                        },
                    })
                    .collect(),
            ),
        };
        Self {
            role: message.role,
            content,
        }
    }
}

impl From<WireMessage> for CompletionMessage {
    /// Image URLs that are not base64 data URIs are kept as text so nothing
    /// the caller sent is silently lost.
    fn from(message: WireMessage) -> Self {
        let content = match message.content {
            WireContent::Text(text) => MessageContent::Text(text),
            WireContent::Parts(parts) => MessageContent::Parts(
                parts
                    .into_iter()
                    .map(|part| match part {
                        WirePart::Text { text } => ContentPart::Text(text),
                        WirePart::ImageUrl { image_url } => {
                            ContentPart::from_data_uri(&image_url.url)
                                .unwrap_or(ContentPart::Text(image_url.url))
                        }
                    })
                    .collect(),
            ),
        };
        CompletionMessage::new(message.role, content)
    }
}
