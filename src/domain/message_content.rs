/// Body of a message: plain text, or an ordered sequence of text and image parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// Base64 payload without the `data:` prefix.
    Image { data: String, mime_type: String },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Parts(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }

    pub fn has_images(&self) -> bool {
        match self {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts
                .iter()
                .any(|p| matches!(p, ContentPart::Image { .. })),
        }
    }

    /// Human-readable rendering; images collapse to a placeholder.
    pub fn display_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => text.clone(),
                    ContentPart::Image { mime_type, .. } => format!("[image: {}]", mime_type),
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// Case-insensitive substring match over the text parts only.
    pub fn contains_text(&self, needle_lowercase: &str) -> bool {
        match self {
            MessageContent::Text(text) => text.to_lowercase().contains(needle_lowercase),
            MessageContent::Parts(parts) => parts.iter().any(|part| match part {
                ContentPart::Text(text) => text.to_lowercase().contains(needle_lowercase),
                ContentPart::Image { .. } => false,
            }),
        }
    }
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentPart::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// `data:<mime>;base64,<payload>` for image parts.
    pub fn data_uri(&self) -> Option<String> {
        match self {
            ContentPart::Text(_) => None,
            ContentPart::Image { data, mime_type } => {
                Some(format!("data:{};base64,{}", mime_type, data))
            }
        }
    }

    /// Parses a base64 data URI back into an image part.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (mime_type, data) = rest.split_once(";base64,")?;
        if mime_type.is_empty() || data.is_empty() {
            return None;
        }
        Some(ContentPart::image(data, mime_type))
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}
