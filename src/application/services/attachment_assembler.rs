use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::application::ports::AttachmentFetcher;
use crate::domain::{Attachment, ContentPart, MessageContent};

/// Turns typed text plus uploaded files into outbound message content.
///
/// Images are fetched and inlined as base64 parts; every other file is
/// mentioned by name in an `Attached files:` line.
pub struct AttachmentAssembler {
    fetcher: Arc<dyn AttachmentFetcher>,
}

impl AttachmentAssembler {
    pub fn new(fetcher: Arc<dyn AttachmentFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn assemble(&self, text: &str, attachments: &[Attachment]) -> MessageContent {
        let (images, others): (Vec<&Attachment>, Vec<&Attachment>) =
            attachments.iter().partition(|a| a.is_image());

        if images.is_empty() {
            return text_with_references(text, attachments);
        }

        let mut parts = Vec::with_capacity(images.len() + 2);
        if !text.trim().is_empty() {
            parts.push(ContentPart::Text(text.to_string()));
        }

        for image in images {
            match self.fetcher.fetch_attachment(&image.filepath).await {
                Ok(bytes) => {
                    parts.push(ContentPart::image(STANDARD.encode(bytes), &image.filetype));
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        filepath = %image.filepath,
                        "Error processing image attachment"
                    );
                }
            }
        }

        if !others.is_empty() {
            parts.push(ContentPart::Text(format!(
                "Attached files: {}",
                references(&others)
            )));
        }

        MessageContent::Parts(parts)
    }
}

/// Text content with every attachment listed by name; no file is read.
pub fn text_with_references(text: &str, attachments: &[Attachment]) -> MessageContent {
    if attachments.is_empty() {
        return MessageContent::text(text);
    }

    let all: Vec<&Attachment> = attachments.iter().collect();
    let listing = format!("Attached files: {}", references(&all));
    if text.is_empty() {
        MessageContent::Text(listing)
    } else {
        MessageContent::Text(format!("{}\n\n{}", text, listing))
    }
}

fn references(attachments: &[&Attachment]) -> String {
    attachments
        .iter()
        .map(|a| a.reference())
        .collect::<Vec<_>>()
        .join(", ")
}
