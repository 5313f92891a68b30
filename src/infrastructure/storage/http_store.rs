use std::path::Path;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::application::ports::{AttachmentFetcher, AttachmentStoreError};
use crate::domain::{Attachment, mime_from_extension};

/// Uploads files to and downloads them from a running chat server.
pub struct HttpAttachmentClient {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct UploadReply {
    #[serde(default)]
    file: Option<Attachment>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpAttachmentClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Sends a local file to `/api/upload`; the returned attachment can be
    /// passed to the next send.
    pub async fn upload(&self, file: &Path) -> Result<Attachment, AttachmentStoreError> {
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AttachmentStoreError::InvalidPath(file.display().to_string()))?
            .to_string();
        let bytes = tokio::fs::read(file).await?;

        let part = Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str(mime_from_extension(&filename))
            .map_err(|e| AttachmentStoreError::UploadFailed(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/api/upload", self.endpoint))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| AttachmentStoreError::UploadFailed(e.to_string()))?;

        let status = response.status();
        let reply: UploadReply = response
            .json()
            .await
            .map_err(|e| AttachmentStoreError::UploadFailed(e.to_string()))?;

        match reply.file {
            Some(attachment) if status.is_success() => {
                tracing::info!(filepath = %attachment.filepath, "Uploaded attachment");
                Ok(attachment)
            }
            _ => Err(AttachmentStoreError::UploadFailed(
                reply.error.unwrap_or_else(|| format!("HTTP {}", status)),
            )),
        }
    }
}

#[async_trait::async_trait]
impl AttachmentFetcher for HttpAttachmentClient {
    async fn fetch_attachment(&self, filepath: &str) -> Result<Vec<u8>, AttachmentStoreError> {
        let response = self
            .client
            .get(format!("{}{}", self.endpoint, filepath))
            .send()
            .await
            .map_err(|e| AttachmentStoreError::DownloadFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AttachmentStoreError::NotFound(filepath.to_string()));
        }
        if !response.status().is_success() {
            return Err(AttachmentStoreError::DownloadFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttachmentStoreError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
