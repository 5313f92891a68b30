use std::io;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::domain::StoragePath;

/// Server-side storage for uploaded files.
#[async_trait::async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn store(
        &self,
        path: &StoragePath,
        stream: BoxStream<'_, Result<Bytes, io::Error>>,
        content_length: Option<u64>,
    ) -> Result<u64, AttachmentStoreError>;

    async fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, AttachmentStoreError>;

    async fn delete(&self, path: &StoragePath) -> Result<(), AttachmentStoreError>;
}

/// Resolves an attachment's retrieval path to its bytes.
#[async_trait::async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch_attachment(&self, filepath: &str) -> Result<Vec<u8>, AttachmentStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentStoreError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
