use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{MultipartUpload, ObjectStore, PutPayload};

use crate::application::ports::{AttachmentFetcher, AttachmentStore, AttachmentStoreError};
use crate::domain::StoragePath;

/// Uploaded files on the local filesystem, one flat directory.
pub struct LocalAttachmentStore {
    inner: Arc<LocalFileSystem>,
    max_bytes: Option<u64>,
}

impl LocalAttachmentStore {
    pub fn new(base_path: PathBuf) -> Result<Self, AttachmentStoreError> {
        std::fs::create_dir_all(&base_path)?;
        let fs = LocalFileSystem::new_with_prefix(&base_path)
            .map_err(|e| AttachmentStoreError::UploadFailed(e.to_string()))?;
        tracing::debug!(path = %base_path.display(), "Local attachment store ready");
        Ok(Self {
            inner: Arc::new(fs),
            max_bytes: None,
        })
    }

    /// Uploads larger than `max_bytes` are aborted and nothing is kept.
    pub fn with_size_limit(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    async fn abort(upload: &mut Box<dyn MultipartUpload>, path: &StoragePath) {
        if let Err(e) = upload.abort().await {
            tracing::warn!(error = %e, path = %path, "Failed to abort partial upload");
        }
    }
}

#[async_trait::async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn store(
        &self,
        path: &StoragePath,
        mut stream: BoxStream<'_, Result<Bytes, io::Error>>,
        content_length: Option<u64>,
    ) -> Result<u64, AttachmentStoreError> {
        if let (Some(limit), Some(length)) = (self.max_bytes, content_length) {
            if length > limit {
                return Err(AttachmentStoreError::TooLarge { limit });
            }
        }

        let object_path = ObjectPath::from(path.as_str());
        let mut upload = self
            .inner
            .put_multipart(&object_path)
            .await
            .map_err(|e| AttachmentStoreError::UploadFailed(e.to_string()))?;

        let mut total_bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    Self::abort(&mut upload, path).await;
                    return Err(AttachmentStoreError::Io(e));
                }
            };

            total_bytes += bytes.len() as u64;
            if let Some(limit) = self.max_bytes {
                if total_bytes > limit {
                    Self::abort(&mut upload, path).await;
                    return Err(AttachmentStoreError::TooLarge { limit });
                }
            }

            if let Err(e) = upload.put_part(PutPayload::from(bytes)).await {
                Self::abort(&mut upload, path).await;
                return Err(AttachmentStoreError::UploadFailed(e.to_string()));
            }
        }

        upload
            .complete()
            .await
            .map_err(|e| AttachmentStoreError::UploadFailed(e.to_string()))?;

        tracing::info!(path = %path, bytes = total_bytes, "Stored attachment");
        Ok(total_bytes)
    }

    async fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, AttachmentStoreError> {
        let object_path = ObjectPath::from(path.as_str());
        let result = self.inner.get(&object_path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => AttachmentStoreError::NotFound(path.to_string()),
            other => AttachmentStoreError::DownloadFailed(other.to_string()),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| AttachmentStoreError::DownloadFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, path: &StoragePath) -> Result<(), AttachmentStoreError> {
        let object_path = ObjectPath::from(path.as_str());
        self.inner
            .delete(&object_path)
            .await
            .map_err(|e| AttachmentStoreError::DeleteFailed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl AttachmentFetcher for LocalAttachmentStore {
    async fn fetch_attachment(&self, filepath: &str) -> Result<Vec<u8>, AttachmentStoreError> {
        let path = StoragePath::from_retrieval_path(filepath)
            .ok_or_else(|| AttachmentStoreError::InvalidPath(filepath.to_string()))?;
        self.fetch(&path).await
    }
}
