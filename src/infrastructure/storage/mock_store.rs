use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::application::ports::{AttachmentFetcher, AttachmentStore, AttachmentStoreError};
use crate::domain::StoragePath;

/// In-memory attachment store keyed by storage name.
#[derive(Default)]
pub struct MockAttachmentStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, name: &str, bytes: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl AttachmentStore for MockAttachmentStore {
    async fn store(
        &self,
        path: &StoragePath,
        mut stream: BoxStream<'_, Result<Bytes, io::Error>>,
        _content_length: Option<u64>,
    ) -> Result<u64, AttachmentStoreError> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        let size = data.len() as u64;
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.as_str().to_string(), data);
        Ok(size)
    }

    async fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, AttachmentStoreError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| AttachmentStoreError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &StoragePath) -> Result<(), AttachmentStoreError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path.as_str());
        Ok(())
    }
}

#[async_trait::async_trait]
impl AttachmentFetcher for MockAttachmentStore {
    async fn fetch_attachment(&self, filepath: &str) -> Result<Vec<u8>, AttachmentStoreError> {
        let path = StoragePath::from_retrieval_path(filepath)
            .ok_or_else(|| AttachmentStoreError::InvalidPath(filepath.to_string()))?;
        self.fetch(&path).await
    }
}
