use std::fmt;

use chrono::Utc;
use uuid::Uuid;

pub const UPLOADS_PREFIX: &str = "/uploads/";

/// Location of an uploaded file relative to the uploads root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePath(String);

impl StoragePath {
    /// Unique `<millis>-<random7><ext>` name that keeps the original extension.
    pub fn for_upload(original_filename: &str) -> Self {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
        let extension = original_filename
            .rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(_, ext)| format!(".{}", ext))
            .unwrap_or_default();
        Self(format!(
            "{}-{}{}",
            Utc::now().timestamp_millis(),
            suffix,
            extension
        ))
    }

    pub fn from_raw(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Accepts either a bare name or an `/uploads/<name>` retrieval path.
    /// Rejects anything that could escape the uploads root.
    pub fn from_retrieval_path(path: &str) -> Option<Self> {
        let name = path.strip_prefix(UPLOADS_PREFIX).unwrap_or(path);
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        Some(Self(name.to_string()))
    }

    pub fn retrieval_path(&self) -> String {
        format!("{}{}", UPLOADS_PREFIX, self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
