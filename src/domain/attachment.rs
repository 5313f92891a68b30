use serde::{Deserialize, Serialize};

/// A file previously stored through the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    /// Retrieval path, e.g. `/uploads/1700000000000-k3j9x1a.png`.
    pub filepath: String,
    pub filetype: String,
    pub filesize: u64,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.filetype.starts_with("image/")
    }

    pub fn reference(&self) -> String {
        format!("[{}]", self.filename)
    }
}

/// Best-effort MIME type from a file extension.
pub fn mime_from_extension(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}
