use std::io;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::stream::{StreamExt, TryStreamExt};

use crate::application::ports::{AttachmentStore, AttachmentStoreError, CompletionClient};
use crate::domain::{Attachment, StoragePath, mime_from_extension};
use crate::presentation::state::AppState;

use super::api_types::{UploadResponse, error_response};

pub const NO_FILE: &str = "No file provided";
pub const UPLOAD_FAILED: &str = "Failed to upload file";

/// `POST /api/upload`: stores the `file` field under a fresh unique name.
/// An optional `messageId` field is only recorded in the logs.
pub async fn upload_handler<C, S>(
    State(state): State<AppState<C, S>>,
    mut multipart: Multipart,
) -> Response
where
    C: CompletionClient + 'static,
    S: AttachmentStore + 'static,
{
    let mut stored: Option<Attachment> = None;
    let mut message_id: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable multipart body");
                return error_response(StatusCode::BAD_REQUEST, e.body_text());
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("messageId") => {
                message_id = field.text().await.ok().filter(|id| !id.is_empty());
            }
            Some("file") if stored.is_none() => {
                let Some(filename) = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                else {
                    continue;
                };
                let filetype = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| mime_from_extension(&filename).to_string());

                let path = StoragePath::for_upload(&filename);
                let body = field
                    .map_err(|e| {
                        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                            io::Error::new(io::ErrorKind::InvalidData, e.body_text())
                        } else {
                            io::Error::other(e.body_text())
                        }
                    })
                    .boxed();

                match state.attachment_store.store(&path, body, None).await {
                    Ok(filesize) => {
                        stored = Some(Attachment {
                            filename,
                            filepath: path.retrieval_path(),
                            filetype,
                            filesize,
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, filename = %filename, "File upload error");
                        return upload_error_response(&e, state.settings.uploads.max_file_size_mb);
                    }
                }
            }
            _ => {}
        }
    }

    let Some(file) = stored else {
        return error_response(StatusCode::BAD_REQUEST, NO_FILE);
    };

    tracing::info!(
        filepath = %file.filepath,
        filesize = file.filesize,
        message_id = message_id.as_deref().unwrap_or("-"),
        "File uploaded"
    );

    (
        StatusCode::OK,
        Json(UploadResponse {
            success: true,
            file,
        }),
    )
        .into_response()
}

/// Oversized or unreadable request bodies are the client's fault; anything
/// else is a storage failure.
fn upload_error_response(error: &AttachmentStoreError, max_file_size_mb: usize) -> Response {
    match error {
        AttachmentStoreError::TooLarge { .. } => too_large(max_file_size_mb),
        AttachmentStoreError::Io(e) if e.kind() == io::ErrorKind::InvalidData => {
            too_large(max_file_size_mb)
        }
        AttachmentStoreError::Io(_) => error_response(StatusCode::BAD_REQUEST, "Invalid upload body"),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, UPLOAD_FAILED),
    }
}

fn too_large(max_file_size_mb: usize) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        format!("File too large (max {} MB)", max_file_size_mb),
    )
}

/// `GET /uploads/{name}`: serves a previously uploaded file.
pub async fn serve_upload_handler<C, S>(
    State(state): State<AppState<C, S>>,
    Path(name): Path<String>,
) -> Response
where
    C: CompletionClient + 'static,
    S: AttachmentStore + 'static,
{
    let Some(path) = StoragePath::from_retrieval_path(&name) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid file name");
    };

    match state.attachment_store.fetch(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime_from_extension(path.as_str()))],
            bytes,
        )
            .into_response(),
        Err(AttachmentStoreError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "File not found")
        }
        Err(e) => {
            tracing::error!(error = %e, path = %path, "Failed to read upload");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file")
        }
    }
}
