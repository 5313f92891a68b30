pub mod api_types;
mod chat;
mod chat_stream;
mod health;
mod upload;

pub use chat::{COMPLETION_FAILED, chat_handler};
pub use chat_stream::{STREAM_FAILED, chat_stream_handler};
pub use health::health_handler;
pub use upload::{NO_FILE, UPLOAD_FAILED, serve_upload_handler, upload_handler};
