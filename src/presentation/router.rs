use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::application::ports::{AttachmentStore, CompletionClient};
use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    chat_handler, chat_stream_handler, health_handler, serve_upload_handler, upload_handler,
};
use crate::presentation::state::AppState;

/// Room for multipart framing around the largest allowed file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router<C, S>(state: AppState<C, S>) -> Router
where
    C: CompletionClient + 'static,
    S: AttachmentStore + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let upload_limit = state.settings.uploads.max_file_size_bytes() + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler::<C, S>))
        .route("/api/chat/stream", post(chat_stream_handler::<C, S>))
        .route(
            "/api/upload",
            post(upload_handler::<C, S>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/uploads/{name}", get(serve_upload_handler::<C, S>))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
