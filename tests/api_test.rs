use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use ringo_chat::application::ports::CompletionError;
use ringo_chat::infrastructure::llm::{MockCompletionClient, ScriptedReply, SseDecoder};
use ringo_chat::infrastructure::observability::REQUEST_ID_HEADER;
use ringo_chat::infrastructure::storage::MockAttachmentStore;
use ringo_chat::presentation::{AppState, Settings, create_router};

const BOUNDARY: &str = "ringo-test-boundary";

fn create_test_app(client: MockCompletionClient) -> (Router, Arc<MockCompletionClient>) {
    create_test_app_with(client, Settings::default())
}

fn create_test_app_with(
    client: MockCompletionClient,
    settings: Settings,
) -> (Router, Arc<MockCompletionClient>) {
    let client = Arc::new(client);
    let state = AppState::new(
        Arc::clone(&client),
        Arc::new(MockAttachmentStore::new()),
        settings,
    );
    (create_router(state), client)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

const HELLO: &str = r#"{"messages": [{"role": "user", "content": "Hello"}]}"#;

#[tokio::test]
async fn given_running_server_when_health_check_then_returns_healthy() {
    let (app, _) = create_test_app(MockCompletionClient::new());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn given_request_id_header_when_calling_then_it_is_echoed() {
    let (app, _) = create_test_app(MockCompletionClient::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
}

#[tokio::test]
async fn given_unusable_request_id_when_calling_then_a_fresh_one_is_returned() {
    let (app, _) = create_test_app(MockCompletionClient::new());
    let oversized = "x".repeat(300);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, oversized.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let echoed = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert_ne!(echoed, oversized);
    assert_eq!(echoed.len(), 32);
}

#[tokio::test]
async fn given_valid_messages_when_chatting_then_returns_message() {
    let (app, client) =
        create_test_app(MockCompletionClient::scripted([ScriptedReply::text("Hi!")]));

    let response = app.oneshot(post_json("/api/chat", HELLO)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Hi!");
    assert_eq!(client.requests()[0].messages.len(), 1);
}

#[tokio::test]
async fn given_missing_messages_when_chatting_then_returns_bad_request() {
    for body in [r#"{}"#, r#"{"messages": "nope"}"#, r#"{"messages": []}"#, "not json"] {
        let (app, client) = create_test_app(MockCompletionClient::new());

        let response = app.oneshot(post_json("/api/chat", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(body_json(response).await["error"], "Messages array is required");
        assert!(client.requests().is_empty());
    }
}

#[tokio::test]
async fn given_missing_credential_when_chatting_then_returns_config_error() {
    let (app, _) = create_test_app(MockCompletionClient::scripted([ScriptedReply::Error(
        CompletionError::Config("OpenAI API key not configured".to_string()),
    )]));

    let response = app.oneshot(post_json("/api/chat", HELLO)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "OpenAI API key not configured");
}

#[tokio::test]
async fn given_empty_completion_when_chatting_then_returns_no_response_error() {
    let (app, _) = create_test_app(MockCompletionClient::scripted([ScriptedReply::Error(
        CompletionError::EmptyCompletion,
    )]));

    let response = app.oneshot(post_json("/api/chat", HELLO)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "No response from OpenAI");
}

#[tokio::test]
async fn given_upstream_failure_when_chatting_then_returns_generic_error() {
    let (app, _) = create_test_app(MockCompletionClient::scripted([ScriptedReply::Error(
        CompletionError::Upstream("HTTP 503".to_string()),
    )]));

    let response = app.oneshot(post_json("/api/chat", HELLO)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Failed to get response from OpenAI"
    );
}

#[tokio::test]
async fn given_fragments_when_streaming_then_events_end_with_done() {
    let (app, _) = create_test_app(MockCompletionClient::scripted([ScriptedReply::fragments([
        "Hel", "lo",
    ])]));

    let response = app
        .oneshot(post_json("/api/chat/stream", HELLO))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    let payloads = SseDecoder::new().push(&body_bytes(response).await);
    assert_eq!(
        payloads,
        vec![r#"{"content":"Hel"}"#, r#"{"content":"lo"}"#, "[DONE]"]
    );
}

#[tokio::test]
async fn given_stream_failing_midway_when_streaming_then_done_is_not_sent() {
    let (app, _) = create_test_app(MockCompletionClient::scripted([ScriptedReply::BrokenStream(
        vec!["partial".to_string()],
        CompletionError::Transport("reset".to_string()),
    )]));

    let response = app
        .oneshot(post_json("/api/chat/stream", HELLO))
        .await
        .unwrap();

    let payloads = SseDecoder::new().push(&body_bytes(response).await);
    assert_eq!(payloads, vec![r#"{"content":"partial"}"#]);
}

#[tokio::test]
async fn given_stream_start_failure_when_streaming_then_returns_error_json() {
    let (app, _) = create_test_app(MockCompletionClient::scripted([ScriptedReply::Error(
        CompletionError::Transport("refused".to_string()),
    )]));

    let response = app
        .oneshot(post_json("/api/chat/stream", HELLO))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Failed to get streaming response from OpenAI"
    );
}

#[tokio::test]
async fn given_file_when_uploading_then_it_can_be_fetched_back() {
    let (app, _) = create_test_app(MockCompletionClient::new());

    let response = app
        .clone()
        .oneshot(multipart_upload(&[
            ("file", Some("notes.txt"), b"hello world".as_slice()),
            ("messageId", None, b"msg-1".as_slice()),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["file"]["filename"], "notes.txt");
    assert_eq!(json["file"]["filetype"], "text/plain");
    assert_eq!(json["file"]["filesize"], 11);
    let filepath = json["file"]["filepath"].as_str().unwrap().to_string();
    assert!(filepath.starts_with("/uploads/"));
    assert!(filepath.ends_with(".txt"));

    let response = app
        .oneshot(Request::builder().uri(&filepath).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"hello world");
}

#[tokio::test]
async fn given_no_file_field_when_uploading_then_returns_bad_request() {
    let (app, _) = create_test_app(MockCompletionClient::new());

    let response = app
        .oneshot(multipart_upload(&[("messageId", None, b"msg-1".as_slice())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file provided");
}

#[tokio::test]
async fn given_oversized_file_when_uploading_then_returns_bad_request() {
    let mut settings = Settings::default();
    settings.uploads.max_file_size_mb = 0;
    let (app, _) = create_test_app_with(MockCompletionClient::new(), settings);
    let large = vec![b'x'; 200 * 1024];

    let response = app
        .oneshot(multipart_upload(&[("file", Some("big.txt"), large.as_slice())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn given_unknown_upload_when_fetching_then_returns_not_found() {
    let (app, _) = create_test_app(MockCompletionClient::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/uploads/missing.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
