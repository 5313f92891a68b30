use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::StreamExt;
use serde_json::{Value, json};

use ringo_chat::application::ports::{
    CompletionClient, CompletionError, CompletionMessage, CompletionRequest,
};
use ringo_chat::domain::{ContentPart, MessageContent, MessageRole};
use ringo_chat::infrastructure::llm::create_completion_client;
use ringo_chat::presentation::config::{LlmProvider, LlmSettings};

#[derive(Clone, Default)]
struct Upstream {
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    status: Option<StatusCode>,
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    upstream.seen.lock().unwrap().push((auth, body.clone()));

    if let Some(status) = upstream.status {
        return (status, "upstream exploded").into_response();
    }

    if body["stream"] == true {
        let events = [
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#,
            "data: [DONE]",
        ]
        .map(|line| format!("{}\n\n", line))
        .concat();
        return ([("content-type", "text/event-stream")], events).into_response();
    }

    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": "Hello from upstream"}}]
    }))
    .into_response()
}

async fn spawn_upstream(upstream: Upstream) -> SocketAddr {
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn settings_for(addr: SocketAddr, api_key: &str) -> LlmSettings {
    LlmSettings {
        provider: LlmProvider::OpenAi,
        base_url: Some(format!("http://{}", addr)),
        api_key: api_key.to_string(),
        ..LlmSettings::default()
    }
}

fn hello() -> CompletionRequest {
    CompletionRequest::new(vec![CompletionMessage::new(MessageRole::User, "Hello")])
}

#[tokio::test]
async fn given_configured_key_when_completing_then_sends_bearer_and_defaults() {
    let upstream = Upstream::default();
    let addr = spawn_upstream(upstream.clone()).await;
    let client = create_completion_client(&settings_for(addr, "test-key")).unwrap();

    let reply = client.complete(&hello()).await.unwrap();

    assert_eq!(reply, "Hello from upstream");
    let seen = upstream.seen.lock().unwrap();
    let (auth, body) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Hello");
    assert!(body.get("stream").is_none());
}

#[tokio::test]
async fn given_request_overrides_when_completing_then_they_win_over_settings() {
    let upstream = Upstream::default();
    let addr = spawn_upstream(upstream.clone()).await;
    let client = create_completion_client(&settings_for(addr, "test-key")).unwrap();
    let request = CompletionRequest {
        model: Some("gpt-4o".to_string()),
        max_tokens: Some(42),
        ..hello()
    };

    client.complete(&request).await.unwrap();

    let seen = upstream.seen.lock().unwrap();
    assert_eq!(seen[0].1["model"], "gpt-4o");
    assert_eq!(seen[0].1["max_tokens"], 42);
}

#[tokio::test]
async fn given_image_content_when_completing_then_parts_are_sent() {
    let upstream = Upstream::default();
    let addr = spawn_upstream(upstream.clone()).await;
    let client = create_completion_client(&settings_for(addr, "test-key")).unwrap();
    let content = MessageContent::Parts(vec![
        ContentPart::text("What is this?"),
        ContentPart::image("aGVsbG8=", "image/png"),
    ]);
    let request =
        CompletionRequest::new(vec![CompletionMessage::new(MessageRole::User, content)]);

    client.complete(&request).await.unwrap();

    let seen = upstream.seen.lock().unwrap();
    let parts = &seen[0].1["messages"][0]["content"];
    assert_eq!(parts[0]["type"], "text");
    assert_eq!(parts[1]["type"], "image_url");
    assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,aGVsbG8=");
}

#[tokio::test]
async fn given_streaming_upstream_when_streaming_then_yields_content_fragments() {
    let upstream = Upstream::default();
    let addr = spawn_upstream(upstream.clone()).await;
    let client = create_completion_client(&settings_for(addr, "test-key")).unwrap();

    let fragments: Vec<String> = client
        .complete_stream(&hello())
        .await
        .unwrap()
        .map(|fragment| fragment.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["Hel", "lo"]);
    assert_eq!(upstream.seen.lock().unwrap()[0].1["stream"], true);
}

#[tokio::test]
async fn given_failing_upstream_when_completing_then_returns_upstream_error() {
    let upstream = Upstream {
        status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        ..Upstream::default()
    };
    let addr = spawn_upstream(upstream).await;
    let client = create_completion_client(&settings_for(addr, "test-key")).unwrap();

    let error = client.complete(&hello()).await.unwrap_err();

    match error {
        CompletionError::Upstream(message) => assert!(message.contains("500")),
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn given_missing_key_when_completing_then_fails_without_calling_upstream() {
    let upstream = Upstream::default();
    let addr = spawn_upstream(upstream.clone()).await;
    let client = create_completion_client(&settings_for(addr, "  ")).unwrap();

    let error = client.complete(&hello()).await.unwrap_err();
    let stream_error = client.complete_stream(&hello()).await.err().unwrap();

    assert!(error.is_config());
    assert!(stream_error.is_config());
    assert_eq!(
        error.to_string(),
        "configuration error: OpenAI API key not configured"
    );
    assert!(upstream.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn given_no_messages_when_completing_then_returns_validation_error() {
    let upstream = Upstream::default();
    let addr = spawn_upstream(upstream.clone()).await;
    let client = create_completion_client(&settings_for(addr, "test-key")).unwrap();

    let error = client
        .complete(&CompletionRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(error, CompletionError::Validation(_)));
    assert!(upstream.seen.lock().unwrap().is_empty());
}

#[test]
fn given_azure_without_endpoint_when_creating_then_returns_config_error() {
    let settings = LlmSettings {
        provider: LlmProvider::Azure,
        api_key: "key".to_string(),
        ..LlmSettings::default()
    };

    assert!(matches!(
        create_completion_client(&settings),
        Err(CompletionError::Config(_))
    ));
}
