//! HTTP transport tests against an in-process server.

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use chatline_config::{ChatlineConfig, DEFAULT_ERROR_NOTICE, DEFAULT_GREETING, HttpConfig};
use chatline_core::{
    ChatController, ChatError, ChatEvent, ChatRequest, ChatTransport, ControllerSettings,
    HttpTransport, MemoryStore, Message, SessionStore, TurnOutcome,
};
use chatline_test_utils::RecordingSink;
use futures_util::stream;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

const STREAMED_BODY: &str =
    "{\"response\":\"Hi\"}\n{\"response\":\" th\u{e9}\",\"p\":\"abc\"}\n{\"response\":\"re\"}";

#[derive(Clone, Default)]
struct Received {
    requests: Arc<Mutex<Vec<(Option<String>, ChatRequest)>>>,
}

async fn chat(
    State(received): State<Received>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let client = headers
        .get("x-client")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    received.requests.lock().push((client, request));
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = STREAMED_BODY
        .as_bytes()
        .chunks(5)
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();
    Body::from_stream(stream::iter(chunks)).into_response()
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn spawn_server(received: Received) -> SocketAddr {
    let app = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/down", post(unavailable))
        .with_state(received);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn transport_for(endpoint: String) -> Arc<dyn ChatTransport> {
    let config = ChatlineConfig::builder()
        .endpoint(endpoint)
        .http(HttpConfig {
            connect_timeout_secs: Some(5),
            headers: BTreeMap::from([("x-client".to_string(), "chatline-test".to_string())]),
        })
        .build();
    Arc::new(HttpTransport::from_config(&config).expect("transport"))
}

fn controller() -> ChatController {
    controller_with_sink().0
}

fn controller_with_sink() -> (ChatController, Arc<RecordingSink>) {
    let store = SessionStore::with_keys(Arc::new(MemoryStore::new()), "chatHistory", "savedMessages");
    let sink = Arc::new(RecordingSink::new());
    let controller = ChatController::new(store, sink.clone(), ControllerSettings::default());
    (controller, sink)
}

/// A chunked body split mid-record and mid-character is reassembled.
#[tokio::test]
async fn streams_chunked_reply_from_endpoint() {
    let received = Received::default();
    let addr = spawn_server(received.clone()).await;
    let mut controller = controller();

    let outcome = controller
        .send("Hello", transport_for(format!("http://{addr}/api/chat")))
        .await
        .expect("accepted");

    assert!(matches!(outcome, TurnOutcome::Completed(ref m) if m.content == "Hi th\u{e9}re"));
    let requests = received.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.as_deref(), Some("chatline-test"));
    assert_eq!(
        requests[0].1.messages,
        vec![Message::assistant(DEFAULT_GREETING), Message::user("Hello")]
    );
}

/// A non-success status is reported as a status error.
#[tokio::test]
async fn non_success_status_fails_the_turn() {
    let addr = spawn_server(Received::default()).await;
    let mut controller = controller();

    let outcome = controller
        .send("Hello", transport_for(format!("http://{addr}/api/down")))
        .await
        .expect("accepted");

    assert!(matches!(outcome, TurnOutcome::Failed(ChatError::Status(503))));
    assert_eq!(
        controller.transcript().last(),
        Some(&Message::user("Hello"))
    );
}

/// A refused connection fails the turn with the notice and re-enables input.
#[tokio::test]
async fn unreachable_endpoint_fails_the_turn() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let (mut controller, sink) = controller_with_sink();
    let before = controller.transcript().to_vec();

    let outcome = controller
        .send("Hello", transport_for(format!("http://{addr}/api/chat")))
        .await
        .expect("accepted");

    assert!(matches!(outcome, TurnOutcome::Failed(ChatError::Request(_))));
    let mut expected = before;
    expected.push(Message::user("Hello"));
    assert_eq!(controller.transcript(), expected.as_slice());

    let events = sink.events();
    let notice = events.iter().find_map(|event| match event {
        ChatEvent::TurnFailed { notice, .. } => Some(notice.clone()),
        _ => None,
    });
    assert_eq!(
        notice.map(|view| view.content),
        Some(DEFAULT_ERROR_NOTICE.to_string())
    );
    assert_eq!(events.last(), Some(&ChatEvent::InputReady));
    assert!(!controller.is_busy());
}

/// Invalid header names are rejected when building the transport.
#[test]
fn invalid_header_is_a_config_error() {
    let config = ChatlineConfig::builder()
        .http(HttpConfig {
            connect_timeout_secs: None,
            headers: BTreeMap::from([("bad header".to_string(), "x".to_string())]),
        })
        .build();
    assert!(matches!(
        HttpTransport::from_config(&config),
        Err(ChatError::Config(_))
    ));
}
