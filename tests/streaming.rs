// tests/streaming.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_playground::api::{CHAT_COMPLETIONS_PATH, USER_GROUPS_PATH, USER_MODELS_PATH};
use chat_playground::settings::MESSAGES_KEY;
use chat_playground::types::{DebugTab, Message, MessageContent, MessageStatus, Role};
use chat_playground::{ApiClient, MemoryStorage, PlaygroundState, Result, Storage};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records every message-list write on top of an in-memory store.
struct RecordingStorage {
    inner: MemoryStorage,
    message_writes: Mutex<Vec<Vec<Message>>>,
}

impl RecordingStorage {
    fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            message_writes: Mutex::new(Vec::new()),
        }
    }

    fn writes(&self) -> Vec<Vec<Message>> {
        self.message_writes.lock().unwrap().clone()
    }
}

impl Storage for RecordingStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if key == MESSAGES_KEY {
            let envelope: Value = serde_json::from_str(value).unwrap();
            let messages: Vec<Message> =
                serde_json::from_value(envelope["messages"].clone()).unwrap();
            self.message_writes.lock().unwrap().push(messages);
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.inner.remove_item(key)
    }
}

fn sse(data: &str) -> String {
    format!("data: {data}\n\n")
}

fn delta(content: Option<&str>, reasoning: Option<&str>) -> String {
    sse(&json!({
        "choices": [{"delta": {"content": content, "reasoning_content": reasoning}}]
    })
    .to_string())
}

fn event_stream(events: &[String]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("cache-control", "no-cache")
        .set_body_raw(events.concat(), "text/event-stream")
}

/// Serves `response` for chat completions sent on behalf of user 1.
async fn chat_server(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_COMPLETIONS_PATH))
        .and(header("new-api-user", "1"))
        .respond_with(response)
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn sent_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), CHAT_COMPLETIONS_PATH);
    requests[0].body_json().unwrap()
}

fn text(message: &Message) -> &str {
    match &message.content {
        MessageContent::Text(text) => text,
        other => panic!("expected text content, got {other:?}"),
    }
}

async fn fresh_state(base_url: &str, storage: Arc<RecordingStorage>) -> PlaygroundState {
    let state = PlaygroundState::new(
        ApiClient::new(base_url).with_user_id("1"),
        storage.clone(),
    );
    state.clear_messages();
    state.flush_messages().await;
    storage.message_writes.lock().unwrap().clear();
    state
}

#[tokio::test]
async fn streamed_reply_is_saved_once_when_done() {
    let server = chat_server(event_stream(&[delta(Some("Hi"), None), sse("[DONE]")])).await;
    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state(&server.uri(), storage.clone()).await;

    let handle = state.send_message("hello").unwrap();
    let pending = state.messages();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[1].status, MessageStatus::Loading);

    handle.finished().await;
    state.flush_messages().await;

    let messages = state.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(text(&messages[0]), "hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(text(&messages[1]), "Hi");
    assert_eq!(messages[1].status, MessageStatus::Complete);

    assert_eq!(storage.writes(), vec![messages]);
    assert!(!state.is_generating());

    let body = sent_body(&server).await;
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][0]["content"], "hello");

    let debug = state.debug_data();
    assert_eq!(debug.active_tab, DebugTab::Response);
    assert!(debug.response.unwrap().contains("\"Hi\""));
}

#[tokio::test]
async fn reasoning_collapses_once_content_arrives() {
    let server = chat_server(event_stream(&[
        delta(None, Some("weighing options")),
        delta(Some("<think>more</think>Answer"), None),
        sse("[DONE]"),
    ]))
    .await;
    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state(&server.uri(), storage).await;

    state.send_message("question").unwrap().finished().await;

    let reply = state.messages().pop().unwrap();
    assert_eq!(reply.status, MessageStatus::Complete);
    assert_eq!(reply.reasoning_content.as_deref(), Some("weighing options"));
    assert!(reply.is_thinking_complete);
    assert!(reply.has_auto_collapsed);
    assert!(!reply.is_reasoning_expanded);
}

#[tokio::test]
async fn stop_finalizes_pending_reply_and_ignores_late_events() {
    let response = event_stream(&[delta(Some("too late"), None), sse("[DONE]")])
        .set_delay(Duration::from_millis(300));
    let server = chat_server(response).await;
    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state(&server.uri(), storage.clone()).await;

    let handle = state.send_message("go").unwrap();
    assert_eq!(state.messages()[1].status, MessageStatus::Loading);

    state.stop_generator();
    handle.finished().await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    state.flush_messages().await;

    let reply = state.messages().pop().unwrap();
    assert_eq!(reply.status, MessageStatus::Complete);
    assert_eq!(text(&reply), "");
    assert_eq!(reply.reasoning_content, None);
    assert!(!state.is_generating());
    assert_eq!(storage.writes().len(), 1);

    // a second stop has nothing left to do
    state.stop_generator();
    state.flush_messages().await;
    assert_eq!(storage.writes().len(), 1);
}

#[tokio::test]
async fn http_error_keeps_partial_progress() {
    let server = chat_server(
        ResponseTemplate::new(500).set_body_raw(r#"{"error":"boom"}"#, "application/json"),
    )
    .await;
    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state(&server.uri(), storage.clone()).await;

    state.send_message("hi").unwrap().finished().await;
    state.flush_messages().await;

    let reply = state.messages().pop().unwrap();
    assert_eq!(reply.status, MessageStatus::Error);
    assert_eq!(text(&reply), chat_playground::messages::TEXT_CONNECTION_LOST);
    assert_eq!(storage.writes().len(), 1);

    let response = state.debug_data().response.unwrap();
    assert!(response.contains("500"));
}

#[tokio::test]
async fn dropped_stream_without_terminator_is_an_error() {
    let server = chat_server(event_stream(&[delta(Some("half an answer"), None)])).await;
    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state(&server.uri(), storage).await;

    state.send_message("hi").unwrap().finished().await;

    let reply = state.messages().pop().unwrap();
    assert_eq!(reply.status, MessageStatus::Error);
    assert!(text(&reply).starts_with("half an answer"));
    assert!(text(&reply).ends_with(chat_playground::messages::TEXT_CONNECTION_FAILED));
}

#[tokio::test]
async fn single_shot_reply_fills_placeholder() {
    let body = json!({
        "choices": [{"message": {"content": "<think>hmm</think>Sure.", "reasoning_content": null}}]
    });
    let server = chat_server(ResponseTemplate::new(200).set_body_json(body)).await;
    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state(&server.uri(), storage.clone()).await;
    state.update_inputs(|inputs| inputs.stream = false);

    state.send_message("hi").unwrap().finished().await;
    state.flush_messages().await;

    let reply = state.messages().pop().unwrap();
    assert_eq!(reply.status, MessageStatus::Complete);
    assert_eq!(text(&reply), "Sure.");
    assert_eq!(reply.reasoning_content.as_deref(), Some("hmm"));
    assert_eq!(storage.writes().len(), 1);
    assert_eq!(sent_body(&server).await["stream"], false);
}

#[tokio::test]
async fn single_shot_error_status_becomes_request_error() {
    let server = chat_server(
        ResponseTemplate::new(429).set_body_raw(r#"{"error":"slow down"}"#, "application/json"),
    )
    .await;
    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state(&server.uri(), storage).await;
    state.update_inputs(|inputs| inputs.stream = false);

    state.send_message("hi").unwrap().finished().await;

    let reply = state.messages().pop().unwrap();
    assert_eq!(reply.status, MessageStatus::Error);
    assert!(text(&reply).starts_with(chat_playground::messages::TEXT_REQUEST_ERROR));
    assert!(text(&reply).contains("429"));
    assert!(state.debug_data().response.unwrap().contains("\"status\": 429"));
}

#[tokio::test]
async fn unreachable_server_marks_reply_failed() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state(&base_url, storage).await;

    state.send_message("anyone?").unwrap().finished().await;

    let reply = state.messages().pop().unwrap();
    assert_eq!(reply.status, MessageStatus::Error);
    assert!(!state.is_generating());
}

#[tokio::test]
async fn stop_when_idle_is_a_no_op() {
    let storage = Arc::new(RecordingStorage::new());
    let state = fresh_state("http://127.0.0.1:9", storage.clone()).await;
    let before = state.messages();

    state.stop_generator();
    state.flush_messages().await;

    assert_eq!(state.messages(), before);
    assert!(storage.writes().is_empty());
}

#[tokio::test]
async fn model_and_group_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_MODELS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "",
            "data": ["m1", "m2"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USER_GROUPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "",
            "data": {"default": {"desc": "Default", "ratio": 1}, "vip": {"desc": "VIP", "ratio": 0.5}}
        })))
        .mount(&server)
        .await;
    let state = PlaygroundState::new(ApiClient::new(&server.uri()), Arc::new(MemoryStorage::new()));

    let models = state.load_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(state.config().inputs.model, "m1");

    let groups = state.load_groups(Some("vip")).await.unwrap();
    assert_eq!(groups[0].value, "vip");
    assert_eq!(groups[0].ratio, 0.5);
}
