// src/commands/streaming.rs

use std::sync::Arc;

use futures::StreamExt;
use reqwest_eventsource::{Error as SseError, Event};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::db::iso_now;
use crate::error::PlaygroundError;
use crate::messages::TEXT_EMPTY_RESPONSE;
use crate::session::{self, Flow, StreamEvent, StreamSession};
use crate::state::{ActiveRequest, PlaygroundState, Shared};
use crate::types::{ApiErrorInfo, DebugTab};

/// Handle onto a running request. Dropping it does not cancel the request;
/// use [`PlaygroundState::stop_generator`] for that.
#[derive(Debug)]
pub struct RequestHandle {
    id: u64,
    task: JoinHandle<()>,
}

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the request task to end, whether it finished, failed or
    /// was stopped.
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!(request_id = self.id, error = %e, "request task panicked");
            }
        }
    }
}

impl PlaygroundState {
    /// Sends `payload` to the chat endpoint, streaming the reply into the
    /// last message when `is_stream` is set. Any connection still open from
    /// a previous request is closed first.
    pub fn send_request(&self, payload: Value, is_stream: bool) -> RequestHandle {
        let request_id = {
            let mut inner = self.shared.lock();
            inner.close_active_request();

            inner.debug.request = Some(payload.clone());
            inner.debug.timestamp = Some(iso_now());
            inner.debug.response = None;
            inner.debug.active_tab = DebugTab::Request;

            let id = inner.next_request_id;
            inner.next_request_id += 1;
            inner.active_request = Some(ActiveRequest { id, task: None });
            id
        };

        info!(request_id, is_stream, "sending chat request");

        let shared = self.shared.clone();
        let api = self.api.clone();
        let task = if is_stream {
            tokio::spawn(run_stream(shared, api, request_id, payload))
        } else {
            tokio::spawn(run_completion(shared, api, request_id, payload))
        };

        let mut inner = self.shared.lock();
        if let Some(active) = inner.active_request.as_mut().filter(|a| a.id == request_id) {
            active.task = Some(task.abort_handle());
        }

        RequestHandle {
            id: request_id,
            task,
        }
    }

    /// Closes the active connection and finalizes a generating last
    /// message. After this returns no further event of that request is
    /// applied. Safe to call when nothing is running.
    pub fn stop_generator(&self) {
        let mut inner = self.shared.lock();
        if inner.close_active_request() {
            info!("stopped generation");
        }
        if let Some(snapshot) = session::finalize_generating(&mut inner.messages) {
            self.shared.saver.save(snapshot);
        }
    }
}

fn map_sse_event(event: Option<Result<Event, SseError>>) -> StreamEvent {
    match event {
        Some(Ok(Event::Open)) => StreamEvent::Open,
        Some(Ok(Event::Message(msg))) => StreamEvent::Data(msg.data),
        Some(Err(SseError::InvalidStatusCode(status, _))) => StreamEvent::HttpStatus(status.as_u16()),
        Some(Err(SseError::StreamEnded)) | None => StreamEvent::Ended,
        Some(Err(e)) => StreamEvent::TransportError(e.to_string()),
    }
}

/// Applies one transport event if `request_id` still owns the message
/// list. A request that lost ownership is told to close.
fn apply_event(
    shared: &Shared,
    request_id: u64,
    stream: &mut StreamSession,
    event: StreamEvent,
) -> Flow {
    let mut guard = shared.lock();
    if !guard.owns_request(request_id) {
        debug!(request_id, "dropping event for inactive request");
        return Flow::Close;
    }

    let inner = &mut *guard;
    let step = stream.handle(event, &mut inner.messages, &mut inner.debug);
    if let Some(snapshot) = step.snapshot {
        shared.saver.save(snapshot);
    }
    if step.flow == Flow::Close {
        inner.active_request = None;
    }
    step.flow
}

async fn run_stream(shared: Arc<Shared>, api: ApiClient, request_id: u64, payload: Value) {
    let mut stream = StreamSession::new();

    let mut es = match api.chat_stream(&payload) {
        Ok(es) => es,
        Err(e) => {
            apply_event(&shared, request_id, &mut stream, StreamEvent::ConnectFailed(e.to_string()));
            return;
        }
    };

    loop {
        let event = map_sse_event(es.next().await);
        if apply_event(&shared, request_id, &mut stream, event) == Flow::Close {
            es.close();
            break;
        }
    }

    debug!(request_id, phase = ?stream.phase(), "stream closed");
}

async fn run_completion(shared: Arc<Shared>, api: ApiClient, request_id: u64, payload: Value) {
    let result = api.chat_completion(&payload).await;

    let mut guard = shared.lock();
    if !guard.owns_request(request_id) {
        debug!(request_id, "dropping response for inactive request");
        return;
    }

    let inner = &mut *guard;
    inner.active_request = None;
    inner.debug.active_tab = DebugTab::Response;

    let snapshot = match result {
        Ok((raw, response)) => {
            inner.debug.response =
                Some(serde_json::to_string_pretty(&raw).unwrap_or_else(|_| raw.to_string()));
            match response.choices.into_iter().next() {
                Some(choice) => {
                    let message = choice.message.unwrap_or_default();
                    session::apply_completion(
                        &mut inner.messages,
                        message.content.as_deref().unwrap_or(""),
                        message.reasoning_content.as_deref().unwrap_or(""),
                    )
                }
                None => {
                    warn!(request_id, "completion response had no choices");
                    session::apply_request_error(&mut inner.messages, TEXT_EMPTY_RESPONSE)
                }
            }
        }
        Err(e) => {
            warn!(request_id, error = %e, "non-stream request failed");
            let status = match &e {
                PlaygroundError::Api { status, .. } => Some(*status),
                _ => None,
            };
            inner.debug.response = Some(ApiErrorInfo::new(e.to_string(), status).to_pretty());
            session::apply_request_error(&mut inner.messages, &e.to_string())
        }
    };

    if let Some(snapshot) = snapshot {
        shared.saver.save(snapshot);
    }
}
