// src/session.rs
//
// State transitions of the message list while a reply is being produced.
// Every function here operates on the latest list it is handed and returns
// a snapshot whenever the list reached a state that must be persisted.

use tracing::{debug, warn};

use crate::messages::{
    TEXT_CONNECT_ERROR, TEXT_CONNECTION_FAILED, TEXT_CONNECTION_LOST, TEXT_PARSE_ERROR,
    TEXT_REQUEST_ERROR,
};
use crate::think::{process_incomplete_think_tags, process_think_tags, think_tags_closed};
use crate::types::{
    ApiErrorInfo, ChatCompletionChunk, DebugData, DebugTab, Message, MessageContent,
    MessageStatus, Role,
};

pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Reasoning,
    Content,
}

fn content_text(content: &MessageContent) -> String {
    crate::messages::content_text(content).to_string()
}

/// Collapses the reasoning panel the first time thinking completes. Later
/// calls never collapse again, so a manual re-expansion sticks.
pub fn apply_auto_collapse(message: &mut Message, thinking_complete: bool) {
    let should_collapse = thinking_complete && !message.has_auto_collapsed;
    message.is_thinking_complete = thinking_complete;
    message.has_auto_collapsed = should_collapse || message.has_auto_collapsed;
    if should_collapse {
        message.is_reasoning_expanded = false;
    }
}

/// Appends a streamed chunk to the in-flight assistant message. Returns
/// false when there is no such message.
pub fn stream_message_update(messages: &mut [Message], chunk: &str, kind: ChunkKind) -> bool {
    let Some(last) = messages.last_mut() else {
        return false;
    };
    if last.role != Role::Assistant || !last.status.is_generating() {
        return false;
    }

    match kind {
        ChunkKind::Reasoning => {
            last.reasoning_content
                .get_or_insert_with(String::new)
                .push_str(chunk);
            last.status = MessageStatus::Incomplete;
            last.is_thinking_complete = false;
        }
        ChunkKind::Content => {
            let mut content = content_text(&last.content);
            content.push_str(chunk);

            let closed_by_tags = last.is_reasoning_expanded && think_tags_closed(&content);
            let has_reasoning = last
                .reasoning_content
                .as_deref()
                .is_some_and(|r| !r.is_empty());
            let thinking_complete = (has_reasoning && !last.is_thinking_complete)
                || closed_by_tags
                || last.is_thinking_complete;

            last.content = MessageContent::Text(content);
            last.status = MessageStatus::Incomplete;
            apply_auto_collapse(last, thinking_complete);
        }
    }
    true
}

/// Moves the last message to a terminal status. Already terminal messages
/// are left alone.
pub fn complete_message(messages: &mut [Message], status: MessageStatus) -> Option<Vec<Message>> {
    let last = messages.last_mut()?;
    if last.status.is_terminal() {
        return None;
    }
    apply_auto_collapse(last, true);
    last.status = status;
    Some(messages.to_vec())
}

/// Resolves a generation that will receive no more chunks: any unclosed
/// think tag becomes reasoning and the message completes. No-op when the
/// last message is not generating.
pub fn finalize_generating(messages: &mut [Message]) -> Option<Vec<Message>> {
    let last = messages.last_mut()?;
    if !last.status.is_generating() {
        return None;
    }

    let processed = process_incomplete_think_tags(
        &content_text(&last.content),
        last.reasoning_content.as_deref().unwrap_or(""),
    );

    apply_auto_collapse(last, true);
    last.status = MessageStatus::Complete;
    last.content = MessageContent::Text(processed.content);
    last.reasoning_content = Some(processed.reasoning_content).filter(|r| !r.is_empty());
    Some(messages.to_vec())
}

/// Fills the loading placeholder from a single-shot response.
pub fn apply_completion(messages: &mut [Message], content: &str, reasoning: &str) -> Option<Vec<Message>> {
    let last = messages.last_mut()?;
    if last.status != MessageStatus::Loading {
        return None;
    }

    let processed = process_think_tags(content, reasoning);
    apply_auto_collapse(last, true);
    last.content = MessageContent::Text(processed.content);
    last.reasoning_content = Some(processed.reasoning_content);
    last.status = MessageStatus::Complete;
    Some(messages.to_vec())
}

/// Replaces the loading placeholder with a request error.
pub fn apply_request_error(messages: &mut [Message], error: &str) -> Option<Vec<Message>> {
    let last = messages.last_mut()?;
    if last.status != MessageStatus::Loading {
        return None;
    }

    apply_auto_collapse(last, true);
    last.content = MessageContent::Text(format!("{TEXT_REQUEST_ERROR}{error}"));
    last.status = MessageStatus::Error;
    Some(messages.to_vec())
}

/// Connection state of one streamed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamPhase {
    #[default]
    Idle,
    Streaming,
    Done,
    Errored,
}

impl StreamPhase {
    pub fn is_finished(self) -> bool {
        matches!(self, StreamPhase::Done | StreamPhase::Errored)
    }

    /// Applies a transition if it is legal. Finished phases are final.
    fn advance(&mut self, next: StreamPhase) -> bool {
        let allowed = matches!(
            (*self, next),
            (StreamPhase::Idle, StreamPhase::Streaming)
                | (StreamPhase::Idle, StreamPhase::Errored)
                | (StreamPhase::Streaming, StreamPhase::Streaming)
                | (StreamPhase::Streaming, StreamPhase::Done)
                | (StreamPhase::Streaming, StreamPhase::Errored)
        );
        if allowed {
            *self = next;
        }
        allowed
    }
}

/// What the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Open,
    Data(String),
    HttpStatus(u16),
    TransportError(String),
    /// The server closed the stream without sending the terminator.
    Ended,
    ConnectFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

#[derive(Debug)]
pub struct StreamStep {
    pub flow: Flow,
    pub snapshot: Option<Vec<Message>>,
}

impl StreamStep {
    fn proceed() -> Self {
        Self {
            flow: Flow::Continue,
            snapshot: None,
        }
    }

    fn close(snapshot: Option<Vec<Message>>) -> Self {
        Self {
            flow: Flow::Close,
            snapshot,
        }
    }
}

/// Per-connection bookkeeping for a streamed reply.
#[derive(Debug, Default)]
pub struct StreamSession {
    phase: StreamPhase,
    raw_response: String,
    received_first: bool,
}

impl StreamSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }

    pub fn handle(
        &mut self,
        event: StreamEvent,
        messages: &mut [Message],
        debug_data: &mut DebugData,
    ) -> StreamStep {
        if self.phase.is_finished() {
            debug!(phase = ?self.phase, ?event, "ignoring event after stream finished");
            return StreamStep::close(None);
        }

        match event {
            StreamEvent::Open => {
                self.phase.advance(StreamPhase::Streaming);
                StreamStep::proceed()
            }
            StreamEvent::Data(data) => {
                self.phase.advance(StreamPhase::Streaming);
                if data == DONE_MARKER {
                    self.phase.advance(StreamPhase::Done);
                    debug_data.response = Some(self.raw_response.clone());
                    return StreamStep::close(complete_message(messages, MessageStatus::Complete));
                }
                self.handle_data(&data, messages, debug_data)
            }
            StreamEvent::HttpStatus(status) => {
                let info = ApiErrorInfo::new("HTTP status error", Some(status));
                debug_data.response =
                    Some(format!("{}\n\nHTTP Error:\n{}", self.raw_response, info.to_pretty()));
                debug_data.active_tab = DebugTab::Response;
                self.fail(messages, TEXT_CONNECTION_LOST)
            }
            StreamEvent::TransportError(detail) => {
                warn!(error = %detail, "SSE transport error");
                let info = ApiErrorInfo::new(detail, None);
                debug_data.response =
                    Some(format!("{}\n\nSSE Error:\n{}", self.raw_response, info.to_pretty()));
                debug_data.active_tab = DebugTab::Response;
                self.fail(messages, TEXT_CONNECTION_FAILED)
            }
            StreamEvent::Ended => {
                let info = ApiErrorInfo::new("stream ended before [DONE]", None);
                debug_data.response =
                    Some(format!("{}\n\nSSE Error:\n{}", self.raw_response, info.to_pretty()));
                debug_data.active_tab = DebugTab::Response;
                self.fail(messages, TEXT_CONNECTION_FAILED)
            }
            StreamEvent::ConnectFailed(detail) => {
                warn!(error = %detail, "failed to start SSE stream");
                let info = ApiErrorInfo::new(detail, None);
                debug_data.response = Some(format!("Stream start failed:\n{}", info.to_pretty()));
                debug_data.active_tab = DebugTab::Response;
                self.fail(messages, TEXT_CONNECT_ERROR)
            }
        }
    }

    fn handle_data(
        &mut self,
        data: &str,
        messages: &mut [Message],
        debug_data: &mut DebugData,
    ) -> StreamStep {
        let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "failed to parse SSE message");
                debug_data.response = Some(format!(
                    "{}\n\nError: parse error: {e}",
                    self.raw_response
                ));
                debug_data.active_tab = DebugTab::Response;
                return self.fail(messages, TEXT_PARSE_ERROR);
            }
        };

        self.raw_response.push_str(data);
        self.raw_response.push('\n');
        if !self.received_first {
            debug_data.active_tab = DebugTab::Response;
            self.received_first = true;
        }

        if let Some(delta) = chunk.choices.into_iter().next().and_then(|c| c.delta) {
            if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                stream_message_update(messages, &reasoning, ChunkKind::Reasoning);
            }
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                stream_message_update(messages, &content, ChunkKind::Content);
            }
        }
        StreamStep::proceed()
    }

    fn fail(&mut self, messages: &mut [Message], text: &str) -> StreamStep {
        self.phase.advance(StreamPhase::Errored);
        stream_message_update(messages, text, ChunkKind::Content);
        StreamStep::close(complete_message(messages, MessageStatus::Error))
    }
}
