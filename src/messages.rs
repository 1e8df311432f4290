// src/messages.rs

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::db::unix_ms;
use crate::error::Result;
use crate::types::{
    ApiMessage, ChatCompletionRequest, ContentPart, ImageUrlData, Inputs, Message,
    MessageContent, MessageStatus, Parameter, ParameterEnabled, Role,
};

// User-facing strings substituted into messages and notices.
pub const TEXT_REQUEST_ERROR: &str = "Request error: ";
pub const TEXT_PARSE_ERROR: &str = "Error while parsing the response data";
pub const TEXT_CONNECTION_LOST: &str = "Connection lost";
pub const TEXT_CONNECTION_FAILED: &str = "Request failed";
pub const TEXT_CONNECT_ERROR: &str = "Error while establishing the connection";
pub const TEXT_NO_TEXT_CONTENT: &str = "This message has no text content to copy";
pub const TEXT_COPIED: &str = "Message copied to clipboard";
pub const TEXT_COPY_FAILED: &str = "Copy failed, please copy the text manually";
pub const TEXT_JSON_PARSE_ERROR: &str = "Invalid JSON in custom request body";
pub const TEXT_EMPTY_RESPONSE: &str = "The response contained no choices";

/// Hands out message ids for one playground instance.
#[derive(Debug, Clone)]
pub struct MessageIdGenerator {
    next: u64,
}

impl MessageIdGenerator {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Starts above every numeric id already present in `messages`.
    pub fn after(messages: &[Message]) -> Self {
        let highest = messages
            .iter()
            .filter_map(|m| m.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self::starting_at(highest.max(3) + 1)
    }

    pub fn next_id(&mut self) -> String {
        let id = self.next;
        self.next += 1;
        id.to_string()
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::starting_at(4)
    }
}

pub fn default_messages() -> Vec<Message> {
    vec![
        Message {
            id: "2".to_string(),
            role: Role::User,
            content: "Hello".into(),
            reasoning_content: None,
            status: MessageStatus::Complete,
            is_reasoning_expanded: false,
            is_thinking_complete: false,
            has_auto_collapsed: false,
            create_at: 1715676751919,
        },
        Message {
            id: "3".to_string(),
            role: Role::Assistant,
            content: "Hello! How can I help you today?".into(),
            reasoning_content: Some(String::new()),
            status: MessageStatus::Complete,
            is_reasoning_expanded: false,
            is_thinking_complete: false,
            has_auto_collapsed: false,
            create_at: 1715676751919,
        },
    ]
}

pub fn create_message(
    ids: &mut MessageIdGenerator,
    role: Role,
    content: impl Into<MessageContent>,
) -> Message {
    Message {
        id: ids.next_id(),
        role,
        content: content.into(),
        reasoning_content: None,
        status: MessageStatus::Complete,
        is_reasoning_expanded: false,
        is_thinking_complete: false,
        has_auto_collapsed: false,
        create_at: unix_ms(),
    }
}

pub fn create_loading_assistant_message(ids: &mut MessageIdGenerator) -> Message {
    Message {
        reasoning_content: Some(String::new()),
        status: MessageStatus::Loading,
        is_reasoning_expanded: true,
        ..create_message(ids, Role::Assistant, "")
    }
}

/// Plain text of a message: the first text part of multimodal content, or
/// the string itself.
pub fn get_text_content(message: &Message) -> &str {
    content_text(&message.content)
}

pub fn content_text(content: &MessageContent) -> &str {
    match content {
        MessageContent::Text(text) => text,
        MessageContent::Parts(parts) => parts
            .iter()
            .find_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or(""),
    }
}

/// Replaces the text of `content`, keeping any image parts in place.
pub fn replace_text_content(content: &MessageContent, text: &str) -> MessageContent {
    match content {
        MessageContent::Text(_) => MessageContent::Text(text.to_string()),
        MessageContent::Parts(parts) => {
            let mut parts = parts.clone();
            let replacement = ContentPart::Text {
                text: text.to_string(),
            };
            match parts
                .iter()
                .position(|part| matches!(part, ContentPart::Text { .. }))
            {
                Some(idx) => parts[idx] = replacement,
                None => parts.insert(0, replacement),
            }
            MessageContent::Parts(parts)
        }
    }
}

/// Builds user content, attaching non-blank image URLs as parts when
/// images are enabled.
pub fn build_message_content(text: &str, image_urls: &[String], image_enabled: bool) -> MessageContent {
    let valid: Vec<&str> = image_urls
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .collect();

    if !image_enabled || valid.is_empty() {
        return MessageContent::Text(text.to_string());
    }

    let mut parts = vec![ContentPart::Text {
        text: text.to_string(),
    }];
    parts.extend(valid.into_iter().map(|url| ContentPart::ImageUrl {
        image_url: ImageUrlData {
            url: url.to_string(),
        },
    }));
    MessageContent::Parts(parts)
}

/// Inlines a local image as a `data:` URL usable in an `image_url` part.
pub fn image_data_url(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mime = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

pub fn last_user_index(messages: &[Message]) -> Option<usize> {
    messages.iter().rposition(|m| m.role == Role::User)
}

pub fn build_api_payload(
    messages: &[Message],
    system_prompt: Option<&str>,
    inputs: &Inputs,
    enabled: &ParameterEnabled,
) -> ChatCompletionRequest {
    let mut api_messages: Vec<ApiMessage> = messages
        .iter()
        .map(|m| ApiMessage {
            role: m.role,
            content: m.content.clone(),
        })
        .collect();

    if let Some(prompt) = system_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        api_messages.insert(
            0,
            ApiMessage {
                role: Role::System,
                content: MessageContent::Text(prompt.to_string()),
            },
        );
    }

    let pick = |param: Parameter| enabled.is_enabled(param);

    ChatCompletionRequest {
        model: inputs.model.clone(),
        group: inputs.group.clone(),
        messages: api_messages,
        stream: inputs.stream,
        temperature: pick(Parameter::Temperature).then_some(inputs.temperature),
        top_p: pick(Parameter::TopP).then_some(inputs.top_p),
        max_tokens: pick(Parameter::MaxTokens).then_some(inputs.max_tokens),
        frequency_penalty: pick(Parameter::FrequencyPenalty).then_some(inputs.frequency_penalty),
        presence_penalty: pick(Parameter::PresencePenalty).then_some(inputs.presence_penalty),
        seed: if pick(Parameter::Seed) { inputs.seed } else { None },
    }
}
