// src/types/chat.rs

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Lifecycle of a message. Only an in-flight assistant turn is ever
/// `Loading` or `Incomplete`; everything else is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Loading,
    Incomplete,
    #[default]
    Complete,
    Error,
}

impl MessageStatus {
    pub fn is_generating(&self) -> bool {
        matches!(self, MessageStatus::Loading | MessageStatus::Incomplete)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_generating()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlData },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageUrlData {
    pub url: String,
}

/// One chat turn as held by the playground and mirrored to storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub is_reasoning_expanded: bool,
    #[serde(default)]
    pub is_thinking_complete: bool,
    #[serde(default)]
    pub has_auto_collapsed: bool,
    #[serde(default)]
    pub create_at: i64,
}

/// Edit buffer for the message currently being edited.
#[derive(Clone, Debug, PartialEq)]
pub struct EditBuffer {
    pub message_id: String,
    pub value: String,
}

/// What to do with the reply that follows an edited user message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditResolution {
    /// Drop the reply and everything after it, then regenerate.
    Regenerate,
    /// Keep every message and only persist the edited text.
    KeepAll,
}
