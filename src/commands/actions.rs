// src/commands/actions.rs

use tracing::{debug, info, warn};

use crate::clipboard::copy_with_fallback;
use crate::error::{PlaygroundError, Result};
use crate::interaction::Notice;
use crate::messages::{
    build_api_payload, create_loading_assistant_message, get_text_content, replace_text_content,
    TEXT_COPIED, TEXT_COPY_FAILED, TEXT_NO_TEXT_CONTENT,
};
use crate::state::PlaygroundState;
use crate::types::{EditBuffer, EditResolution, Message, Role};

use super::streaming::RequestHandle;

/// Locates `target` by full equality first, then by id.
fn find_index(messages: &[Message], target: &Message) -> Option<usize> {
    messages
        .iter()
        .position(|m| m == target)
        .or_else(|| messages.iter().position(|m| m.id == target.id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    NothingToCopy,
}

impl PlaygroundState {
    /// Regenerates from `target`: for a user message, from that message;
    /// for an assistant or system message, from the nearest user message
    /// before it. Everything from that user message on is replaced.
    pub fn reset_message(&self, target: &Message) -> Result<Option<RequestHandle>> {
        let text = {
            let mut inner = self.shared.lock();
            let Some(idx) = find_index(&inner.messages, target) else {
                debug!(message_id = %target.id, "reset target not in conversation");
                return Ok(None);
            };

            let anchor = match target.role {
                Role::User => Some(idx),
                Role::Assistant | Role::System => inner.messages[..idx]
                    .iter()
                    .rposition(|m| m.role == Role::User),
            };
            let Some(anchor) = anchor else {
                warn!(message_id = %target.id, "no user message to regenerate from");
                return Ok(None);
            };

            let text = get_text_content(&inner.messages[anchor]).to_string();
            inner.messages.truncate(anchor);
            text
        };

        self.send_message(&text).map(Some)
    }

    /// Deletes `target` after confirmation. A user message followed by an
    /// assistant reply is removed together with it. Returns how many
    /// messages were removed; a target no longer in the list removes none.
    pub fn delete_message(&self, target: &Message) -> Result<usize> {
        if !self.interaction.confirm_delete(target) {
            return Ok(0);
        }

        let removed = {
            let mut inner = self.shared.lock();
            let Some(idx) = find_index(&inner.messages, target) else {
                debug!(message_id = %target.id, "delete target not in conversation");
                return Ok(0);
            };

            let with_reply = target.role == Role::User
                && inner
                    .messages
                    .get(idx + 1)
                    .is_some_and(|next| next.role == Role::Assistant);
            let end = if with_reply { idx + 1 } else { idx };

            let removes_generating = end + 1 == inner.messages.len()
                && inner.messages[end].status.is_generating();
            if removes_generating {
                inner.close_active_request();
            }

            inner.messages.drain(idx..=end);
            self.save_messages(inner.messages.clone());
            end - idx + 1
        };

        info!(message_id = %target.id, removed, "deleted message");
        let text = if removed == 2 {
            "Message and its reply deleted"
        } else {
            "Message deleted"
        };
        self.interaction.notify(Notice::success(text));
        Ok(removed)
    }

    /// Copies the text of `target`, falling back to the secondary
    /// clipboard when the primary one fails.
    pub fn copy_message(&self, target: &Message) -> Result<CopyOutcome> {
        let text = get_text_content(target);
        if text.is_empty() {
            self.interaction.notify(Notice::warning(TEXT_NO_TEXT_CONTENT));
            return Ok(CopyOutcome::NothingToCopy);
        }

        match copy_with_fallback(&*self.clipboard, &*self.fallback_clipboard, text) {
            Ok(()) => {
                self.interaction.notify(Notice::success(TEXT_COPIED));
                Ok(CopyOutcome::Copied)
            }
            Err(e) => {
                warn!(error = %e, "copy failed");
                self.interaction.notify(Notice::error(TEXT_COPY_FAILED));
                Err(e)
            }
        }
    }

    /// Switches an assistant message to system or back. User messages are
    /// left alone. Returns whether anything changed.
    pub fn toggle_role(&self, target: &Message) -> bool {
        let new_role = match target.role {
            Role::Assistant => Role::System,
            Role::System => Role::Assistant,
            Role::User => return false,
        };

        {
            let mut inner = self.shared.lock();
            let mut changed = false;
            for message in inner
                .messages
                .iter_mut()
                .filter(|m| m.id == target.id && m.role != Role::User)
            {
                message.role = new_role;
                changed = true;
            }
            if !changed {
                return false;
            }
            self.save_messages(inner.messages.clone());
        }

        let label = match new_role {
            Role::System => "System",
            _ => "AI",
        };
        self.interaction
            .notify(Notice::success(format!("Switched to {label} role")));
        true
    }

    pub fn start_edit(&self, target: &Message) {
        self.shared.lock().editing = Some(EditBuffer {
            message_id: target.id.clone(),
            value: get_text_content(target).to_string(),
        });
    }

    pub fn set_edit_value(&self, value: impl Into<String>) {
        if let Some(editing) = self.shared.lock().editing.as_mut() {
            editing.value = value.into();
        }
    }

    pub fn cancel_edit(&self) {
        self.shared.lock().editing = None;
    }

    /// Commits the edit buffer. A blank value is rejected with a warning.
    /// Editing a user message that has a reply asks the host whether to
    /// regenerate from it or keep the rest of the conversation.
    pub fn save_edit(&self) -> Result<Option<RequestHandle>> {
        let Some(buffer) = self.editing() else {
            return Ok(None);
        };
        if buffer.value.trim().is_empty() {
            self.interaction
                .notify(Notice::warning("Message content cannot be empty"));
            return Ok(None);
        }

        let (target, has_reply) = {
            let mut inner = self.shared.lock();
            let Some(idx) = inner.messages.iter().position(|m| m.id == buffer.message_id) else {
                inner.editing = None;
                return Err(PlaygroundError::MessageNotFound(buffer.message_id));
            };
            let target = inner.messages[idx].clone();
            let has_reply = target.role == Role::User
                && inner
                    .messages
                    .get(idx + 1)
                    .is_some_and(|next| next.role == Role::Assistant);
            (target, has_reply)
        };

        let resolution = if has_reply {
            self.interaction.resolve_edit(&target)
        } else {
            EditResolution::KeepAll
        };

        let mut inner = self.shared.lock();
        inner.editing = None;
        let Some(idx) = inner.messages.iter().position(|m| m.id == buffer.message_id) else {
            return Err(PlaygroundError::MessageNotFound(buffer.message_id));
        };
        inner.messages[idx].content = replace_text_content(&inner.messages[idx].content, &buffer.value);

        match resolution {
            EditResolution::KeepAll => {
                self.save_messages(inner.messages.clone());
                drop(inner);
                self.interaction.notify(Notice::success("Message updated"));
                Ok(None)
            }
            EditResolution::Regenerate => {
                inner.messages.truncate(idx + 1);
                let payload = serde_json::to_value(build_api_payload(
                    &inner.messages,
                    None,
                    &inner.config.inputs,
                    &inner.config.parameter_enabled,
                ))?;
                let loading = create_loading_assistant_message(&mut inner.ids);
                inner.messages.push(loading);
                let is_stream = inner.config.inputs.stream;
                drop(inner);

                info!(message_id = %buffer.message_id, "regenerating after edit");
                Ok(Some(self.send_request(payload, is_stream)))
            }
        }
    }
}
