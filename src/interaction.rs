// src/interaction.rs

use tracing::{error, info, warn};

use crate::types::{EditResolution, Message};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A short notification for actions that have no message to report on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// The host UI: confirmations, choices and notifications.
pub trait Interaction: Send + Sync {
    fn confirm_delete(&self, message: &Message) -> bool;
    fn resolve_edit(&self, message: &Message) -> EditResolution;
    fn notify(&self, notice: Notice);
}

/// Non-interactive host: approves deletions, keeps replies on edit and
/// logs notices.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessInteraction;

impl Interaction for HeadlessInteraction {
    fn confirm_delete(&self, _message: &Message) -> bool {
        true
    }

    fn resolve_edit(&self, _message: &Message) -> EditResolution {
        EditResolution::KeepAll
    }

    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(notice = %notice.text),
            NoticeLevel::Warning => warn!(notice = %notice.text),
            NoticeLevel::Error => error!(notice = %notice.text),
        }
    }
}
