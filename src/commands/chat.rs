// src/commands/chat.rs

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::db::iso_now;
use crate::error::{PlaygroundError, Result};
use crate::interaction::Notice;
use crate::messages::{
    build_api_payload, build_message_content, create_loading_assistant_message, create_message,
    default_messages, get_text_content, last_user_index, MessageIdGenerator,
    TEXT_JSON_PARSE_ERROR,
};
use crate::models::{process_groups_data, process_models_data};
use crate::settings;
use crate::state::PlaygroundState;
use crate::types::{DebugTab, GroupOption, Inputs, ModelOption, Parameter, Role};

use super::streaming::RequestHandle;

const PREVIEW_PLACEHOLDER_TEXT: &str = "Example message";

impl PlaygroundState {
    /// Appends the user message and a loading assistant message, then
    /// starts the request. A generation still running is stopped first,
    /// unless the custom request body is invalid. The list is persisted
    /// once the reply completes or fails.
    pub fn send_message(&self, text: &str) -> Result<RequestHandle> {
        let custom = {
            let inner = self.shared.lock();
            let body = inner.config.custom_request_body.trim();
            (inner.config.custom_request_mode && !body.is_empty()).then(|| body.to_string())
        };
        let custom_payload = match custom.map(|body| serde_json::from_str::<Value>(&body)) {
            Some(Ok(payload)) => Some(payload),
            Some(Err(e)) => {
                warn!(error = %e, "custom request body is not valid JSON");
                self.interaction.notify(Notice::error(TEXT_JSON_PARSE_ERROR));
                return Err(PlaygroundError::InvalidCustomBody(e.to_string()));
            }
            None => None,
        };

        if self.is_generating() {
            self.stop_generator();
        }

        let mut inner = self.shared.lock();

        if let Some(payload) = custom_payload {
            let is_stream = payload.get("stream").and_then(Value::as_bool) != Some(false);

            let user = create_message(&mut inner.ids, Role::User, text);
            let loading = create_loading_assistant_message(&mut inner.ids);
            inner.messages.push(user);
            inner.messages.push(loading);
            drop(inner);

            return Ok(self.send_request(payload, is_stream));
        }

        let content = build_message_content(
            text,
            &inner.config.inputs.image_urls,
            inner.config.inputs.image_enabled,
        );
        let user = create_message(&mut inner.ids, Role::User, content);
        inner.messages.push(user);

        let request = build_api_payload(
            &inner.messages,
            None,
            &inner.config.inputs,
            &inner.config.parameter_enabled,
        );
        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(e) => {
                inner.messages.pop();
                return Err(e.into());
            }
        };

        let loading = create_loading_assistant_message(&mut inner.ids);
        inner.messages.push(loading);

        let images_were_enabled = inner.config.inputs.image_enabled;
        inner.config.inputs.image_enabled = false;
        let is_stream = inner.config.inputs.stream;
        drop(inner);

        if images_were_enabled {
            self.schedule_config_save();
        }
        Ok(self.send_request(payload, is_stream))
    }

    /// Builds the payload the next send would use and records it in the
    /// debug data.
    pub fn preview_payload(&self) -> Result<Value> {
        let mut inner = self.shared.lock();

        let custom_body = inner.config.custom_request_body.trim().to_string();
        let custom = if inner.config.custom_request_mode && !custom_body.is_empty() {
            match serde_json::from_str::<Value>(&custom_body) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(error = %e, "custom request body is not valid JSON, previewing messages");
                    None
                }
            }
        } else {
            None
        };

        let payload = match custom {
            Some(payload) => payload,
            None => {
                let mut messages = inner.messages.clone();
                let inputs = &inner.config.inputs;
                if let Some(idx) = last_user_index(&messages) {
                    let text = match get_text_content(&messages[idx]) {
                        "" => PREVIEW_PLACEHOLDER_TEXT.to_string(),
                        text => text.to_string(),
                    };
                    messages[idx].content =
                        build_message_content(&text, &inputs.image_urls, inputs.image_enabled);
                }
                serde_json::to_value(build_api_payload(
                    &messages,
                    None,
                    inputs,
                    &inner.config.parameter_enabled,
                ))?
            }
        };

        inner.debug.preview_request = Some(serde_json::to_string_pretty(&payload)?);
        inner.debug.preview_timestamp = Some(iso_now());
        Ok(payload)
    }

    /// Empties the conversation and saves the empty list.
    pub fn clear_messages(&self) {
        let mut inner = self.shared.lock();
        inner.close_active_request();
        inner.messages.clear();
        inner.editing = None;
        self.save_messages(Vec::new());
        info!("cleared conversation");
    }

    pub fn toggle_reasoning_expansion(&self, message_id: &str) {
        let mut inner = self.shared.lock();
        for message in inner
            .messages
            .iter_mut()
            .filter(|m| m.id == message_id && m.role == Role::Assistant)
        {
            message.is_reasoning_expanded = !message.is_reasoning_expanded;
        }
    }

    pub fn set_debug_tab(&self, tab: DebugTab) {
        self.shared.lock().debug.active_tab = tab;
    }

    pub fn update_inputs(&self, update: impl FnOnce(&mut Inputs)) {
        update(&mut self.shared.lock().config.inputs);
        self.schedule_config_save();
    }

    pub fn toggle_parameter(&self, param: Parameter) {
        self.shared.lock().config.parameter_enabled.toggle(param);
        self.schedule_config_save();
    }

    pub fn set_show_debug_panel(&self, show: bool) {
        self.shared.lock().config.show_debug_panel = show;
        self.schedule_config_save();
    }

    pub fn set_custom_request_mode(&self, enabled: bool) {
        self.shared.lock().config.custom_request_mode = enabled;
        self.schedule_config_save();
    }

    pub fn set_custom_request_body(&self, body: impl Into<String>) {
        self.shared.lock().config.custom_request_body = body.into();
        self.schedule_config_save();
    }

    /// Restores the default configuration and, when asked, the default
    /// conversation.
    pub fn reset_config(&self, reset_messages: bool) {
        {
            let mut inner = self.shared.lock();
            inner.config = Default::default();
            if reset_messages {
                inner.close_active_request();
                inner.messages = default_messages();
                inner.ids = MessageIdGenerator::after(&inner.messages);
                inner.editing = None;
                self.save_messages(inner.messages.clone());
            }
        }
        self.schedule_config_save();
        self.interaction.notify(Notice::success("Configuration reset to defaults"));
    }

    /// Imports an exported configuration file. Nothing changes when the
    /// file is invalid. Carried messages replace the conversation and are
    /// queued behind any earlier save.
    pub fn import_config(&self, path: &Path) -> Result<()> {
        let imported = match settings::import_config(path) {
            Ok(imported) => imported,
            Err(e) => {
                self.interaction.notify(Notice::error(format!("Import failed: {e}")));
                return Err(e);
            }
        };

        {
            let mut inner = self.shared.lock();
            let config = settings::merge_imported(&inner.config, &imported)?;
            inner.config = config;
            if let Some(messages) = imported.messages {
                inner.close_active_request();
                inner.ids = MessageIdGenerator::after(&messages);
                self.save_messages(messages.clone());
                inner.messages = messages;
                inner.editing = None;
            }
        }

        self.schedule_config_save();
        self.interaction.notify(Notice::success("Configuration imported"));
        Ok(())
    }

    /// Writes the configuration and the current conversation to a dated
    /// file in `dir`.
    pub fn export_config(&self, dir: &Path) -> Result<PathBuf> {
        let (config, messages) = {
            let inner = self.shared.lock();
            (inner.config.clone(), inner.messages.clone())
        };

        match settings::export_config(&*self.storage, &config, Some(messages.as_slice()), dir) {
            Ok(path) => {
                self.interaction.notify(Notice::success("Configuration exported"));
                Ok(path)
            }
            Err(e) => {
                self.interaction.notify(Notice::error(format!("Export failed: {e}")));
                Err(e)
            }
        }
    }

    /// Fetches the models the user may call and selects one, keeping the
    /// current model when it is still offered.
    pub async fn load_models(&self) -> Result<Vec<ModelOption>> {
        let models = self.api.fetch_models().await.inspect_err(|e| {
            warn!(error = %e, "failed to load models");
        })?;

        let changed = {
            let mut inner = self.shared.lock();
            let (options, selected) = process_models_data(&models, &inner.config.inputs.model);
            inner.models = options;
            match selected {
                Some(model) if model != inner.config.inputs.model => {
                    inner.config.inputs.model = model;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.schedule_config_save();
        }

        info!(count = models.len(), "loaded models");
        Ok(self.models())
    }

    pub async fn load_groups(&self, user_group: Option<&str>) -> Result<Vec<GroupOption>> {
        let groups = self.api.fetch_groups().await.inspect_err(|e| {
            warn!(error = %e, "failed to load groups");
        })?;

        let options = process_groups_data(&groups, user_group);
        self.shared.lock().groups = options.clone();
        info!(count = options.len(), "loaded groups");
        Ok(options)
    }
}
