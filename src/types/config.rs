// src/types/config.rs

use serde::{Deserialize, Serialize};

use super::chat::Message;

/// Model selection and generation parameters sent with each request.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Inputs {
    pub model: String,
    pub group: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub seed: Option<i64>,
    pub stream: bool,
    #[serde(rename = "imageEnabled")]
    pub image_enabled: bool,
    #[serde(rename = "imageUrls")]
    pub image_urls: Vec<String>,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            group: String::new(),
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: 4096,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            seed: None,
            stream: true,
            image_enabled: false,
            image_urls: vec![String::new()],
        }
    }
}

/// Generation parameters that can be switched on and off individually.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parameter {
    Temperature,
    TopP,
    MaxTokens,
    FrequencyPenalty,
    PresencePenalty,
    Seed,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ParameterEnabled {
    pub temperature: bool,
    pub top_p: bool,
    pub max_tokens: bool,
    pub frequency_penalty: bool,
    pub presence_penalty: bool,
    pub seed: bool,
}

impl Default for ParameterEnabled {
    fn default() -> Self {
        Self {
            temperature: true,
            top_p: true,
            max_tokens: false,
            frequency_penalty: true,
            presence_penalty: true,
            seed: false,
        }
    }
}

impl ParameterEnabled {
    pub fn is_enabled(&self, param: Parameter) -> bool {
        *self.slot(param)
    }

    pub fn toggle(&mut self, param: Parameter) {
        let slot = self.slot_mut(param);
        *slot = !*slot;
    }

    fn slot(&self, param: Parameter) -> &bool {
        match param {
            Parameter::Temperature => &self.temperature,
            Parameter::TopP => &self.top_p,
            Parameter::MaxTokens => &self.max_tokens,
            Parameter::FrequencyPenalty => &self.frequency_penalty,
            Parameter::PresencePenalty => &self.presence_penalty,
            Parameter::Seed => &self.seed,
        }
    }

    fn slot_mut(&mut self, param: Parameter) -> &mut bool {
        match param {
            Parameter::Temperature => &mut self.temperature,
            Parameter::TopP => &mut self.top_p,
            Parameter::MaxTokens => &mut self.max_tokens,
            Parameter::FrequencyPenalty => &mut self.frequency_penalty,
            Parameter::PresencePenalty => &mut self.presence_penalty,
            Parameter::Seed => &mut self.seed,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaygroundConfig {
    pub inputs: Inputs,
    pub parameter_enabled: ParameterEnabled,
    pub show_debug_panel: bool,
    pub custom_request_mode: bool,
    pub custom_request_body: String,
}

/// A configuration read back from an exported file. Sections other than
/// `inputs` and `parameterEnabled` are optional.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedConfig {
    pub inputs: serde_json::Value,
    pub parameter_enabled: serde_json::Value,
    pub show_debug_panel: Option<bool>,
    pub custom_request_mode: Option<bool>,
    pub custom_request_body: Option<String>,
    pub messages: Option<Vec<Message>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_single_parameter() {
        let mut enabled = ParameterEnabled::default();
        assert!(!enabled.is_enabled(Parameter::Seed));
        enabled.toggle(Parameter::Seed);
        assert!(enabled.is_enabled(Parameter::Seed));
        assert!(enabled.is_enabled(Parameter::Temperature));
    }

    #[test]
    fn inputs_use_wire_names() {
        let value = serde_json::to_value(Inputs::default()).unwrap();
        assert_eq!(value["imageEnabled"], false);
        assert_eq!(value["imageUrls"], serde_json::json!([""]));
        assert_eq!(value["top_p"], 1.0);
        assert!(value["seed"].is_null());
    }
}
