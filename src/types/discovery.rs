// src/types/discovery.rs

use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct GroupInfo {
    #[serde(default)]
    pub desc: String,
    #[serde(default = "default_ratio")]
    pub ratio: f64,
}

fn default_ratio() -> f64 {
    1.0
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupOption {
    pub label: String,
    pub value: String,
    pub ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_label: Option<String>,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ModelOption {
    pub label: String,
    pub value: String,
}
