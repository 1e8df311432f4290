// src/settings.rs

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db::{iso_now, Storage};
use crate::error::{PlaygroundError, Result};
use crate::types::{ImportedConfig, Message, PlaygroundConfig};

pub const CONFIG_KEY: &str = "playground_config";
pub const MESSAGES_KEY: &str = "playground_messages";
pub const EXPORT_VERSION: &str = "1.0";

const APP_DIR: &str = "chat-playground";
const DB_FILE: &str = "playground.sqlite3";

/// Where the data directory lives, without creating it.
pub fn data_dir_path() -> Option<PathBuf> {
    dirs::data_dir().map(|base| base.join(APP_DIR))
}

/// Get the data directory (e.g. ~/.local/share/chat-playground), creating it
/// if needed.
pub fn get_data_dir() -> Result<PathBuf> {
    let dir = data_dir_path().ok_or_else(|| {
        PlaygroundError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine data directory",
        ))
    })?;

    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

pub fn default_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Overlays `overlay` onto `base`. Objects merge key by key, nulls are
/// treated as absent, anything else replaces the base value.
pub fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_null() {
                    continue;
                }
                match base.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) if !overlay.is_null() => *base = overlay.clone(),
        _ => {}
    }
}

fn merge_over_defaults(stored: &Value) -> Result<PlaygroundConfig> {
    let mut merged = serde_json::to_value(PlaygroundConfig::default())?;
    merge_json(&mut merged, stored);
    Ok(serde_json::from_value(merged)?)
}

/// Applies an imported configuration on top of `base`: `inputs` and
/// `parameterEnabled` merge field by field, the optional sections replace
/// the current value when present.
pub fn merge_imported(base: &PlaygroundConfig, imported: &ImportedConfig) -> Result<PlaygroundConfig> {
    let mut merged = serde_json::to_value(base)?;
    merge_json(
        &mut merged,
        &json!({
            "inputs": imported.inputs,
            "parameterEnabled": imported.parameter_enabled,
        }),
    );
    let mut config: PlaygroundConfig = serde_json::from_value(merged)
        .map_err(|e| PlaygroundError::InvalidConfigFile(format!("invalid settings: {e}")))?;

    if let Some(show) = imported.show_debug_panel {
        config.show_debug_panel = show;
    }
    if let Some(mode) = imported.custom_request_mode {
        config.custom_request_mode = mode;
    }
    if let Some(body) = &imported.custom_request_body {
        config.custom_request_body = body.clone();
    }
    Ok(config)
}

/// Load the persisted configuration merged over the defaults. Falls back to
/// the defaults when nothing is stored or the blob is unreadable.
pub fn load_config(storage: &dyn Storage) -> PlaygroundConfig {
    let loaded = storage.get_item(CONFIG_KEY).and_then(|raw| match raw {
        Some(raw) => {
            let stored: Value = serde_json::from_str(&raw)?;
            merge_over_defaults(&stored).map(Some)
        }
        None => Ok(None),
    });

    match loaded {
        Ok(Some(config)) => config,
        Ok(None) => PlaygroundConfig::default(),
        Err(e) => {
            warn!(error = %e, "failed to load playground config, using defaults");
            PlaygroundConfig::default()
        }
    }
}

pub fn save_config(storage: &dyn Storage, config: &PlaygroundConfig) -> Result<()> {
    let mut value = serde_json::to_value(config)?;
    if let Value::Object(map) = &mut value {
        map.insert("timestamp".to_string(), Value::String(iso_now()));
    }
    storage.set_item(CONFIG_KEY, &value.to_string())?;
    Ok(())
}

pub fn load_messages(storage: &dyn Storage) -> Option<Vec<Message>> {
    let loaded = storage.get_item(MESSAGES_KEY).and_then(|raw| match raw {
        Some(raw) => {
            let mut stored: Value = serde_json::from_str(&raw)?;
            match stored.get_mut("messages").map(Value::take) {
                Some(Value::Null) | None => Ok(None),
                Some(messages) => Ok(Some(serde_json::from_value::<Vec<Message>>(messages)?)),
            }
        }
        None => Ok(None),
    });

    loaded.unwrap_or_else(|e| {
        warn!(error = %e, "failed to load playground messages");
        None
    })
}

pub fn save_messages(storage: &dyn Storage, messages: &[Message]) -> Result<()> {
    let envelope = json!({
        "messages": messages,
        "timestamp": iso_now(),
    });
    storage.set_item(MESSAGES_KEY, &envelope.to_string())?;
    Ok(())
}

/// Removes the stored configuration together with the message history.
pub fn clear_config(storage: &dyn Storage) -> Result<()> {
    storage.remove_item(CONFIG_KEY)?;
    storage.remove_item(MESSAGES_KEY)?;
    Ok(())
}

pub fn clear_messages(storage: &dyn Storage) -> Result<()> {
    storage.remove_item(MESSAGES_KEY)
}

pub fn has_stored_config(storage: &dyn Storage) -> bool {
    matches!(storage.get_item(CONFIG_KEY), Ok(Some(_)))
}

pub fn get_config_timestamp(storage: &dyn Storage) -> Option<String> {
    let raw = storage.get_item(CONFIG_KEY).ok()??;
    let stored: Value = serde_json::from_str(&raw).ok()?;
    stored
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn export_file_name() -> String {
    format!("playground-config-{}.json", Utc::now().format("%Y-%m-%d"))
}

/// Write the configuration plus messages (given, or else the stored ones)
/// to a dated JSON file in `dir`. Returns the written path.
pub fn export_config(
    storage: &dyn Storage,
    config: &PlaygroundConfig,
    messages: Option<&[Message]>,
    dir: &Path,
) -> Result<PathBuf> {
    let messages = match messages {
        Some(messages) => Some(messages.to_vec()),
        None => load_messages(storage),
    };

    let mut value = serde_json::to_value(config)?;
    if let Value::Object(map) = &mut value {
        map.insert("messages".to_string(), serde_json::to_value(messages)?);
        map.insert("exportTime".to_string(), Value::String(iso_now()));
        map.insert("version".to_string(), Value::String(EXPORT_VERSION.to_string()));
    }

    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name());
    fs::write(&path, serde_json::to_string_pretty(&value)?)?;

    info!(path = %path.display(), "exported playground config");
    Ok(path)
}

/// Validate and decode an exported configuration without touching storage.
pub fn parse_imported_config(raw: &str) -> Result<ImportedConfig> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        PlaygroundError::InvalidConfigFile(format!("failed to parse config file: {e}"))
    })?;

    let section = |name: &str| value.get(name).filter(|v| v.is_object()).cloned();
    let (Some(inputs), Some(parameter_enabled)) = (section("inputs"), section("parameterEnabled"))
    else {
        return Err(PlaygroundError::InvalidConfigFile(
            "missing `inputs` or `parameterEnabled` section".to_string(),
        ));
    };

    let messages = match value.get("messages") {
        Some(list @ Value::Array(_)) => Some(
            serde_json::from_value::<Vec<Message>>(list.clone()).map_err(|e| {
                PlaygroundError::InvalidConfigFile(format!("invalid messages: {e}"))
            })?,
        ),
        _ => None,
    };

    let imported = ImportedConfig {
        inputs,
        parameter_enabled,
        show_debug_panel: value.get("showDebugPanel").and_then(Value::as_bool),
        custom_request_mode: value.get("customRequestMode").and_then(Value::as_bool),
        custom_request_body: value
            .get("customRequestBody")
            .and_then(Value::as_str)
            .filter(|body| !body.is_empty())
            .map(str::to_string),
        messages,
    };

    merge_imported(&PlaygroundConfig::default(), &imported)?;
    Ok(imported)
}

/// Read and validate an exported configuration file. Nothing is written;
/// the caller applies and persists the result.
pub fn import_config(path: &Path) -> Result<ImportedConfig> {
    let raw = fs::read_to_string(path)?;
    let imported = parse_imported_config(&raw)?;
    info!(path = %path.display(), "read playground config file");
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;
    use crate::messages::default_messages;
    use tempfile::TempDir;

    #[test]
    fn empty_store_yields_defaults() {
        let storage = MemoryStorage::new();
        assert_eq!(load_config(&storage), PlaygroundConfig::default());
        assert!(!has_stored_config(&storage));
        assert!(load_messages(&storage).is_none());
    }

    #[test]
    fn save_then_load_round_trips_with_fresh_timestamp() {
        let storage = MemoryStorage::new();
        let mut config = PlaygroundConfig::default();
        config.inputs.model = "deepseek-r1".to_string();
        config.inputs.seed = Some(42);
        config.parameter_enabled.seed = true;
        config.custom_request_body = "{}".to_string();

        let before = Utc::now() - chrono::Duration::milliseconds(1);
        save_config(&storage, &config).unwrap();

        assert_eq!(load_config(&storage), config);
        let ts = get_config_timestamp(&storage).unwrap();
        let ts = chrono::DateTime::parse_from_rfc3339(&ts).unwrap();
        assert!(ts > before);
    }

    #[test]
    fn partial_blob_merges_over_defaults() {
        let storage = MemoryStorage::new();
        storage
            .set_item(
                CONFIG_KEY,
                r#"{"inputs":{"model":"claude","temperature":null,"unknown":1},"parameterEnabled":{"seed":true},"extra":true}"#,
            )
            .unwrap();

        let config = load_config(&storage);
        assert_eq!(config.inputs.model, "claude");
        assert_eq!(config.inputs.temperature, 0.7);
        assert_eq!(config.inputs.max_tokens, 4096);
        assert!(config.parameter_enabled.seed);
        assert!(config.parameter_enabled.temperature);
    }

    #[test]
    fn corrupt_blob_falls_back_to_defaults() {
        let storage = MemoryStorage::new();
        storage.set_item(CONFIG_KEY, "not json").unwrap();
        assert_eq!(load_config(&storage), PlaygroundConfig::default());
    }

    #[test]
    fn clear_config_drops_messages_too() {
        let storage = MemoryStorage::new();
        save_config(&storage, &PlaygroundConfig::default()).unwrap();
        save_messages(&storage, &default_messages()).unwrap();

        clear_config(&storage).unwrap();
        assert!(!has_stored_config(&storage));
        assert!(load_messages(&storage).is_none());
    }

    #[test]
    fn export_then_import() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let mut config = PlaygroundConfig::default();
        config.show_debug_panel = true;

        let path = export_config(&storage, &config, Some(default_messages().as_slice()), dir.path()).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("playground-config-"));

        let raw = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], "1.0");
        assert!(value["exportTime"].is_string());

        let imported = import_config(&path).unwrap();
        assert_eq!(imported.show_debug_panel, Some(true));
        assert_eq!(imported.messages, Some(default_messages()));
        // reading a file never touches the store
        assert!(storage.get_item(MESSAGES_KEY).unwrap().is_none());
    }

    #[test]
    fn import_without_parameter_enabled_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"inputs":{"model":"x"},"messages":[]}"#).unwrap();

        let err = import_config(&path).unwrap_err();
        assert!(matches!(err, PlaygroundError::InvalidConfigFile(_)));
    }

    #[test]
    fn mistyped_inputs_are_rejected() {
        let raw = r#"{"inputs":{"temperature":"hot"},"parameterEnabled":{},"messages":[]}"#;
        let err = parse_imported_config(raw).unwrap_err();
        assert!(matches!(err, PlaygroundError::InvalidConfigFile(_)));
    }

    #[test]
    fn imported_sections_merge_over_current() {
        let mut base = PlaygroundConfig::default();
        base.inputs.model = "current".to_string();
        base.custom_request_body = "{\"keep\":true}".to_string();

        let raw = r#"{"inputs":{"temperature":0.2},"parameterEnabled":{"seed":true},"showDebugPanel":true}"#;
        let imported = parse_imported_config(raw).unwrap();
        let merged = merge_imported(&base, &imported).unwrap();

        assert_eq!(merged.inputs.model, "current");
        assert_eq!(merged.inputs.temperature, 0.2);
        assert!(merged.parameter_enabled.seed);
        assert!(merged.parameter_enabled.temperature);
        assert!(merged.show_debug_panel);
        assert_eq!(merged.custom_request_body, "{\"keep\":true}");
    }

    #[test]
    fn merge_skips_nulls_and_replaces_arrays() {
        let mut base = json!({"a": 1, "list": [1, 2], "obj": {"x": 1, "y": 2}});
        merge_json(&mut base, &json!({"a": null, "list": [3], "obj": {"y": 5}}));
        assert_eq!(base, json!({"a": 1, "list": [3], "obj": {"x": 1, "y": 5}}));
    }
}
