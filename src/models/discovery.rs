// src/models/discovery.rs

use std::collections::BTreeMap;

use crate::types::{GroupInfo, GroupOption, ModelOption};

const GROUP_LABEL_MAX_CHARS: usize = 20;

/// Turns the model list into options and picks the model to use: the
/// current one if the gateway still offers it, otherwise the first.
pub fn process_models_data(models: &[String], current: &str) -> (Vec<ModelOption>, Option<String>) {
    let options: Vec<ModelOption> = models
        .iter()
        .map(|model| ModelOption {
            label: model.clone(),
            value: model.clone(),
        })
        .collect();

    let selected = if options.iter().any(|o| o.value == current) {
        Some(current.to_string())
    } else {
        options.first().map(|o| o.value.clone())
    };

    (options, selected)
}

fn truncate_label(desc: &str) -> String {
    if desc.chars().count() > GROUP_LABEL_MAX_CHARS {
        let head: String = desc.chars().take(GROUP_LABEL_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        desc.to_string()
    }
}

/// Group options with the user's own group first. An empty map yields a
/// single placeholder so a group can always be selected.
pub fn process_groups_data(
    groups: &BTreeMap<String, GroupInfo>,
    user_group: Option<&str>,
) -> Vec<GroupOption> {
    let mut options: Vec<GroupOption> = groups
        .iter()
        .map(|(group, info)| GroupOption {
            label: truncate_label(&info.desc),
            value: group.clone(),
            ratio: info.ratio,
            full_label: Some(info.desc.clone()),
        })
        .collect();

    if options.is_empty() {
        return vec![GroupOption {
            label: "User group".to_string(),
            value: String::new(),
            ratio: 1.0,
            full_label: None,
        }];
    }

    if let Some(user_group) = user_group.filter(|g| !g.is_empty()) {
        if let Some(idx) = options.iter().position(|o| o.value == user_group) {
            let own = options.remove(idx);
            options.insert(0, own);
        }
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> BTreeMap<String, GroupInfo> {
        let mut map = BTreeMap::new();
        map.insert(
            "default".to_string(),
            GroupInfo {
                desc: "Default group".to_string(),
                ratio: 1.0,
            },
        );
        map.insert(
            "vip".to_string(),
            GroupInfo {
                desc: "Very important customers with priority".to_string(),
                ratio: 0.5,
            },
        );
        map
    }

    #[test]
    fn keeps_current_model_when_offered() {
        let models = vec!["a".to_string(), "b".to_string()];
        let (options, selected) = process_models_data(&models, "b");
        assert_eq!(options.len(), 2);
        assert_eq!(selected.as_deref(), Some("b"));

        let (_, selected) = process_models_data(&models, "gone");
        assert_eq!(selected.as_deref(), Some("a"));

        let (_, selected) = process_models_data(&[], "gone");
        assert!(selected.is_none());
    }

    #[test]
    fn user_group_moves_first_and_labels_truncate() {
        let options = process_groups_data(&groups(), Some("vip"));
        assert_eq!(options[0].value, "vip");
        assert_eq!(options[0].label, "Very important custo...");
        assert_eq!(
            options[0].full_label.as_deref(),
            Some("Very important customers with priority")
        );
        assert_eq!(options[1].label, "Default group");
    }

    #[test]
    fn empty_groups_yield_placeholder() {
        let options = process_groups_data(&BTreeMap::new(), Some("vip"));
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].value, "");
        assert_eq!(options[0].ratio, 1.0);
    }
}
