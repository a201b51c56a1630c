// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::{Map, Value};

const PROVIDERS: [&str; 2] = ["openai", "anthropic"];

/// Move flat `"<provider>_api_key"` entries into `providers.<provider>.api_key`,
/// so a hand-written settings file may use the same key names as the state
/// file. A key already present under `providers` wins.
pub(super) fn migrate_on_load(value: Value) -> Value {
    let Value::Object(mut root) = value else {
        return value;
    };

    for provider in PROVIDERS {
        let flat_key = format!("{}_api_key", provider);
        let Some(Value::String(api_key)) = root.remove(&flat_key) else {
            continue;
        };

        let providers = root
            .entry("providers")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(providers) = providers {
            let section = providers
                .entry(provider)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(section) = section {
                section
                    .entry("api_key")
                    .or_insert_with(|| Value::String(api_key));
            }
        }
    }

    Value::Object(root)
}

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is serialized current struct.
/// Overlay values take priority.
pub(super) fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_migrate_flat_api_key() {
        let migrated = migrate_on_load(json!({"openai_api_key": "sk-old"}));
        assert_eq!(migrated["providers"]["openai"]["api_key"], "sk-old");
        assert!(migrated.get("openai_api_key").is_none());
    }

    #[test]
    fn test_migrate_keeps_nested_key() {
        let migrated = migrate_on_load(json!({
            "anthropic_api_key": "old",
            "providers": {"anthropic": {"api_key": "new"}}
        }));
        assert_eq!(migrated["providers"]["anthropic"]["api_key"], "new");
    }

    #[test]
    fn test_deep_merge_overlay_wins() {
        let merged = deep_merge(
            json!({"a": {"b": 1, "c": 2}, "d": 3}),
            json!({"a": {"b": 10}}),
        );
        assert_eq!(merged, json!({"a": {"b": 10, "c": 2}, "d": 3}));
    }
}
