//! Engine control plane: flag encoding and the derived engine status.
//!
//! Flags live in the config table as independent key/value pairs. Values are
//! written JSON-encoded; a value that does not parse as JSON is read back as its
//! raw text, and only that key is affected.

use serde_json::Value;

use crate::models::{keys, EngineConfig, EngineStatus, UpdateConfigInput};

/// Display status from the pause flag and whether anything is being built.
pub fn engine_status(engine_paused: bool, is_building: bool) -> EngineStatus {
    match (engine_paused, is_building) {
        (false, _) => EngineStatus::Running,
        (true, true) => EngineStatus::Pausing,
        (true, false) => EngineStatus::Paused,
    }
}

/// Decode a stored config value, falling back to the raw text.
pub fn decode_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn encode_value(value: &Value) -> String {
    value.to_string()
}

fn as_bool(key: &str, value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        other => {
            tracing::warn!("Config key {} has non-boolean value {}, using false", key, other);
            false
        }
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Build the engine config from raw stored pairs.
///
/// Unknown keys are ignored and missing keys keep their defaults.
pub fn engine_config<'a>(entries: impl IntoIterator<Item = &'a (String, String)>) -> EngineConfig {
    let mut config = EngineConfig::default();
    for (key, raw) in entries {
        let value = decode_value(raw);
        match key.as_str() {
            keys::ENGINE_PAUSED => config.engine_paused = as_bool(key, &value),
            keys::AUTO_APPROVE => config.auto_approve = as_bool(key, &value),
            keys::SKIP_ON_ERROR => config.skip_on_error = as_bool(key, &value),
            keys::NOTIFICATION_EMAIL => config.notification_email = as_text(&value),
            _ => tracing::debug!("Ignoring unknown config key {}", key),
        }
    }
    config
}

/// The key writes an update needs, one per field present.
pub fn config_writes(input: &UpdateConfigInput) -> Vec<(&'static str, String)> {
    let mut writes = Vec::new();
    if let Some(paused) = input.engine_paused {
        writes.push((keys::ENGINE_PAUSED, encode_value(&Value::Bool(paused))));
    }
    if let Some(auto_approve) = input.auto_approve {
        writes.push((keys::AUTO_APPROVE, encode_value(&Value::Bool(auto_approve))));
    }
    if let Some(skip_on_error) = input.skip_on_error {
        writes.push((keys::SKIP_ON_ERROR, encode_value(&Value::Bool(skip_on_error))));
    }
    if let Some(ref email) = input.notification_email {
        writes.push((
            keys::NOTIFICATION_EMAIL,
            encode_value(&Value::String(email.clone())),
        ));
    }
    writes
}
