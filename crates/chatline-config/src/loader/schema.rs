//! Schema validation helpers for chatline JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = [
        "$schema",
        "endpoint",
        "greeting",
        "error_notice",
        "storage",
        "http",
    ];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    for key in ["$schema", "endpoint", "greeting", "error_notice"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, key)?;
        }
    }
    if let Some(value) = map.get("storage") {
        validate_storage(value, layer, "storage")?;
    }
    if let Some(value) = map.get("http") {
        validate_http(value, layer, "http")?;
    }
    Ok(())
}

/// Validate the "storage" block.
fn validate_storage(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["enabled", "path", "history_key", "saved_key"],
        layer,
        path,
    )?;
    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    for key in ["path", "history_key", "saved_key"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "http" block.
fn validate_http(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["connect_timeout_secs", "headers"], layer, path)?;
    if let Some(value) = map.get("connect_timeout_secs") {
        expect_u64(value, layer, &join_path(path, "connect_timeout_secs"))?;
    }
    if let Some(value) = map.get("headers") {
        let headers_path = join_path(path, "headers");
        let headers = expect_object(value, layer, &headers_path)?;
        for (name, value) in headers {
            expect_string(value, layer, &join_path(&headers_path, name))?;
        }
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect a JSON boolean or return a typed error.
fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if matches!(value, Value::Bool(_)) {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative JSON integer or return a typed error.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Reject keys that are not part of the schema.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
