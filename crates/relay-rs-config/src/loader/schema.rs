//! Schema validation for relay JSON5 configuration.
//!
//! Every layer is checked on its own before merging so that errors name the
//! file that introduced them.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config document against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = [
        "$schema",
        "server",
        "llm",
        "session",
        "orchestration",
        "mcp_servers",
        "logging",
    ];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("server") {
        validate_server(value, layer, "server")?;
    }
    if let Some(value) = map.get("llm") {
        validate_llm(value, layer, "llm")?;
    }
    if let Some(value) = map.get("session") {
        validate_session(value, layer, "session")?;
    }
    if let Some(value) = map.get("orchestration") {
        validate_orchestration(value, layer, "orchestration")?;
    }
    if let Some(value) = map.get("mcp_servers") {
        let arr = expect_array(value, layer, "mcp_servers")?;
        for (idx, entry) in arr.iter().enumerate() {
            validate_mcp_server(entry, layer, &format!("mcp_servers[{idx}]"))?;
        }
    }
    if let Some(value) = map.get("logging") {
        let map = expect_object(value, layer, "logging")?;
        ensure_allowed_keys(map, &["level"], layer, "logging")?;
        if let Some(value) = map.get("level") {
            validate_log_level(value, layer, "logging.level")?;
        }
    }

    Ok(())
}

fn validate_server(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["host", "port"], layer, path)?;
    if let Some(value) = map.get("host") {
        expect_string(value, layer, &join_path(path, "host"))?;
    }
    if let Some(value) = map.get("port") {
        let port_path = join_path(path, "port");
        let port = expect_u64(value, layer, &port_path)?;
        if port > u64::from(u16::MAX) {
            return Err(invalid_field(layer, &port_path, "port out of range"));
        }
    }
    Ok(())
}

fn validate_llm(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["base_url", "api_key", "model", "timeout_secs"],
        layer,
        path,
    )?;
    for key in ["base_url", "model"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("api_key")
        && !value.is_null()
    {
        expect_string(value, layer, &join_path(path, "api_key"))?;
    }
    if let Some(value) = map.get("timeout_secs") {
        expect_u64(value, layer, &join_path(path, "timeout_secs"))?;
    }
    Ok(())
}

fn validate_session(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = ["timeout_secs", "max_active", "cleanup_interval_secs"];
    ensure_allowed_keys(map, &allowed, layer, path)?;
    for key in allowed {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn validate_orchestration(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "max_rounds",
            "tool_timeout_secs",
            "fragment_timeout_secs",
            "announce_tools",
            "inject_system_prompt",
            "continuation_prompt",
        ],
        layer,
        path,
    )?;
    for key in ["max_rounds", "tool_timeout_secs", "fragment_timeout_secs"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["announce_tools", "inject_system_prompt"] {
        if let Some(value) = map.get(key) {
            expect_bool(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("continuation_prompt") {
        expect_string(value, layer, &join_path(path, "continuation_prompt"))?;
    }
    Ok(())
}

fn validate_mcp_server(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "id",
            "command",
            "args",
            "env",
            "enabled",
            "startup_timeout_secs",
            "list_timeout_secs",
        ],
        layer,
        path,
    )?;

    for key in ["id", "command"] {
        let key_path = join_path(path, key);
        let Some(value) = map.get(key) else {
            return Err(invalid_field(layer, &key_path, "missing required field"));
        };
        expect_string(value, layer, &key_path)?;
    }
    if let Some(value) = map.get("args") {
        validate_string_array(value, layer, &join_path(path, "args"))?;
    }
    if let Some(value) = map.get("env") {
        let env_path = join_path(path, "env");
        let env = expect_object(value, layer, &env_path)?;
        for (key, value) in env {
            expect_string(value, layer, &join_path(&env_path, key))?;
        }
    }
    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    for key in ["startup_timeout_secs", "list_timeout_secs"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn validate_log_level(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    match value.as_str() {
        Some("off" | "error" | "warn" | "info" | "debug" | "trace") => Ok(()),
        Some(_) => Err(invalid_field(
            layer,
            path,
            "expected one of off, error, warn, info, debug, trace",
        )),
        None => Err(invalid_field(layer, path, "expected string")),
    }
}

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

fn expect_array<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Vec<Value>, ConfigError> {
    match value {
        Value::Array(arr) => Ok(arr),
        _ => Err(invalid_field(layer, path, "expected array")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative integer and return it.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<u64, ConfigError> {
    value
        .as_u64()
        .ok_or_else(|| invalid_field(layer, path, "expected non-negative integer"))
}

fn validate_string_array(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let arr = expect_array(value, layer, path)?;
    for (idx, entry) in arr.iter().enumerate() {
        if !entry.is_string() {
            return Err(invalid_field(
                layer,
                &format!("{path}[{idx}]"),
                "expected string",
            ));
        }
    }
    Ok(())
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

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
