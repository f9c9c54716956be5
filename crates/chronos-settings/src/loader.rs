//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ChronosSettings::default()`]
//! 2. If `~/.chronos/settings.json` exists, [`overlay`] it on the defaults
//! 3. Apply `CHRONOS_*` environment variable overrides

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{ChronosSettings, FailurePolicy};

/// Resolve the path to the settings file (`~/.chronos/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".chronos").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ChronosSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ChronosSettings> {
    let mut merged = serde_json::to_value(ChronosSettings::default())?;
    match read_layer(path)? {
        Some(layer) => {
            debug!(?path, "applying settings file");
            overlay(&mut merged, layer);
        }
        None => debug!(?path, "settings file not found, using defaults"),
    }

    let mut settings: ChronosSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// Read a JSON settings layer, `None` if the file does not exist.
fn read_layer(path: &Path) -> Result<Option<Value>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Lay `layer` over `base` in place.
///
/// Objects merge key by key; any other layer value replaces the base value.
/// `null` in the layer leaves the base untouched.
pub fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply overrides read through `lookup` (the process environment in
/// production). Invalid values are logged and ignored.
pub fn apply_overrides<F>(settings: &mut ChronosSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = read("CHRONOS_API_URL") {
        settings.api.base_url = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = read("CHRONOS_CONNECT_TIMEOUT_MS") {
        match parse_u64_range(&v, 100, 600_000) {
            Some(n) => settings.api.connect_timeout_ms = n,
            None => warn!(key = "CHRONOS_CONNECT_TIMEOUT_MS", value = %v, "invalid value, ignoring"),
        }
    }
    if let Some(v) = read("CHRONOS_MAX_ATTACHMENTS") {
        match parse_u64_range(&v, 1, 1_000).and_then(|n| usize::try_from(n).ok()) {
            Some(n) => settings.submission.max_attachments = n,
            None => warn!(key = "CHRONOS_MAX_ATTACHMENTS", value = %v, "invalid value, ignoring"),
        }
    }
    if let Some(v) = read("CHRONOS_MAX_ATTACHMENT_BYTES") {
        match parse_u64_range(&v, 1, 1 << 34) {
            Some(n) => settings.submission.max_attachment_bytes = n,
            None => warn!(key = "CHRONOS_MAX_ATTACHMENT_BYTES", value = %v, "invalid value, ignoring"),
        }
    }
    if let Some(v) = read("CHRONOS_FAILURE_POLICY") {
        match serde_json::from_value::<FailurePolicy>(Value::String(v.to_lowercase())) {
            Ok(policy) => settings.submission.failure_policy = policy,
            Err(_) => warn!(key = "CHRONOS_FAILURE_POLICY", value = %v, "invalid value, ignoring"),
        }
    }
    if let Some(v) = read("CHRONOS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("CHRONOS_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "CHRONOS_LOG_JSON", value = %v, "invalid boolean, ignoring"),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
