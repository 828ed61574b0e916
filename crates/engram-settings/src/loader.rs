//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`EngramSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{engram_dir, EngramSettings};

/// Resolve the path to the settings file (`~/.engram/settings.json`).
pub fn settings_path() -> PathBuf {
    engram_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<EngramSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<EngramSettings> {
    let defaults = serde_json::to_value(EngramSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: EngramSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per-key; arrays and primitives are replaced wholesale;
/// nulls in the source are skipped so a user file cannot accidentally
/// blank out a default.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Strict parsing: integers must be valid and in range, and invalid values
/// are silently ignored so a bad export falls back to the file/default.
pub fn apply_env_overrides(settings: &mut EngramSettings) {
    if let Some(v) = read_env_string("ENGRAM_LOG_LEVEL") {
        settings.log_level = v;
    }
    if let Some(v) = read_env_string("ENGRAM_DB_PATH") {
        settings.storage.db_path = v;
    }
    if let Some(v) = read_env_string("ENGRAM_LOCK_PATH") {
        settings.poller.lock_path = v;
    }
    if let Some(v) = read_env_u64("ENGRAM_TICK_INTERVAL_MS", 100, 600_000) {
        settings.poller.tick_interval_ms = v;
    }
    if let Some(v) = read_env_u64("ENGRAM_IDLE_TIMEOUT_MIN", 1, 1_440) {
        settings.poller.idle_timeout_minutes = v;
    }
    if let Some(v) = read_env_usize("ENGRAM_BATCH_SIZE", 1, 1_000) {
        settings.poller.batch_size = v;
    }
    if let Some(v) = read_env_string("ENGRAM_SKIP_TOOLS") {
        settings.poller.skip_tools = parse_tool_list(&v);
    }
    if let Some(v) = read_env_string("ENGRAM_LLM_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = read_env_string("ENGRAM_EMBED_MODEL") {
        settings.embedding.model = v;
    }
    if let Some(v) = read_env_usize("ENGRAM_EMBED_DIMENSIONS", 1, 16_384) {
        settings.embedding.dimensions = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a comma-separated tool list, trimming entries and dropping empties.
fn parse_tool_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect()
}

/// Parse an integer, accepting only values inside `min..=max`.
fn parse_u64_in_range(value: &str, min: u64, max: u64) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|v| (min..=max).contains(v))
}

fn parse_usize_in_range(value: &str, min: usize, max: usize) -> Option<usize> {
    value.trim().parse::<usize>().ok().filter(|v| (min..=max).contains(v))
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let parsed = parse_u64_in_range(&val, min, max);
    if parsed.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    parsed
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let parsed = parse_usize_in_range(&val, min, max);
    if parsed.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    parsed
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
