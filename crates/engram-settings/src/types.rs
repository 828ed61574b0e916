//! Settings types with compiled defaults.
//!
//! All types serialize as `camelCase` so the settings file matches the
//! recorder's conventions. Every section has a `Default` impl; the loader
//! merges user values over these.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the observer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngramSettings {
    /// Minimum log level for the tracing subscriber.
    pub log_level: String,
    /// Storage section.
    pub storage: StorageSettings,
    /// Poller section.
    pub poller: PollerSettings,
    /// Language model section.
    pub llm: LlmSettings,
    /// Embedding model section.
    pub embedding: EmbeddingSettings,
    /// Per-call-class rate limits.
    pub limits: LimitSettings,
}

impl Default for EngramSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            storage: StorageSettings::default(),
            poller: PollerSettings::default(),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            limits: LimitSettings::default(),
        }
    }
}

impl EngramSettings {
    /// Check required provider configuration.
    ///
    /// Missing values here are fatal at bootstrap: the poller must not start
    /// without a configured language model and embedding model.
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(SettingsError::MissingProvider("llm.model".to_string()));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(SettingsError::MissingProvider("embedding.model".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(SettingsError::MissingProvider("embedding.dimensions".to_string()));
        }
        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Path to the SQLite database file.
    pub db_path: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: engram_dir().join("engram.db").to_string_lossy().into_owned(),
            pool_size: 8,
            busy_timeout_ms: 30_000,
        }
    }
}

/// Poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollerSettings {
    /// Tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Maximum pending events pulled per session per tick.
    pub batch_size: usize,
    /// Minutes a session may sit idle before its in-memory context is evicted.
    pub idle_timeout_minutes: u64,
    /// Tool names whose events are marked processed with zero model
    /// interaction. An explicit configuration value, injected into the
    /// dispatcher at bootstrap.
    pub skip_tools: Vec<String>,
    /// Path of the process-identity lock file.
    pub lock_path: String,
    /// Maximum turns kept in a session's accumulated history.
    pub max_history_turns: usize,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            batch_size: 10,
            idle_timeout_minutes: 30,
            skip_tools: vec![
                "Read".to_string(),
                "Glob".to_string(),
                "Grep".to_string(),
                "LS".to_string(),
                "TodoWrite".to_string(),
            ],
            lock_path: engram_dir().join("poller.lock").to_string_lossy().into_owned(),
            max_history_turns: 40,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Model identifier handed to the provider. Required.
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self { model: "claude-haiku-4-5".to_string() }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Model identifier handed to the provider. Required.
    pub model: String,
    /// Output vector length. Required, must match the provider.
    pub dimensions: usize,
    /// Maximum characters of text handed to the embedder per call.
    pub max_chars: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model: "nomic-embed-text-v1.5".to_string(), dimensions: 768, max_chars: 8_000 }
    }
}

/// Rate limits for both call classes.
///
/// One limiter instance is constructed per class at bootstrap and injected
/// into every component that calls that provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitSettings {
    /// Language model call budget.
    pub llm: RateSettings,
    /// Embedding call budget.
    pub embedding: RateSettings,
}

/// A single token-bucket budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateSettings {
    /// Bucket capacity in permits.
    pub capacity: f64,
    /// Refill rate in permits per second.
    pub refill_per_sec: f64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self { capacity: 5.0, refill_per_sec: 1.0 }
    }
}

/// Directory holding the database, lock file, and settings file.
pub(crate) fn engram_dir() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    std::path::PathBuf::from(home).join(".engram")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngramSettings::default().validate().unwrap();
    }

    #[test]
    fn missing_llm_model_fails_validation() {
        let mut settings = EngramSettings::default();
        settings.llm.model = "  ".to_string();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("llm.model"));
    }

    #[test]
    fn missing_embedding_model_fails_validation() {
        let mut settings = EngramSettings::default();
        settings.embedding.model = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_dimensions_fails_validation() {
        let mut settings = EngramSettings::default();
        settings.embedding.dimensions = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_value(EngramSettings::default()).unwrap();
        assert!(json["poller"]["tickIntervalMs"].is_number());
        assert!(json["storage"]["busyTimeoutMs"].is_number());
        assert!(json["limits"]["llm"]["refillPerSec"].is_number());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: EngramSettings =
            serde_json::from_str(r#"{"poller": {"batchSize": 3}}"#).unwrap();
        assert_eq!(settings.poller.batch_size, 3);
        assert_eq!(settings.poller.tick_interval_ms, 1_000);
        assert_eq!(settings.storage.pool_size, 8);
    }

    #[test]
    fn default_skip_list_is_low_value_tools() {
        let settings = EngramSettings::default();
        assert!(settings.poller.skip_tools.contains(&"Read".to_string()));
        assert!(!settings.poller.skip_tools.contains(&"Edit".to_string()));
    }

    #[test]
    fn default_idle_timeout_is_thirty_minutes() {
        assert_eq!(EngramSettings::default().poller.idle_timeout_minutes, 30);
    }
}
