//! Configuration management for the Engram observer.
//!
//! Settings load in three layers: compiled defaults, a user settings file
//! deep-merged over them, and environment variable overrides on top.
//! Required provider configuration is checked by
//! [`EngramSettings::validate`]; the bootstrap treats a failure there as
//! fatal before the poll loop ever starts.

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{
    EmbeddingSettings, EngramSettings, LimitSettings, LlmSettings, PollerSettings, RateSettings,
    StorageSettings,
};
