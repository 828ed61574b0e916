//! Settings error types.

use thiserror::Error;

/// Errors from settings loading and validation.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("Settings file error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file contained invalid JSON.
    #[error("Settings parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required provider setting is absent or empty.
    #[error("Missing required provider configuration: {0}")]
    MissingProvider(String),
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
