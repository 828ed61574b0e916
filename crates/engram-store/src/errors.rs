//! Storage error types.

use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` error (preserves source chain).
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Stored list columns failed to serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A schema migration failed.
    #[error("Migration {version} failed: {message}")]
    Migration {
        /// Version of the failing migration.
        version: u32,
        /// Error description.
        message: String,
    },

    /// Vector storage operation failed (non-SQLite).
    #[error("Vector storage failed: {0}")]
    Vector(String),
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_variants() {
        let err = StoreError::Migration { version: 2, message: "bad sql".into() };
        assert_eq!(err.to_string(), "Migration 2 failed: bad sql");

        let err = StoreError::Vector("dimension mismatch".into());
        assert_eq!(err.to_string(), "Vector storage failed: dimension mismatch");
    }

    #[test]
    fn sqlite_source_chain_preserved() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("SQLite error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
