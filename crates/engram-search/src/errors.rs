//! Retrieval error types.
//!
//! Input validation failures are raised synchronously, before any external
//! call is made. Provider and storage failures pass through.

use thiserror::Error;

/// Errors from retrieval operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A date bound did not match strict `YYYY-MM-DD` form.
    #[error("Invalid {flag} date: {value} (expected YYYY-MM-DD)")]
    InvalidDate {
        /// Which bound was malformed (`--after` or `--before`).
        flag: String,
        /// The offending input.
        value: String,
    },

    /// A date bound parsed but names an impossible calendar date.
    #[error("Not a valid calendar date: {value}")]
    NotCalendarDate {
        /// The offending input.
        value: String,
    },

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] engram_store::StoreError),

    /// Embedding collaborator failure.
    #[error(transparent)]
    Provider(#[from] engram_core::ProviderError),
}

/// Result alias for retrieval operations.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_date_display_names_flag() {
        let err = SearchError::InvalidDate { flag: "--after".into(), value: "2025-1-5".into() };
        assert_eq!(err.to_string(), "Invalid --after date: 2025-1-5 (expected YYYY-MM-DD)");
    }

    #[test]
    fn calendar_date_display() {
        let err = SearchError::NotCalendarDate { value: "2025-13-01".into() };
        assert_eq!(err.to_string(), "Not a valid calendar date: 2025-13-01");
    }

    #[test]
    fn provider_error_passes_through() {
        let err: SearchError = engram_core::ProviderError::Other("down".into()).into();
        assert_eq!(err.to_string(), "down");
    }
}
