//! Pipeline error types.
//!
//! Only two conditions are fatal: a startup conflict with a live poller
//! instance, and missing provider configuration. Everything that happens
//! inside the poll loop is caught and logged at the event or tick boundary.

use thiserror::Error;

/// Errors from the extraction pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The lock file names another live poller process.
    #[error("Another poller instance is already running (pid {pid})")]
    AlreadyRunning {
        /// Process id found in the lock file.
        pid: i32,
    },

    /// Lock file could not be read, written, or removed.
    #[error("Lock file error: {0}")]
    Lock(#[from] std::io::Error),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] engram_store::StoreError),

    /// Settings loading or validation failure.
    #[error(transparent)]
    Settings(#[from] engram_settings::SettingsError),

    /// Model collaborator failure.
    #[error(transparent)]
    Provider(#[from] engram_core::ProviderError),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_running_display_names_pid() {
        let err = PipelineError::AlreadyRunning { pid: 4242 };
        assert_eq!(err.to_string(), "Another poller instance is already running (pid 4242)");
    }

    #[test]
    fn io_error_converts_to_lock() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PipelineError = io.into();
        assert!(err.to_string().starts_with("Lock file error"));
    }

    #[test]
    fn settings_error_passes_through() {
        let err: PipelineError =
            engram_settings::SettingsError::MissingProvider("llm.model".into()).into();
        assert!(err.to_string().contains("llm.model"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineError>();
    }
}
