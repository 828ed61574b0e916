//! Core domain types for the Engram observer.
//!
//! Engram distills recorded tool-invocation events from assistant sessions
//! into durable, semantically searchable observations. This crate holds the
//! entities shared by the extraction pipeline and the retrieval path, plus
//! the traits for the two external model collaborators.

pub mod ids;
pub mod providers;
pub mod types;

pub use providers::{LanguageModel, ProviderError, ProviderResult, TextEmbedder};
pub use types::{
    EventType, Observation, ObservationKind, PendingEvent, Role, SessionSummary, Turn,
};
