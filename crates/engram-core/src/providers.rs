//! Traits for the external model collaborators.
//!
//! The language model and the embedding model are external services; the
//! pipeline and the retrieval engine only ever see these traits. Both are
//! injected at bootstrap, and every call site sits behind a rate limiter.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::Turn;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors surfaced by the model collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure reaching the provider.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// Provider-specific error.
    #[error("{0}")]
    Other(String),
}

/// The language model collaborator: prompt text in, free-text reply out.
///
/// The reply is not guaranteed to be well-formed; the protocol codec is
/// responsible for degrading malformed output gracefully.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete over the accumulated conversation history.
    async fn complete(&self, turns: &[Turn]) -> ProviderResult<String>;
}

/// The embedding collaborator: UTF-8 text in (already truncated by the
/// caller), fixed-length float vector out.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed a single text into a vector of [`TextEmbedder::dimensions`] floats.
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;

    /// Output vector length.
    fn dimensions(&self) -> usize;
}

/// Truncate text to at most `max_chars` characters on a char boundary.
///
/// The embedding collaborator expects already-truncated input; callers run
/// their text through this before [`TextEmbedder::embed`].
pub fn truncate_for_embedding(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn complete(&self, turns: &[Turn]) -> ProviderResult<String> {
        (**self).complete(turns).await
    }
}

#[async_trait]
impl<T: TextEmbedder + ?Sized> TextEmbedder for Arc<T> {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        (**self).embed(text).await
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
