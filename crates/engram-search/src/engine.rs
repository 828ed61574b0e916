//! The retrieval engine.
//!
//! Embeds a query behind the rate limiter, runs a nearest-neighbor pass
//! over the vector index, then applies the structural filters the index
//! cannot express. List results are a compact projection; full content is
//! fetched separately by ID.

use std::sync::Arc;

use tracing::{debug, warn};

use engram_core::providers::truncate_for_embedding;
use engram_core::{Observation, TextEmbedder};
use engram_limiter::RateLimiter;
use engram_store::{ObservationRepo, Store, VectorRepo};

use crate::dates::{day_end_ms, day_start_ms};
use crate::errors::Result;

/// Over-fetch multiplier applied to the KNN pass when structural filters
/// are present, since filtering happens after the index query.
const OVERFETCH_FACTOR: usize = 10;

/// Maximum characters of query text handed to the embedder.
const MAX_QUERY_CHARS: usize = 8_000;

/// A retrieval request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Query text to embed.
    pub text: String,
    /// Optional project allow-list.
    pub projects: Option<Vec<String>>,
    /// Optional session filter.
    pub session_id: Option<String>,
    /// Optional inclusive lower date bound, strict `YYYY-MM-DD`.
    pub after: Option<String>,
    /// Optional inclusive upper date bound, strict `YYYY-MM-DD`.
    pub before: Option<String>,
    /// File-path fragments; an observation matches if its stored content
    /// contains any of them.
    pub files: Vec<String>,
    /// Result limit.
    pub limit: usize,
}

impl SearchQuery {
    /// A query with just text, default limit, and no filters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            projects: None,
            session_id: None,
            after: None,
            before: None,
            files: Vec::new(),
            limit: 10,
        }
    }

    fn has_structural_filters(&self) -> bool {
        self.projects.is_some()
            || self.session_id.is_some()
            || self.after.is_some()
            || self.before.is_some()
            || !self.files.is_empty()
    }
}

/// Compact search result projection.
///
/// Narrative and list content are excluded by design; fetch the full record
/// with [`SearchEngine::get_observation`].
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Observation ID.
    pub id: String,
    /// Observation title.
    pub title: String,
    /// Project the observation belongs to.
    pub project: String,
    /// Source event time in epoch milliseconds.
    pub timestamp_ms: i64,
    /// Session the observation came from.
    pub session_id: String,
    /// Similarity to the query, `max(0, 1 - distance)`.
    pub similarity: f32,
}

/// Report from a vector backfill run.
#[derive(Debug, Clone, Default)]
pub struct BackfillReport {
    /// Observations embedded and indexed.
    pub succeeded: usize,
    /// Observations whose embedding or store failed.
    pub failed: usize,
    /// Observations with no embeddable text.
    pub skipped: usize,
}

/// Embedding-based nearest-neighbor retrieval over persisted observations.
pub struct SearchEngine {
    store: Store,
    vectors: VectorRepo,
    embedder: Arc<dyn TextEmbedder>,
    limiter: Arc<RateLimiter>,
}

impl SearchEngine {
    /// Create an engine over the shared store.
    ///
    /// `limiter` is the embedding-class rate limiter constructed at
    /// bootstrap; every embed call goes through it.
    pub fn new(store: Store, embedder: Arc<dyn TextEmbedder>, limiter: Arc<RateLimiter>) -> Self {
        let vectors = VectorRepo::new(embedder.dimensions());
        Self { store, vectors, embedder, limiter }
    }

    /// Run a similarity search.
    ///
    /// Date bounds are validated before any external call; an empty corpus
    /// (or an empty query) yields an empty list, never an error.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        // Fail fast on bad input, before the embedder is touched.
        let after_ms = query.after.as_deref().map(|d| day_start_ms(d, "--after")).transpose()?;
        let before_ms = query.before.as_deref().map(|d| day_end_ms(d, "--before")).transpose()?;

        if query.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        self.limiter.acquire().await;
        let vector =
            self.embedder.embed(truncate_for_embedding(&query.text, MAX_QUERY_CHARS)).await?;

        let limit = if query.limit == 0 { 10 } else { query.limit };
        let fetch_k = if query.has_structural_filters() {
            limit.saturating_mul(OVERFETCH_FACTOR)
        } else {
            limit
        };

        let conn = self.store.conn()?;
        let matches = self.vectors.knn(&conn, &vector, fetch_k)?;
        debug!(candidates = matches.len(), fetch_k, "knn pass complete");

        let ids: Vec<String> = matches.iter().map(|m| m.observation_id.clone()).collect();
        let observations = ObservationRepo::get_by_ids(&conn, &ids)?;

        let mut hits = Vec::new();
        for m in &matches {
            let Some(obs) = observations.get(&m.observation_id) else {
                // Vector with no backing observation; stale index entry.
                continue;
            };
            if !matches_filters(obs, query, after_ms, before_ms) {
                continue;
            }
            hits.push(SearchHit {
                id: obs.id.clone(),
                title: obs.title.clone(),
                project: obs.project.clone(),
                timestamp_ms: obs.timestamp_ms,
                session_id: obs.session_id.clone(),
                similarity: (1.0 - m.distance).max(0.0),
            });
            if hits.len() == limit {
                break;
            }
        }

        // KNN order already descends in similarity; the stable sort keeps
        // tied entries in index order.
        hits.sort_by(|a, b| {
            b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(hits)
    }

    /// Fetch an observation's full content by ID.
    pub fn get_observation(&self, id: &str) -> Result<Option<Observation>> {
        let conn = self.store.conn()?;
        Ok(ObservationRepo::get_by_id(&conn, id)?)
    }

    /// Embed and index every observation that has no stored vector yet.
    ///
    /// Used after restoring a database or enabling embeddings late. Each
    /// embed call goes through the rate limiter; per-observation failures
    /// are logged and counted, never fatal.
    pub async fn backfill(&self) -> Result<BackfillReport> {
        let missing = {
            let conn = self.store.conn()?;
            self.vectors.missing_observation_ids(&conn)?
        };

        let mut report = BackfillReport::default();
        for id in missing {
            let obs = {
                let conn = self.store.conn()?;
                ObservationRepo::get_by_id(&conn, &id)?
            };
            let Some(obs) = obs else { continue };

            let text = obs.embedding_text();
            if text.trim().is_empty() {
                report.skipped += 1;
                continue;
            }

            self.limiter.acquire().await;
            let embedded = self
                .embedder
                .embed(truncate_for_embedding(&text, MAX_QUERY_CHARS))
                .await;
            match embedded {
                Ok(vector) => {
                    let conn = self.store.conn()?;
                    match self.vectors.store(&conn, &obs.id, &obs.project, &vector) {
                        Ok(()) => report.succeeded += 1,
                        Err(e) => {
                            warn!(observation_id = %obs.id, error = %e, "backfill store failed");
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(observation_id = %obs.id, error = %e, "backfill embed failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

fn matches_filters(
    obs: &Observation,
    query: &SearchQuery,
    after_ms: Option<i64>,
    before_ms: Option<i64>,
) -> bool {
    if let Some(projects) = &query.projects {
        if !projects.iter().any(|p| p == &obs.project) {
            return false;
        }
    }
    if let Some(session_id) = &query.session_id {
        if session_id != &obs.session_id {
            return false;
        }
    }
    if let Some(after) = after_ms {
        if obs.timestamp_ms < after {
            return false;
        }
    }
    if let Some(before) = before_ms {
        if obs.timestamp_ms > before {
            return false;
        }
    }
    if !query.files.is_empty() {
        let haystack = obs.content_haystack();
        if !query.files.iter().any(|fragment| haystack.contains(fragment)) {
            return false;
        }
    }
    true
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
