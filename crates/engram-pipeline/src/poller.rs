//! The background poll loop.
//!
//! One cooperative loop drives the whole pipeline: each tick evicts idle
//! sessions, pulls pending events per session in creation order, routes
//! them to handlers, and marks them processed. Ticks never overlap; the
//! only suspension points are rate-limiter acquisition and the model
//! collaborator calls.
//!
//! Failure handling is deliberately layered. A handler error is caught at
//! the event boundary and the event is still marked processed (best-effort,
//! at-most-once). A tick-level storage error is caught by the loop wrapper.
//! Only a summarize event stops the loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use engram_core::providers::truncate_for_embedding;
use engram_core::{
    EventType, LanguageModel, Observation, PendingEvent, SessionSummary, TextEmbedder, Turn,
};
use engram_limiter::RateLimiter;
use engram_protocol::{
    decode_summary_reply, decode_tool_reply, summary_request, tool_event_request,
    ObservationDraft, SummaryDraft, ToolOutcome, SYSTEM_PREAMBLE,
};
use engram_settings::EngramSettings;
use engram_store::{ObservationRepo, PendingEventRepo, Store, SummaryRepo, VectorRepo};

use crate::errors::Result;
use crate::registry::SessionRegistry;

/// Prior observations digested into each tool-event request.
const PRIOR_DIGEST_LIMIT: usize = 20;

/// The poller/dispatcher.
///
/// Owns the session registry and the shared storage handle; the model
/// collaborators and their per-call-class rate limiters are injected at
/// bootstrap.
pub struct Poller {
    store: Store,
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn TextEmbedder>,
    llm_limiter: Arc<RateLimiter>,
    embed_limiter: Arc<RateLimiter>,
    vectors: VectorRepo,
    registry: SessionRegistry,
    batch_size: usize,
    tick_interval: Duration,
    skip_tools: HashSet<String>,
    embed_max_chars: usize,
}

impl Poller {
    /// Assemble a poller from its injected collaborators and settings.
    pub fn new(
        store: Store,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn TextEmbedder>,
        llm_limiter: Arc<RateLimiter>,
        embed_limiter: Arc<RateLimiter>,
        settings: &EngramSettings,
    ) -> Self {
        let vectors = VectorRepo::new(embedder.dimensions());
        let registry = SessionRegistry::new(
            Duration::from_secs(settings.poller.idle_timeout_minutes * 60),
            settings.poller.max_history_turns,
        );
        Self {
            store,
            llm,
            embedder,
            llm_limiter,
            embed_limiter,
            vectors,
            registry,
            batch_size: settings.poller.batch_size,
            tick_interval: Duration::from_millis(settings.poller.tick_interval_ms),
            skip_tools: settings.poller.skip_tools.iter().cloned().collect(),
            embed_max_chars: settings.embedding.max_chars,
        }
    }

    /// The session registry (inspection and tests).
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run the poll loop until a summarize event is handled or `shutdown`
    /// is cancelled.
    ///
    /// Cancellation never interrupts a running tick: the current tick runs
    /// to completion, including every awaited collaborator call, and only
    /// the next tick is stopped.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(interval = ?self.tick_interval, "poller loop started");
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => match self.tick().await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => error!(error = %e, "tick failed"),
                },
                () = shutdown.cancelled() => {
                    info!("termination requested, stopping poll loop");
                    break;
                }
            }
        }

        self.registry.clear();
        info!("poller loop stopped");
    }

    /// One tick of the loop. Returns `true` when a summarize event was
    /// handled and the loop should shut down.
    pub async fn tick(&mut self) -> Result<bool> {
        let _ = self.registry.evict_idle(Instant::now());

        let sessions = {
            let conn = self.store.conn()?;
            PendingEventRepo::sessions_with_pending(&conn)?
        };

        for session_id in sessions {
            let events = {
                let conn = self.store.conn()?;
                PendingEventRepo::next_unprocessed(&conn, &session_id, self.batch_size)?
            };

            for event in events {
                let summarize = event.event_type == EventType::Summarize;
                if let Err(e) = self.handle_event(&event).await {
                    warn!(
                        event_id = %event.id,
                        session_id = %event.session_id,
                        error = %e,
                        "event handler failed; event will not be retried"
                    );
                }
                self.finish_event(&event.id);
                if summarize {
                    info!(session_id = %event.session_id, "summarize handled, beginning shutdown");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn handle_event(&mut self, event: &PendingEvent) -> Result<()> {
        match event.event_type {
            EventType::ToolUse => self.handle_tool_event(event).await,
            EventType::Summarize => self.handle_summary_event(event).await,
        }
    }

    /// Distill one tool invocation into at most one observation.
    async fn handle_tool_event(&mut self, event: &PendingEvent) -> Result<()> {
        let now = Instant::now();
        let tool = event.tool_name.as_deref().unwrap_or("");
        if self.skip_tools.contains(tool) {
            debug!(event_id = %event.id, tool, "skip-listed tool, no model interaction");
            self.registry.touch(&event.session_id, now);
            return Ok(());
        }

        let resume_from = if self.registry.contains(&event.session_id) {
            0
        } else {
            let conn = self.store.conn()?;
            ObservationRepo::max_prompt_number(&conn, &event.session_id)?
        };
        let prior = {
            let conn = self.store.conn()?;
            ObservationRepo::recent_for_session(&conn, &event.session_id, PRIOR_DIGEST_LIMIT)?
        };
        let request = tool_event_request(event, &prior);

        let llm = Arc::clone(&self.llm);
        let limiter = Arc::clone(&self.llm_limiter);
        let ctx = self.registry.get_or_create(&event.session_id, resume_from);
        ctx.touch(now);
        ctx.push_turn(Turn::user(request));

        limiter.acquire().await;
        let reply = llm.complete(ctx.turns()).await?;
        ctx.push_turn(Turn::assistant(reply.clone()));

        match decode_tool_reply(&reply) {
            ToolOutcome::Skip { reason } => {
                debug!(event_id = %event.id, reason, "model skipped event");
                Ok(())
            }
            ToolOutcome::Observation(draft) => {
                let prompt_number = ctx.next_prompt_number();
                let obs = observation_from_draft(draft, event, prompt_number);
                {
                    let conn = self.store.conn()?;
                    ObservationRepo::insert(&conn, &obs)?;
                }
                info!(
                    observation_id = %obs.id,
                    session_id = %obs.session_id,
                    prompt_number,
                    kind = obs.kind.as_str(),
                    title = %obs.title,
                    "observation persisted"
                );
                self.index_observation(&obs).await;
                Ok(())
            }
        }
    }

    /// Summarize the session from its recorded observations.
    ///
    /// A single standalone prompt; the accumulated history is deliberately
    /// not included. The caller begins shutdown afterwards regardless of
    /// what happens here.
    async fn handle_summary_event(&mut self, event: &PendingEvent) -> Result<()> {
        let observations = {
            let conn = self.store.conn()?;
            ObservationRepo::all_for_session(&conn, &event.session_id)?
        };
        let turns = [Turn::system(SYSTEM_PREAMBLE), Turn::user(summary_request(&observations))];

        self.llm_limiter.acquire().await;
        let reply = self.llm.complete(&turns).await?;

        match decode_summary_reply(&reply) {
            Some(draft) => {
                let summary = summary_from_draft(draft, event);
                let conn = self.store.conn()?;
                SummaryRepo::upsert(&conn, &summary)?;
                info!(
                    summary_id = %summary.id,
                    session_id = %summary.session_id,
                    "session summary persisted"
                );
            }
            None => {
                debug!(session_id = %event.session_id, "no summary block in reply");
            }
        }
        Ok(())
    }

    /// Embed and index a freshly persisted observation.
    ///
    /// Failures are logged, never propagated: the observation is already
    /// durable, and a missing vector is picked up by the next backfill.
    async fn index_observation(&self, obs: &Observation) {
        let text = obs.embedding_text();
        if text.trim().is_empty() {
            return;
        }

        self.embed_limiter.acquire().await;
        let vector =
            match self.embedder.embed(truncate_for_embedding(&text, self.embed_max_chars)).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(observation_id = %obs.id, error = %e, "embedding failed");
                    return;
                }
            };

        let stored = self
            .store
            .conn()
            .and_then(|conn| self.vectors.store(&conn, &obs.id, &obs.project, &vector));
        if let Err(e) = stored {
            warn!(observation_id = %obs.id, error = %e, "vector store failed");
        }
    }

    /// Mark an event consumed. Never fails the tick; a mark that cannot be
    /// written is logged and the event may be seen again next tick.
    fn finish_event(&self, event_id: &str) {
        let marked =
            self.store.conn().and_then(|conn| PendingEventRepo::mark_processed(&conn, event_id));
        match marked {
            Ok(true) => {}
            Ok(false) => warn!(event_id, "event missing when marking processed"),
            Err(e) => warn!(event_id, error = %e, "failed to mark event processed"),
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("batch_size", &self.batch_size)
            .field("tick_interval", &self.tick_interval)
            .field("tracked_sessions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

fn observation_from_draft(
    draft: ObservationDraft,
    event: &PendingEvent,
    prompt_number: i64,
) -> Observation {
    Observation {
        id: draft.id,
        session_id: event.session_id.clone(),
        project: event.project.clone().unwrap_or_default(),
        prompt_number,
        timestamp_ms: event.created_at_ms,
        kind: draft.kind,
        title: draft.title,
        subtitle: draft.subtitle,
        narrative: draft.narrative,
        facts: draft.facts,
        concepts: draft.concepts,
        files_read: draft.files_read,
        files_modified: draft.files_modified,
        tool_name: event.tool_name.clone(),
        correlation_id: Some(event.id.clone()),
        created_at: now_rfc3339(),
    }
}

fn summary_from_draft(draft: SummaryDraft, event: &PendingEvent) -> SessionSummary {
    SessionSummary {
        id: draft.id,
        session_id: event.session_id.clone(),
        project: event.project.clone().unwrap_or_default(),
        request: draft.request,
        investigated: draft.investigated,
        learned: draft.learned,
        completed: draft.completed,
        next_steps: draft.next_steps,
        notes: draft.notes,
        created_at: now_rfc3339(),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
