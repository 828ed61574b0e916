//! Per-session conversation state.
//!
//! The registry is owned by the poller and passed by reference into tick
//! logic; there is no ambient global session map. Contexts are in-memory
//! only: eviction drops accumulated history, never persisted data. Idle
//! tracking runs on `tokio::time`, so tests drive the paused clock.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use engram_core::Turn;
use engram_protocol::SYSTEM_PREAMBLE;

/// Conversation history and counters for one session.
#[derive(Debug)]
pub struct SessionContext {
    session_id: String,
    turns: Vec<Turn>,
    last_activity: Instant,
    prompt_count: i64,
    max_turns: usize,
}

impl SessionContext {
    fn new(session_id: &str, resume_from: i64, max_turns: usize) -> Self {
        Self {
            session_id: session_id.to_string(),
            turns: vec![Turn::system(SYSTEM_PREAMBLE)],
            last_activity: Instant::now(),
            prompt_count: resume_from,
            max_turns,
        }
    }

    /// Session this context belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Accumulated history, initialization turn first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Prompt numbers handed out so far (resumed from the persisted maximum
    /// at creation).
    pub fn prompt_count(&self) -> i64 {
        self.prompt_count
    }

    /// Claim the next prompt number. Strictly increasing within a session.
    pub fn next_prompt_number(&mut self) -> i64 {
        self.prompt_count += 1;
        self.prompt_count
    }

    /// Append a turn, trimming the oldest non-system turns once the history
    /// exceeds its cap.
    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            drop(self.turns.drain(1..=excess));
        }
    }

    /// Refresh the idle clock.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.duration_since(self.last_activity)
    }
}

/// In-memory map of live session contexts.
#[derive(Debug)]
pub struct SessionRegistry {
    contexts: HashMap<String, SessionContext>,
    idle_timeout: Duration,
    max_history_turns: usize,
}

impl SessionRegistry {
    /// Create a registry evicting contexts idle beyond `idle_timeout`.
    pub fn new(idle_timeout: Duration, max_history_turns: usize) -> Self {
        Self { contexts: HashMap::new(), idle_timeout, max_history_turns }
    }

    /// Whether a context exists for this session.
    pub fn contains(&self, session_id: &str) -> bool {
        self.contexts.contains_key(session_id)
    }

    /// Context for a session, if tracked.
    pub fn get(&self, session_id: &str) -> Option<&SessionContext> {
        self.contexts.get(session_id)
    }

    /// Existing context for a session, or a new one seeded with the
    /// initialization turn and a prompt count resumed from `resume_from`
    /// (the maximum prompt number already persisted for the session).
    pub fn get_or_create(&mut self, session_id: &str, resume_from: i64) -> &mut SessionContext {
        let max_turns = self.max_history_turns;
        self.contexts.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id, resume_from, "creating session context");
            SessionContext::new(session_id, resume_from, max_turns)
        })
    }

    /// Refresh a session's idle clock, if it is tracked.
    pub fn touch(&mut self, session_id: &str, now: Instant) {
        if let Some(ctx) = self.contexts.get_mut(session_id) {
            ctx.touch(now);
        }
    }

    /// Drop every context idle beyond the timeout. Returns how many were
    /// evicted. In-memory only; persisted data is untouched.
    pub fn evict_idle(&mut self, now: Instant) -> usize {
        let before = self.contexts.len();
        let timeout = self.idle_timeout;
        self.contexts.retain(|session_id, ctx| {
            let keep = ctx.idle_for(now) < timeout;
            if !keep {
                debug!(session_id, "evicting idle session context");
            }
            keep
        });
        before - self.contexts.len()
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no contexts are tracked.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Drop every context (shutdown path).
    pub fn clear(&mut self) {
        self.contexts.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
