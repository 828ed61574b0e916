//! Token-bucket rate limiter for external provider calls.
//!
//! One limiter instance exists per call class (language model, embedding)
//! and is injected into every component that calls that provider. The bucket
//! holds a capped, continuously refilling count of permits; refill math is
//! fractional internally and exactly 1.0 permits are consumed per acquire.
//!
//! [`RateLimiter::acquire`] never fails and cannot be cancelled mid-grant:
//! waiters are served strictly in arrival order and acquisition always
//! eventually succeeds. The limiter delays, it never drops.
//!
//! Timing runs on `tokio::time`, so tests drive the paused clock instead of
//! waiting on the wall clock.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Mutable bucket state behind the mutex.
struct BucketState {
    /// Current permits, fractional, always in `0.0..=capacity`.
    tokens: f64,
    /// Refill timestamp of the last accounting pass.
    last_refill: Instant,
}

/// Token-bucket rate limiter.
///
/// Capacity `C` permits, refilling at `R` permits per millisecond, capped
/// at `C`. FIFO fairness comes from the async gate: every waiter queues on
/// a fair mutex and sleeps out its own deficit while holding its turn, so
/// later arrivals cannot overtake.
pub struct RateLimiter {
    /// Fair async gate serializing waiters in arrival order.
    gate: tokio::sync::Mutex<()>,
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_ms: f64,
}

impl RateLimiter {
    /// Create a limiter with `capacity` permits refilling at
    /// `refill_per_ms` permits per millisecond. The bucket starts full.
    pub fn new(capacity: f64, refill_per_ms: f64) -> Self {
        assert!(capacity >= 1.0, "capacity must admit at least one permit");
        assert!(refill_per_ms > 0.0, "refill rate must be positive");
        Self {
            gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
            capacity,
            refill_per_ms,
        }
    }

    /// Create a limiter from a permits-per-second rate.
    pub fn per_second(capacity: f64, refill_per_sec: f64) -> Self {
        Self::new(capacity, refill_per_sec / 1000.0)
    }

    /// Acquire one permit, waiting as long as necessary.
    ///
    /// Never fails. Concurrent callers are granted permits strictly in the
    /// order they arrived.
    pub async fn acquire(&self) {
        let _turn = self.gate.lock().await;
        loop {
            let deficit_ms = {
                let mut state = self.state.lock();
                self.refill(&mut state, Instant::now());
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                ((1.0 - state.tokens) / self.refill_per_ms).ceil()
            };
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let wait_ms = (deficit_ms as u64).max(1);
            trace!(wait_ms, "rate limiter waiting for refill");
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }
    }

    /// Try to acquire one permit without waiting.
    ///
    /// Refills first, then returns `false` instead of queueing when fewer
    /// than one permit is available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole permits currently available. Read-only apart from the refill
    /// accounting pass.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn available_tokens(&self) -> u64 {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());
        state.tokens.floor() as u64
    }

    /// Lazily credit elapsed time, capped at capacity.
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed_ms = now.duration_since(state.last_refill).as_secs_f64() * 1000.0;
        if elapsed_ms > 0.0 {
            state.tokens = (state.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
            state.last_refill = now;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_per_ms", &self.refill_per_ms)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
