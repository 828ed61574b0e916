//! Identifier generation.
//!
//! Every persisted entity gets a prefixed UUIDv7: a millisecond timestamp
//! prefix plus a random suffix. IDs sort roughly by creation time and need
//! no central sequence, so independent writers never collide.

use uuid::Uuid;

/// Generate an observation ID.
pub fn observation_id() -> String {
    format!("obs_{}", Uuid::now_v7())
}

/// Generate a session summary ID.
pub fn summary_id() -> String {
    format!("sum_{}", Uuid::now_v7())
}

/// Generate a pending event ID (recorder side).
pub fn event_id() -> String {
    format!("evt_{}", Uuid::now_v7())
}
