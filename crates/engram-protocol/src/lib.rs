//! Request/response protocol with the language model.
//!
//! Requests are tagged text envelopes; replies are free text that the model
//! *usually* formats as a single tagged block. Decoding is deliberately
//! tolerant: it scans for one recognized top-level block and extracts known
//! child fields independently, defaulting anything absent. It is not a
//! markup parser and never fails — a malformed reply degrades to
//! [`ToolOutcome::Skip`] (tool events) or `None` (summaries).

mod decode;
mod encode;
mod text;

pub use decode::{decode_summary_reply, decode_tool_reply};
pub use encode::{render_observation, summary_request, tool_event_request, SYSTEM_PREAMBLE};

use engram_core::ObservationKind;

/// Decoded outcome of a tool-event reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The model distilled an observation.
    Observation(ObservationDraft),
    /// No observation warranted for this event.
    Skip {
        /// The model's stated reason, or a decoder default.
        reason: String,
    },
}

/// Observation fields as decoded from a reply, before the pipeline attaches
/// session, project, prompt number, and timestamps.
///
/// The `id` is generated at decode time (timestamp-prefixed, random suffix)
/// so no central sequence is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationDraft {
    /// Freshly generated observation ID.
    pub id: String,
    /// Classification; unknown values decode as general.
    pub kind: ObservationKind,
    /// One-line headline.
    pub title: String,
    /// Secondary headline.
    pub subtitle: String,
    /// Prose account.
    pub narrative: String,
    /// Discrete facts.
    pub facts: Vec<String>,
    /// Domain concepts.
    pub concepts: Vec<String>,
    /// Files read.
    pub files_read: Vec<String>,
    /// Files modified.
    pub files_modified: Vec<String>,
}

/// Session summary fields as decoded from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryDraft {
    /// Freshly generated summary ID.
    pub id: String,
    /// What the user originally asked for.
    pub request: String,
    /// Areas investigated.
    pub investigated: Vec<String>,
    /// Lessons learned.
    pub learned: Vec<String>,
    /// Work completed.
    pub completed: Vec<String>,
    /// Follow-ups left open.
    pub next_steps: Vec<String>,
    /// Free-form remarks.
    pub notes: String,
}
