//! Shared entity types.
//!
//! All serializable types use `camelCase` for wire compatibility with the
//! recorder that writes pending events. Observations and session summaries
//! are immutable once created; the pipeline only ever inserts them.

use serde::{Deserialize, Serialize};

/// Kind of a pending event in the durable queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A completed tool invocation to distill.
    ToolUse,
    /// A request to summarize the session and shut down.
    Summarize,
}

impl EventType {
    /// Canonical string form, matching the queue's `event_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToolUse => "tool_use",
            Self::Summarize => "summarize",
        }
    }

    /// Parse from the stored string form.
    ///
    /// Unknown values map to [`EventType::ToolUse`] so a malformed row is
    /// handled by the normal tool-event path (which tolerates anything)
    /// instead of triggering a spurious shutdown.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "summarize" => Self::Summarize,
            _ => Self::ToolUse,
        }
    }
}

/// A queued, not-yet-processed record of a tool invocation or a
/// session-summarize request.
///
/// Created by the external recorder. The pipeline reads these in creation
/// order and marks them processed; it never mutates them otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEvent {
    /// Queue entry ID.
    pub id: String,
    /// Session this event belongs to.
    pub session_id: String,
    /// Whether this is a tool invocation or a summarize request.
    pub event_type: EventType,
    /// Tool name (tool events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Tool input, serialized by the recorder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<String>,
    /// Tool response text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<String>,
    /// Working directory at invocation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Project the session runs in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Creation time in epoch milliseconds.
    pub created_at_ms: i64,
    /// Whether the pipeline has consumed this event.
    pub processed: bool,
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed initialization turn.
    System,
    /// Request envelope sent to the model.
    User,
    /// Raw model reply.
    Assistant,
}

impl Role {
    /// Lowercase string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of accumulated per-session conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the turn.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

impl Turn {
    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Classification of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    /// A choice between alternatives was made.
    Decision,
    /// Something new was learned about the codebase or domain.
    Learning,
    /// A defect was found and corrected.
    Bugfix,
    /// Code was restructured without behavior change.
    Refactor,
    /// New functionality was added.
    Feature,
    /// An investigation into failing behavior.
    Debug,
    /// Test work.
    Test,
    /// Configuration or tooling change.
    Config,
    /// Anything that fits no other kind.
    General,
}

impl ObservationKind {
    /// Canonical lowercase string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Learning => "learning",
            Self::Bugfix => "bugfix",
            Self::Refactor => "refactor",
            Self::Feature => "feature",
            Self::Debug => "debug",
            Self::Test => "test",
            Self::Config => "config",
            Self::General => "general",
        }
    }

    /// Lenient parse: case-insensitive, trimmed, unknown values map to
    /// [`ObservationKind::General`]. Model output is not trusted to be
    /// well-formed.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "decision" => Self::Decision,
            "learning" => Self::Learning,
            "bugfix" => Self::Bugfix,
            "refactor" => Self::Refactor,
            "feature" => Self::Feature,
            "debug" => Self::Debug,
            "test" => Self::Test,
            "config" => Self::Config,
            _ => Self::General,
        }
    }
}

/// A structured, persisted record distilling one meaningful unit of work
/// from a tool invocation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Observation ID (`obs_` + UUIDv7).
    pub id: String,
    /// Session the source event belonged to.
    pub session_id: String,
    /// Project the session ran in.
    pub project: String,
    /// Position in the session's prompt sequence. Strictly increasing within
    /// a session, resumed from the persisted maximum across restarts.
    pub prompt_number: i64,
    /// Source event time in epoch milliseconds.
    pub timestamp_ms: i64,
    /// Classification.
    #[serde(rename = "type")]
    pub kind: ObservationKind,
    /// One-line headline.
    pub title: String,
    /// Secondary headline.
    pub subtitle: String,
    /// Prose account of what happened and why it matters.
    pub narrative: String,
    /// Discrete facts worth recalling verbatim.
    pub facts: Vec<String>,
    /// Domain concepts touched.
    pub concepts: Vec<String>,
    /// Files that were read.
    pub files_read: Vec<String>,
    /// Files that were modified.
    pub files_modified: Vec<String>,
    /// Tool that produced the source event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// ID of the pending event this observation was distilled from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Persist time, RFC 3339.
    pub created_at: String,
}

impl Observation {
    /// Text handed to the embedding collaborator when indexing this
    /// observation. Title and narrative carry the meaning; facts and
    /// concepts sharpen recall of specifics.
    pub fn embedding_text(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.title, &self.subtitle, &self.narrative];
        parts.extend(self.facts.iter().map(String::as_str));
        parts.extend(self.concepts.iter().map(String::as_str));
        parts.retain(|p| !p.trim().is_empty());
        parts.join("\n")
    }

    /// Concatenation of every stored text field, used for substring filters
    /// at retrieval time.
    pub fn content_haystack(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.title, &self.subtitle, &self.narrative];
        parts.extend(self.facts.iter().map(String::as_str));
        parts.extend(self.concepts.iter().map(String::as_str));
        parts.extend(self.files_read.iter().map(String::as_str));
        parts.extend(self.files_modified.iter().map(String::as_str));
        parts.join("\n")
    }
}

/// A once-per-session digest written when the session ends.
///
/// At most one meaningful instance exists per session; a later write
/// replaces an earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Summary ID (`sum_` + UUIDv7).
    pub id: String,
    /// Session being summarized.
    pub session_id: String,
    /// Project the session ran in.
    pub project: String,
    /// What the user originally asked for.
    pub request: String,
    /// Areas that were investigated.
    pub investigated: Vec<String>,
    /// Lessons learned.
    pub learned: Vec<String>,
    /// Work that was completed.
    pub completed: Vec<String>,
    /// Follow-ups left open.
    pub next_steps: Vec<String>,
    /// Free-form remarks.
    pub notes: String,
    /// Persist time, RFC 3339.
    pub created_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_observation() -> Observation {
        Observation {
            id: "obs_1".into(),
            session_id: "sess_1".into(),
            project: "engram".into(),
            prompt_number: 3,
            timestamp_ms: 1_700_000_000_000,
            kind: ObservationKind::Bugfix,
            title: "Fixed pool exhaustion".into(),
            subtitle: "Busy timeout was zero".into(),
            narrative: "The pool stalled under load.".into(),
            facts: vec!["busy_timeout defaults to 30s".into()],
            concepts: vec!["connection pooling".into()],
            files_read: vec!["src/connection.rs".into()],
            files_modified: vec!["src/connection.rs".into()],
            tool_name: Some("Edit".into()),
            correlation_id: Some("evt_9".into()),
            created_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn event_type_round_trip() {
        assert_eq!(EventType::parse("tool_use"), EventType::ToolUse);
        assert_eq!(EventType::parse("summarize"), EventType::Summarize);
        assert_eq!(EventType::ToolUse.as_str(), "tool_use");
        assert_eq!(EventType::Summarize.as_str(), "summarize");
    }

    #[test]
    fn event_type_unknown_maps_to_tool_use() {
        assert_eq!(EventType::parse("garbage"), EventType::ToolUse);
        assert_eq!(EventType::parse(" summarize "), EventType::Summarize);
    }

    #[test]
    fn observation_kind_lenient_parse() {
        assert_eq!(ObservationKind::parse_lenient("Bugfix"), ObservationKind::Bugfix);
        assert_eq!(ObservationKind::parse_lenient("  DECISION "), ObservationKind::Decision);
        assert_eq!(ObservationKind::parse_lenient("???"), ObservationKind::General);
        assert_eq!(ObservationKind::parse_lenient(""), ObservationKind::General);
    }

    #[test]
    fn observation_kind_as_str_covers_all() {
        let kinds = [
            ObservationKind::Decision,
            ObservationKind::Learning,
            ObservationKind::Bugfix,
            ObservationKind::Refactor,
            ObservationKind::Feature,
            ObservationKind::Debug,
            ObservationKind::Test,
            ObservationKind::Config,
            ObservationKind::General,
        ];
        for kind in kinds {
            assert_eq!(ObservationKind::parse_lenient(kind.as_str()), kind);
        }
    }

    #[test]
    fn observation_serde_uses_type_key() {
        let obs = sample_observation();
        let json = serde_json::to_value(&obs).unwrap();
        assert_eq!(json["type"], "bugfix");
        assert_eq!(json["sessionId"], "sess_1");
        assert_eq!(json["promptNumber"], 3);
    }

    #[test]
    fn observation_serde_round_trip() {
        let obs = sample_observation();
        let json = serde_json::to_string(&obs).unwrap();
        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ObservationKind::Bugfix);
        assert_eq!(back.facts, obs.facts);
        assert_eq!(back.correlation_id.as_deref(), Some("evt_9"));
    }

    #[test]
    fn embedding_text_skips_empty_fields() {
        let mut obs = sample_observation();
        obs.subtitle = String::new();
        let text = obs.embedding_text();
        assert!(text.contains("Fixed pool exhaustion"));
        assert!(text.contains("connection pooling"));
        assert!(!text.contains("\n\n"));
    }

    #[test]
    fn content_haystack_includes_files() {
        let obs = sample_observation();
        let haystack = obs.content_haystack();
        assert!(haystack.contains("src/connection.rs"));
        assert!(haystack.contains("busy_timeout defaults to 30s"));
    }

    #[test]
    fn turn_constructors() {
        assert_eq!(Turn::system("a").role, Role::System);
        assert_eq!(Turn::user("b").role, Role::User);
        assert_eq!(Turn::assistant("c").role, Role::Assistant);
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn pending_event_serde_skips_none() {
        let event = PendingEvent {
            id: "evt_1".into(),
            session_id: "sess_1".into(),
            event_type: EventType::Summarize,
            tool_name: None,
            tool_input: None,
            tool_response: None,
            cwd: None,
            project: None,
            created_at_ms: 1,
            processed: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("toolName"));
        assert!(json.contains("\"eventType\":\"summarize\""));
    }
}
