//! Tolerant reply decoding.
//!
//! The model's output is not guaranteed to be well-formed, so this is a
//! tagged-variant scanner, not a parser: find the first recognized
//! top-level block, then pull known child fields out of it independently.
//! Missing scalars default to the empty string, missing lists to empty
//! lists, and nothing in here ever returns an error.

use engram_core::{ids, ObservationKind};
use tracing::debug;

use crate::text::{field, first_block, items};
use crate::{ObservationDraft, SummaryDraft, ToolOutcome};

/// Skip reason used when a skip block carries no reason of its own.
const UNSPECIFIED_REASON: &str = "Unspecified reason";

/// Skip reason used when no recognized block is found at all.
const PARSE_FAILURE_REASON: &str = "Failed to parse response";

/// Decode a tool-event reply into an observation or a skip.
///
/// Priority: a well-formed observation block wins; otherwise a skip block
/// with its stated reason; otherwise a parse-failure skip. Every decoded
/// draft receives a freshly generated ID.
pub fn decode_tool_reply(reply: &str) -> ToolOutcome {
    if let Some(block) = first_block(reply, "observation") {
        return ToolOutcome::Observation(decode_observation_block(block));
    }

    if let Some(block) = first_block(reply, "skip") {
        let reason = field(block, "reason");
        let reason = if reason.is_empty() {
            // Tolerate bare `<skip>some text</skip>` replies.
            let inline = block.trim();
            if inline.is_empty() { UNSPECIFIED_REASON.to_string() } else { inline.to_string() }
        } else {
            reason
        };
        return ToolOutcome::Skip { reason };
    }

    debug!(reply_len = reply.len(), "no recognized block in tool reply");
    ToolOutcome::Skip { reason: PARSE_FAILURE_REASON.to_string() }
}

/// Decode a summary reply.
///
/// Summaries have no skip concept: absence of a summary block simply means
/// no summary, so this returns `None` rather than a sentinel.
pub fn decode_summary_reply(reply: &str) -> Option<SummaryDraft> {
    let block = first_block(reply, "summary")?;
    Some(SummaryDraft {
        id: ids::summary_id(),
        request: field(block, "request"),
        investigated: items(block, "investigated", "item"),
        learned: items(block, "learned", "item"),
        completed: items(block, "completed", "item"),
        next_steps: items(block, "next_steps", "item"),
        notes: field(block, "notes"),
    })
}

fn decode_observation_block(block: &str) -> ObservationDraft {
    ObservationDraft {
        id: ids::observation_id(),
        kind: ObservationKind::parse_lenient(&field(block, "type")),
        title: field(block, "title"),
        subtitle: field(block, "subtitle"),
        narrative: field(block, "narrative"),
        facts: items(block, "facts", "fact"),
        concepts: items(block, "concepts", "concept"),
        files_read: items(block, "files_read", "file"),
        files_modified: items(block, "files_modified", "file"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
