//! Request envelope builders.
//!
//! Two request shapes exist: the per-tool-event envelope (sent over the
//! session's accumulated history) and the end-of-session summary request
//! (sent standalone). Free text from tools is escaped before embedding so a
//! tool response can never smuggle protocol tags into the envelope.

use std::fmt::Write;

use engram_core::{Observation, PendingEvent};

use crate::text::escape_text;
use crate::ObservationDraft;

/// Fixed initialization turn seeded into every session's history.
pub const SYSTEM_PREAMBLE: &str = "You are the observer for an assistant coding session. \
You receive one completed tool invocation at a time, with the session's prior observations \
for context, and distill the meaningful ones into structured observations. \
Reply with exactly one tagged block in the format each request shows you. \
Skip routine invocations that teach nothing worth remembering.";

/// Reply-format template shown to the model with every tool event.
const TOOL_REPLY_FORMAT: &str = "\
To record an observation, reply:\n\
<observation>\n\
<type>decision|learning|bugfix|refactor|feature|debug|test|config|general</type>\n\
<title>one line</title>\n\
<subtitle>one line</subtitle>\n\
<narrative>what happened and why it matters</narrative>\n\
<facts><fact>one discrete fact</fact></facts>\n\
<concepts><concept>one concept</concept></concepts>\n\
<files_read><file>path</file></files_read>\n\
<files_modified><file>path</file></files_modified>\n\
</observation>\n\
\n\
To skip, reply:\n\
<skip><reason>why nothing is worth recording</reason></skip>";

/// Reply-format template shown to the model with the summary request.
const SUMMARY_REPLY_FORMAT: &str = "\
Reply:\n\
<summary>\n\
<request>what the user originally asked for</request>\n\
<investigated><item>an area that was examined</item></investigated>\n\
<learned><item>a lesson</item></learned>\n\
<completed><item>a finished piece of work</item></completed>\n\
<next_steps><item>an open follow-up</item></next_steps>\n\
<notes>anything else worth keeping</notes>\n\
</summary>";

/// Build the request envelope for one tool-use event.
///
/// Carries the tool name, input, response, working directory, and project,
/// plus a compact digest of the session's prior observation titles and
/// subtitles so the model avoids re-recording what it already knows.
pub fn tool_event_request(event: &PendingEvent, prior: &[Observation]) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(
        "A tool invocation just completed. Distill it into at most one observation, or skip it.\n\n",
    );

    out.push_str("<tool_event>\n");
    push_field(&mut out, "tool_name", event.tool_name.as_deref().unwrap_or(""));
    push_field(&mut out, "cwd", event.cwd.as_deref().unwrap_or(""));
    push_field(&mut out, "project", event.project.as_deref().unwrap_or(""));
    push_field(&mut out, "tool_input", event.tool_input.as_deref().unwrap_or(""));
    push_field(&mut out, "tool_response", event.tool_response.as_deref().unwrap_or(""));
    out.push_str("</tool_event>\n");

    if !prior.is_empty() {
        out.push_str("\n<prior_observations>\n");
        for obs in prior {
            let _ = writeln!(
                out,
                "<prior>{}: {}</prior>",
                escape_text(&obs.title),
                escape_text(&obs.subtitle)
            );
        }
        out.push_str("</prior_observations>\n");
    }

    out.push('\n');
    out.push_str(TOOL_REPLY_FORMAT);
    out
}

/// Build the end-of-session summary request.
///
/// A single standalone prompt over a digest of every observation recorded
/// for the session; the accumulated history is deliberately not included.
pub fn summary_request(session_observations: &[Observation]) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(
        "The session has ended. Produce one summary of the whole session from its observations.\n\n",
    );

    out.push_str("<session_observations>\n");
    if session_observations.is_empty() {
        out.push_str("(no observations were recorded)\n");
    }
    for obs in session_observations {
        out.push_str("<entry>\n");
        push_field(&mut out, "title", &obs.title);
        push_field(&mut out, "narrative", &obs.narrative);
        out.push_str("</entry>\n");
    }
    out.push_str("</session_observations>\n\n");

    out.push_str(SUMMARY_REPLY_FORMAT);
    out
}

/// Render an observation draft in the reply format.
///
/// The inverse of decoding; used to show concrete examples in docs and to
/// verify the decode path against known-good blocks.
pub fn render_observation(draft: &ObservationDraft) -> String {
    let mut out = String::with_capacity(512);
    out.push_str("<observation>\n");
    push_field(&mut out, "type", draft.kind.as_str());
    push_field(&mut out, "title", &draft.title);
    push_field(&mut out, "subtitle", &draft.subtitle);
    push_field(&mut out, "narrative", &draft.narrative);
    push_list(&mut out, "facts", "fact", &draft.facts);
    push_list(&mut out, "concepts", "concept", &draft.concepts);
    push_list(&mut out, "files_read", "file", &draft.files_read);
    push_list(&mut out, "files_modified", "file", &draft.files_modified);
    out.push_str("</observation>");
    out
}

fn push_field(out: &mut String, tag: &str, value: &str) {
    let _ = writeln!(out, "<{tag}>{}</{tag}>", escape_text(value));
}

fn push_list(out: &mut String, container: &str, item_tag: &str, values: &[String]) {
    let _ = write!(out, "<{container}>");
    for value in values {
        let _ = write!(out, "<{item_tag}>{}</{item_tag}>", escape_text(value));
    }
    let _ = writeln!(out, "</{container}>");
}
