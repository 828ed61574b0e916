//! Pending event queue repository.
//!
//! The queue is written by the external recorder; the pipeline only reads
//! events in creation order and marks them processed. Rows are never
//! deleted here, so the queue doubles as a processing audit trail.

use rusqlite::{params, Connection};

use engram_core::{EventType, PendingEvent};

use crate::errors::Result;

/// Pending event repository — stateless, every method takes `&Connection`.
pub struct PendingEventRepo;

impl PendingEventRepo {
    /// Insert a queue entry (recorder side).
    pub fn insert(conn: &Connection, event: &PendingEvent) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO pending_events (id, session_id, event_type, tool_name, tool_input,
             tool_response, cwd, project, created_at_ms, processed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.id,
                event.session_id,
                event.event_type.as_str(),
                event.tool_name,
                event.tool_input,
                event.tool_response,
                event.cwd,
                event.project,
                event.created_at_ms,
                event.processed,
            ],
        )?;
        Ok(())
    }

    /// Unprocessed events for a session in creation order, up to `limit`.
    pub fn next_unprocessed(
        conn: &Connection,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<PendingEvent>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, event_type, tool_name, tool_input, tool_response,
                    cwd, project, created_at_ms, processed
             FROM pending_events
             WHERE session_id = ?1 AND processed = 0
             ORDER BY created_at_ms ASC, id ASC
             LIMIT ?2",
        )?;
        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt
            .query_map(params![session_id, limit as i64], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mark an event consumed. Returns whether a row changed.
    pub fn mark_processed(conn: &Connection, event_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE pending_events SET processed = 1 WHERE id = ?1",
            params![event_id],
        )?;
        Ok(changed > 0)
    }

    /// Sessions that currently have unprocessed events, ordered by the age
    /// of their oldest pending entry.
    pub fn sessions_with_pending(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT session_id FROM pending_events
             WHERE processed = 0
             GROUP BY session_id
             ORDER BY MIN(created_at_ms) ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count unprocessed events across all sessions.
    pub fn count_unprocessed(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pending_events WHERE processed = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Fetch a single event by ID.
    pub fn get_by_id(conn: &Connection, event_id: &str) -> Result<Option<PendingEvent>> {
        use rusqlite::OptionalExtension;
        let row = conn
            .query_row(
                "SELECT id, session_id, event_type, tool_name, tool_input, tool_response,
                        cwd, project, created_at_ms, processed
                 FROM pending_events WHERE id = ?1",
                params![event_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingEvent> {
        let event_type: String = row.get(2)?;
        Ok(PendingEvent {
            id: row.get(0)?,
            session_id: row.get(1)?,
            event_type: EventType::parse(&event_type),
            tool_name: row.get(3)?,
            tool_input: row.get(4)?,
            tool_response: row.get(5)?,
            cwd: row.get(6)?,
            project: row.get(7)?,
            created_at_ms: row.get(8)?,
            processed: row.get(9)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
