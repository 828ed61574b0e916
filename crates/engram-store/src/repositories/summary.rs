//! Session summary repository.
//!
//! A session has at most one meaningful summary. Upserts are
//! delete-then-insert keyed on `session_id`, so the last write wins.

use rusqlite::{params, Connection, OptionalExtension};

use engram_core::SessionSummary;

use crate::errors::Result;

const COLUMNS: &str = "id, session_id, project, request, investigated, learned, completed, \
                       next_steps, notes, created_at";

/// Session summary repository — stateless, every method takes `&Connection`.
pub struct SummaryRepo;

impl SummaryRepo {
    /// Insert or replace the summary for a session.
    pub fn upsert(conn: &Connection, summary: &SessionSummary) -> Result<()> {
        let _ = conn.execute(
            "DELETE FROM session_summaries WHERE session_id = ?1",
            params![summary.session_id],
        )?;
        let _ = conn.execute(
            &format!(
                "INSERT INTO session_summaries ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                summary.id,
                summary.session_id,
                summary.project,
                summary.request,
                serde_json::to_string(&summary.investigated)?,
                serde_json::to_string(&summary.learned)?,
                serde_json::to_string(&summary.completed)?,
                serde_json::to_string(&summary.next_steps)?,
                summary.notes,
                summary.created_at,
            ],
        )?;
        Ok(())
    }

    /// Fetch the summary for a session, if one exists.
    pub fn get_by_session(conn: &Connection, session_id: &str) -> Result<Option<SessionSummary>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM session_summaries WHERE session_id = ?1"),
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Total summary count.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM session_summaries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete the summary for a session. Returns whether a row was removed.
    pub fn delete_by_session(conn: &Connection, session_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM session_summaries WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionSummary> {
        Ok(SessionSummary {
            id: row.get(0)?,
            session_id: row.get(1)?,
            project: row.get(2)?,
            request: row.get(3)?,
            investigated: read_list(row, 4)?,
            learned: read_list(row, 5)?,
            completed: read_list(row, 6)?,
            next_steps: read_list(row, 7)?,
            notes: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

/// Read a JSON list column, tolerating corruption as an empty list.
fn read_list(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(index)?;
    Ok(serde_json::from_str(&raw).unwrap_or_default())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn make_summary(id: &str, session: &str, request: &str) -> SessionSummary {
        SessionSummary {
            id: id.to_string(),
            session_id: session.to_string(),
            project: "engram".to_string(),
            request: request.to_string(),
            investigated: vec!["the poller".to_string()],
            learned: vec!["ticks never overlap".to_string()],
            completed: vec!["registry".to_string()],
            next_steps: vec!["backfill".to_string()],
            notes: "clean run".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn upsert_and_get() {
        let conn = setup();
        SummaryRepo::upsert(&conn, &make_summary("sum_1", "s1", "port the poller")).unwrap();

        let summary = SummaryRepo::get_by_session(&conn, "s1").unwrap().unwrap();
        assert_eq!(summary.request, "port the poller");
        assert_eq!(summary.investigated, vec!["the poller"]);
        assert_eq!(summary.next_steps, vec!["backfill"]);
    }

    #[test]
    fn get_missing_is_none() {
        let conn = setup();
        assert!(SummaryRepo::get_by_session(&conn, "s1").unwrap().is_none());
    }

    #[test]
    fn last_write_wins() {
        let conn = setup();
        SummaryRepo::upsert(&conn, &make_summary("sum_1", "s1", "first")).unwrap();
        SummaryRepo::upsert(&conn, &make_summary("sum_2", "s1", "second")).unwrap();

        assert_eq!(SummaryRepo::count(&conn).unwrap(), 1);
        let summary = SummaryRepo::get_by_session(&conn, "s1").unwrap().unwrap();
        assert_eq!(summary.id, "sum_2");
        assert_eq!(summary.request, "second");
    }

    #[test]
    fn sessions_are_independent() {
        let conn = setup();
        SummaryRepo::upsert(&conn, &make_summary("sum_1", "s1", "a")).unwrap();
        SummaryRepo::upsert(&conn, &make_summary("sum_2", "s2", "b")).unwrap();

        assert_eq!(SummaryRepo::count(&conn).unwrap(), 2);
        assert_eq!(
            SummaryRepo::get_by_session(&conn, "s2").unwrap().unwrap().request,
            "b"
        );
    }

    #[test]
    fn delete_by_session() {
        let conn = setup();
        SummaryRepo::upsert(&conn, &make_summary("sum_1", "s1", "a")).unwrap();
        assert!(SummaryRepo::delete_by_session(&conn, "s1").unwrap());
        assert!(!SummaryRepo::delete_by_session(&conn, "s1").unwrap());
    }
}
