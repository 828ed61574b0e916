//! Observation repository.
//!
//! Observations are immutable: inserted once by the pipeline, read by the
//! retrieval engine and by the digest queries that feed prompts. List
//! columns are stored as JSON arrays; a corrupt list column reads back as
//! empty rather than failing the whole row.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use engram_core::{Observation, ObservationKind};

use crate::errors::Result;

const COLUMNS: &str = "id, session_id, project, prompt_number, timestamp_ms, kind, title, \
                       subtitle, narrative, facts, concepts, files_read, files_modified, \
                       tool_name, correlation_id, created_at";

/// Observation repository — stateless, every method takes `&Connection`.
pub struct ObservationRepo;

impl ObservationRepo {
    /// Insert an observation.
    pub fn insert(conn: &Connection, obs: &Observation) -> Result<()> {
        let _ = conn.execute(
            &format!(
                "INSERT INTO observations ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                obs.id,
                obs.session_id,
                obs.project,
                obs.prompt_number,
                obs.timestamp_ms,
                obs.kind.as_str(),
                obs.title,
                obs.subtitle,
                obs.narrative,
                serde_json::to_string(&obs.facts)?,
                serde_json::to_string(&obs.concepts)?,
                serde_json::to_string(&obs.files_read)?,
                serde_json::to_string(&obs.files_modified)?,
                obs.tool_name,
                obs.correlation_id,
                obs.created_at,
            ],
        )?;
        Ok(())
    }

    /// Fetch full content by ID. List results exclude narrative/content by
    /// design; this is how callers get the whole record.
    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Observation>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM observations WHERE id = ?1"),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Batch-fetch by IDs. Missing IDs are silently omitted.
    pub fn get_by_ids(
        conn: &Connection,
        ids: &[String],
    ) -> Result<HashMap<String, Observation>> {
        let mut result = HashMap::new();
        if ids.is_empty() {
            return Ok(result);
        }

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT {COLUMNS} FROM observations WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            ids.iter().map(|s| s as &dyn rusqlite::types::ToSql).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for row in rows {
            let _ = result.insert(row.id.clone(), row);
        }
        Ok(result)
    }

    /// Highest prompt number persisted for a session, `0` if none.
    ///
    /// Resumes a session's prompt counter across process restarts.
    pub fn max_prompt_number(conn: &Connection, session_id: &str) -> Result<i64> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(prompt_number) FROM observations WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// The last `limit` observations for a session, oldest first.
    ///
    /// Feeds the prior-observation digest in tool-event prompts.
    pub fn recent_for_session(
        conn: &Connection,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Observation>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM observations
             WHERE session_id = ?1
             ORDER BY prompt_number DESC
             LIMIT ?2"
        ))?;
        #[allow(clippy::cast_possible_wrap)]
        let mut rows = stmt
            .query_map(params![session_id, limit as i64], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    /// Every observation for a session, oldest first.
    ///
    /// Feeds the session-summary digest.
    pub fn all_for_session(conn: &Connection, session_id: &str) -> Result<Vec<Observation>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM observations
             WHERE session_id = ?1
             ORDER BY prompt_number ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total observation count.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete an observation by ID. Returns whether a row was removed.
    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM observations WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Observation> {
        let kind: String = row.get(5)?;
        Ok(Observation {
            id: row.get(0)?,
            session_id: row.get(1)?,
            project: row.get(2)?,
            prompt_number: row.get(3)?,
            timestamp_ms: row.get(4)?,
            kind: ObservationKind::parse_lenient(&kind),
            title: row.get(6)?,
            subtitle: row.get(7)?,
            narrative: row.get(8)?,
            facts: read_list(row, 9)?,
            concepts: read_list(row, 10)?,
            files_read: read_list(row, 11)?,
            files_modified: read_list(row, 12)?,
            tool_name: row.get(13)?,
            correlation_id: row.get(14)?,
            created_at: row.get(15)?,
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
