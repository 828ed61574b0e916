//! SQLite storage for the Engram observer.
//!
//! One [`Store`] handle wraps an `r2d2` connection pool; repositories are
//! stateless and take `&Connection`, so the poller and the retrieval engine
//! share the same handle. Writes commit independently per event — there is
//! no cross-event transaction, so a crash leaves a consistent prefix of
//! completed work.

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod vector_repo;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use errors::{Result, StoreError};
pub use migrations::run_migrations;
pub use repositories::{ObservationRepo, PendingEventRepo, SummaryRepo};
pub use vector_repo::{VectorMatch, VectorRepo};

/// Shared storage handle: a connection pool with migrations applied.
///
/// Cloning shares the underlying pool.
#[derive(Clone)]
pub struct Store {
    pool: ConnectionPool,
}

impl Store {
    /// Open (or create) a file-backed database and run migrations.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::new_file(path, config)?;
        let _ = run_migrations(&pool.get()?)?;
        Ok(Self { pool })
    }

    /// Open an in-memory database with migrations applied (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        let _ = run_migrations(&pool.get()?)?;
        Ok(Self { pool })
    }

    /// Check out a pooled connection.
    pub fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("pool_size", &self.pool.max_size()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_is_migrated() {
        let store = Store::in_memory().unwrap();
        let conn = store.conn().unwrap();
        assert_eq!(ObservationRepo::count(&conn).unwrap(), 0);
        assert_eq!(PendingEventRepo::count_unprocessed(&conn).unwrap(), 0);
    }

    #[test]
    fn file_store_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engram.db");
        let path = path.to_str().unwrap();

        {
            let store = Store::open(path, &ConnectionConfig::default()).unwrap();
            let conn = store.conn().unwrap();
            let _ = conn
                .execute(
                    "INSERT INTO observations (id, session_id, project, prompt_number,
                     timestamp_ms, kind, title, subtitle, narrative, facts, concepts,
                     files_read, files_modified, tool_name, correlation_id, created_at)
                     VALUES ('obs_1', 's1', 'p', 1, 1, 'general', 't', '', '', '[]', '[]',
                     '[]', '[]', NULL, NULL, '2025-01-01T00:00:00Z')",
                    [],
                )
                .unwrap();
        }

        let store = Store::open(path, &ConnectionConfig::default()).unwrap();
        let conn = store.conn().unwrap();
        assert_eq!(ObservationRepo::count(&conn).unwrap(), 1);
    }

    #[test]
    fn clones_share_the_pool() {
        let store = Store::in_memory().unwrap();
        let clone = store.clone();
        let conn = store.conn().unwrap();
        let _ = conn
            .execute(
                "INSERT INTO pending_events (id, session_id, event_type, created_at_ms, processed)
                 VALUES ('evt_1', 's1', 'tool_use', 1, 0)",
                [],
            )
            .unwrap();
        drop(conn);
        let conn = clone.conn().unwrap();
        assert_eq!(PendingEventRepo::count_unprocessed(&conn).unwrap(), 1);
    }
}
