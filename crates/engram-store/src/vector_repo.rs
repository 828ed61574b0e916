//! Vector index with `SQLite` BLOB storage and brute-force KNN search.
//!
//! Vectors are keyed by observation id. The nearest-neighbor primitive
//! returns cosine *distance* ascending; the retrieval engine converts to
//! similarity and applies its structural filters in a second pass, because
//! the index itself cannot pre-filter.

use rusqlite::{params, Connection};

use crate::errors::{Result, StoreError};

/// Convert an f32 slice to a byte blob for storage.
pub fn f32_slice_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a byte blob back to an f32 vector.
pub fn blob_to_f32_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity of two vectors; `0.0` when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Cosine distance: `1 - similarity`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// One nearest-neighbor match.
#[derive(Clone, Debug)]
pub struct VectorMatch {
    /// Observation the vector belongs to.
    pub observation_id: String,
    /// Project recorded alongside the vector.
    pub project: String,
    /// Cosine distance to the query (lower = closer).
    pub distance: f32,
}

/// Vector repository with a fixed expected dimensionality.
pub struct VectorRepo {
    dims: usize,
}

impl VectorRepo {
    /// Create a repository expecting `dims`-length vectors.
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    /// Expected vector length.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Store an embedding (delete-then-insert for upsert).
    pub fn store(
        &self,
        conn: &Connection,
        observation_id: &str,
        project: &str,
        embedding: &[f32],
    ) -> Result<()> {
        if embedding.len() != self.dims {
            return Err(StoreError::Vector(format!(
                "dimension mismatch: expected {}, got {}",
                self.dims,
                embedding.len()
            )));
        }
        let blob = f32_slice_to_blob(embedding);
        let _ = conn.execute(
            "DELETE FROM observation_vectors WHERE observation_id = ?1",
            params![observation_id],
        )?;
        let _ = conn.execute(
            "INSERT INTO observation_vectors (observation_id, project, embedding)
             VALUES (?1, ?2, ?3)",
            params![observation_id, project, blob],
        )?;
        Ok(())
    }

    /// Delete a vector by observation ID.
    pub fn delete(&self, conn: &Connection, observation_id: &str) -> Result<()> {
        let _ = conn.execute(
            "DELETE FROM observation_vectors WHERE observation_id = ?1",
            params![observation_id],
        )?;
        Ok(())
    }

    /// Count stored vectors.
    #[allow(clippy::cast_sign_loss)]
    pub fn count(&self, conn: &Connection) -> Result<usize> {
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM observation_vectors", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// K-nearest-neighbor query: the `k` closest vectors by cosine distance,
    /// ascending. An empty corpus yields an empty list.
    pub fn knn(&self, conn: &Connection, query: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        let mut stmt =
            conn.prepare("SELECT observation_id, project, embedding FROM observation_vectors")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut matches: Vec<VectorMatch> = rows
            .into_iter()
            .map(|(observation_id, project, blob)| {
                let embedding = blob_to_f32_vec(&blob);
                VectorMatch {
                    observation_id,
                    project,
                    distance: cosine_distance(query, &embedding),
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);
        Ok(matches)
    }

    /// Observations that have no stored vector yet, oldest first.
    ///
    /// Feeds the backfill path after restoring a database or enabling
    /// embeddings late.
    pub fn missing_observation_ids(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT o.id FROM observations o
             LEFT JOIN observation_vectors v ON v.observation_id = o.id
             WHERE v.observation_id IS NULL
             ORDER BY o.created_at ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn test_vector(dims: usize, seed: u8) -> Vec<f32> {
        let mut v: Vec<f32> = (0..dims)
            .map(|i| (i as f32 * 0.7 + f32::from(seed) * 3.1).sin())
            .collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= norm;
        }
        v
    }

    #[test]
    fn blob_round_trip() {
        let original = vec![1.0_f32, -2.5, 3.125, 0.0];
        assert_eq!(blob_to_f32_vec(&f32_slice_to_blob(&original)), original);
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = test_vector(16, 1);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
        assert!(cosine_distance(&v, &v).abs() < 1e-5);
    }

    #[test]
    fn cosine_zero_norm_is_zero() {
        let zero = vec![0.0_f32; 4];
        let v = test_vector(4, 1);
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
    }

    #[test]
    fn store_and_count() {
        let conn = setup();
        let repo = VectorRepo::new(8);
        repo.store(&conn, "obs_1", "engram", &test_vector(8, 1)).unwrap();
        assert_eq!(repo.count(&conn).unwrap(), 1);
    }

    #[test]
    fn store_upsert_replaces() {
        let conn = setup();
        let repo = VectorRepo::new(8);
        repo.store(&conn, "obs_1", "engram", &test_vector(8, 1)).unwrap();
        repo.store(&conn, "obs_1", "engram", &test_vector(8, 2)).unwrap();
        assert_eq!(repo.count(&conn).unwrap(), 1);
    }

    #[test]
    fn store_rejects_wrong_dimensions() {
        let conn = setup();
        let repo = VectorRepo::new(8);
        let err = repo.store(&conn, "obs_1", "engram", &[1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn delete_is_idempotent() {
        let conn = setup();
        let repo = VectorRepo::new(8);
        repo.store(&conn, "obs_1", "engram", &test_vector(8, 1)).unwrap();
        repo.delete(&conn, "obs_1").unwrap();
        repo.delete(&conn, "obs_1").unwrap();
        assert_eq!(repo.count(&conn).unwrap(), 0);
    }

    #[test]
    fn knn_empty_corpus_is_empty() {
        let conn = setup();
        let repo = VectorRepo::new(8);
        assert!(repo.knn(&conn, &test_vector(8, 0), 10).unwrap().is_empty());
    }

    #[test]
    fn knn_orders_by_distance() {
        let conn = setup();
        let repo = VectorRepo::new(32);
        let query = test_vector(32, 0);
        repo.store(&conn, "obs_far", "engram", &test_vector(32, 90)).unwrap();
        repo.store(&conn, "obs_exact", "engram", &query).unwrap();

        let matches = repo.knn(&conn, &query, 10).unwrap();
        assert_eq!(matches[0].observation_id, "obs_exact");
        assert!(matches[0].distance < matches[1].distance);
    }

    #[test]
    fn knn_respects_k() {
        let conn = setup();
        let repo = VectorRepo::new(16);
        for i in 0..6_u8 {
            repo.store(&conn, &format!("obs_{i}"), "engram", &test_vector(16, i)).unwrap();
        }
        assert_eq!(repo.knn(&conn, &test_vector(16, 0), 4).unwrap().len(), 4);
    }

    #[test]
    fn knn_carries_project() {
        let conn = setup();
        let repo = VectorRepo::new(8);
        repo.store(&conn, "obs_1", "alpha", &test_vector(8, 1)).unwrap();
        let matches = repo.knn(&conn, &test_vector(8, 1), 1).unwrap();
        assert_eq!(matches[0].project, "alpha");
    }

    #[test]
    fn missing_observation_ids_finds_gaps() {
        let conn = setup();
        let repo = VectorRepo::new(8);
        let _ = conn
            .execute(
                "INSERT INTO observations (id, session_id, project, prompt_number, timestamp_ms,
                 kind, title, subtitle, narrative, facts, concepts, files_read, files_modified,
                 tool_name, correlation_id, created_at)
                 VALUES ('obs_1', 's1', 'p', 1, 1, 'general', 't', '', '', '[]', '[]', '[]', '[]',
                 NULL, NULL, '2025-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        let _ = conn
            .execute(
                "INSERT INTO observations (id, session_id, project, prompt_number, timestamp_ms,
                 kind, title, subtitle, narrative, facts, concepts, files_read, files_modified,
                 tool_name, correlation_id, created_at)
                 VALUES ('obs_2', 's1', 'p', 2, 2, 'general', 't', '', '', '[]', '[]', '[]', '[]',
                 NULL, NULL, '2025-01-02T00:00:00Z')",
                [],
            )
            .unwrap();
        repo.store(&conn, "obs_1", "p", &test_vector(8, 1)).unwrap();

        assert_eq!(repo.missing_observation_ids(&conn).unwrap(), vec!["obs_2"]);
    }
}
