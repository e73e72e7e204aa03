//! Low-level vector table operations using sqlite-vec.

use rusqlite::{Connection, params};
use tracing::debug;
use zerocopy::IntoBytes;

use crate::error::Result;

/// Initialize the sqlite-vec extension for all connections in this process.
///
/// Must be called before opening any connection that uses vector tables.
/// `sqlite3_auto_extension` applies globally, so calling it more than once
/// is harmless.
pub fn init_vector_extension() {
    use rusqlite::ffi::sqlite3_auto_extension;
    use sqlite_vec::sqlite3_vec_init;

    unsafe {
        #[allow(clippy::missing_transmute_annotations)]
        sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
    }
}

/// Check that the sqlite-vec extension is loaded; returns its version.
pub fn check_vector_extension(conn: &Connection) -> Result<String> {
    let version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
    Ok(version)
}

/// Create the vector virtual table for the given dimensionality.
pub fn create_vector_table(conn: &Connection, dims: usize) -> Result<()> {
    let sql = format!(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS memory_vectors USING vec0(
            id TEXT PRIMARY KEY,
            embedding float[{dims}] distance_metric=cosine
        )
        "#
    );
    conn.execute_batch(&sql)?;
    Ok(())
}

/// Store an embedding for a memory, replacing any existing row.
pub fn upsert_embedding(conn: &Connection, id: &str, embedding: &[f32]) -> Result<()> {
    // vec0 doesn't support INSERT OR REPLACE, so delete first if exists
    conn.execute("DELETE FROM memory_vectors WHERE id = ?1", params![id])?;
    conn.execute(
        "INSERT INTO memory_vectors (id, embedding) VALUES (?1, ?2)",
        params![id, embedding.as_bytes()],
    )?;
    debug!(memory_id = id, "stored embedding");
    Ok(())
}

/// Delete an embedding row.
pub fn delete_embedding(conn: &Connection, id: &str) -> Result<bool> {
    let rows = conn.execute("DELETE FROM memory_vectors WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

/// Drop every embedding row.
pub fn clear_embeddings(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM memory_vectors", [])?;
    Ok(())
}

/// k-NN search restricted to a set of candidate ids.
///
/// Returns `(id, cosine_distance)` pairs ordered by distance ascending.
/// Candidates are pre-filtered by the caller (owner and metadata predicates),
/// so every returned id is already in scope.
pub fn knn_filtered(
    conn: &Connection,
    query: &[f32],
    candidate_ids: &[String],
    limit: usize,
) -> Result<Vec<(String, f32)>> {
    if candidate_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders: Vec<String> = (0..candidate_ids.len())
        .map(|i| format!("?{}", i + 3))
        .collect();
    let in_clause = placeholders.join(", ");

    let sql = format!(
        r#"
        SELECT id, distance
        FROM memory_vectors
        WHERE embedding MATCH ?1
          AND id IN ({in_clause})
        ORDER BY distance
        LIMIT ?2
        "#
    );

    let mut stmt = conn.prepare(&sql)?;

    let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(query.as_bytes().to_vec()),
        Box::new(limit as i64),
    ];
    for id in candidate_ids {
        param_values.push(Box::new(id.clone()));
    }
    let param_refs: Vec<&dyn rusqlite::ToSql> = param_values.iter().map(|b| b.as_ref()).collect();

    let mut rows = stmt.query(param_refs.as_slice())?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let distance: f32 = row.get(1)?;
        results.push((id, distance));
    }

    Ok(results)
}

/// Decode an embedding BLOB column back into floats.
pub fn embedding_from_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_connection() -> Connection {
        init_vector_extension();
        let conn = Connection::open_in_memory().unwrap();
        create_vector_table(&conn, 4).unwrap();
        conn
    }

    #[test]
    fn test_vector_extension_loads() {
        init_vector_extension();
        let conn = Connection::open_in_memory().unwrap();
        let version = check_vector_extension(&conn).unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_upsert_and_delete() {
        let conn = create_test_connection();

        upsert_embedding(&conn, "mem_1", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        upsert_embedding(&conn, "mem_1", &[0.0, 1.0, 0.0, 0.0]).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memory_vectors", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        assert!(delete_embedding(&conn, "mem_1").unwrap());
        assert!(!delete_embedding(&conn, "mem_1").unwrap());
    }

    #[test]
    fn test_knn_filtered_respects_candidates() {
        let conn = create_test_connection();

        upsert_embedding(&conn, "a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        upsert_embedding(&conn, "b", &[0.9, 0.1, 0.0, 0.0]).unwrap();
        upsert_embedding(&conn, "c", &[0.0, 0.0, 1.0, 0.0]).unwrap();

        let query = [1.0f32, 0.0, 0.0, 0.0];

        // Only b and c are candidates; a is excluded despite being closest.
        let hits = knn_filtered(
            &conn,
            &query,
            &["b".to_string(), "c".to_string()],
            10,
        )
        .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "b");
        assert!(hits[0].1 < hits[1].1);
    }

    #[test]
    fn test_knn_filtered_empty_candidates() {
        let conn = create_test_connection();
        upsert_embedding(&conn, "a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        let hits = knn_filtered(&conn, &[1.0, 0.0, 0.0, 0.0], &[], 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_embedding_blob_round_trip() {
        let original = vec![0.25f32, -1.5, 3.25, 0.0];
        let blob = original.as_bytes().to_vec();
        assert_eq!(embedding_from_blob(&blob), original);
    }
}
