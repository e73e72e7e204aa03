//! The memory store: vector-indexed rows with strict per-owner scoping.
//!
//! [`VectorStore`] is the adapter interface every storage engine must satisfy;
//! [`SqliteMemoryStore`] is the SQLite + sqlite-vec implementation. History
//! events are written inside the same transaction as the mutation they record,
//! so the log can never disagree with the row data.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use zerocopy::IntoBytes;

use crate::error::{Result, StoreError};
use crate::index::IndexStrategy;
use crate::types::{
    Filters, HistoryEvent, HistoryEventKind, Memory, Metadata, SearchHit, content_hash,
};
use crate::vector;

// ─────────────────────────────────────────────────────────────────────────────
// Adapter Interface
// ─────────────────────────────────────────────────────────────────────────────

/// The operation set every vector storage engine must support.
pub trait VectorStore: Send + Sync {
    /// Insert a new memory and record its `ADD` history event.
    fn insert(&self, memory: &Memory) -> Result<()>;

    /// Point read by id.
    fn get(&self, id: &str) -> Result<Memory>;

    /// Replace a memory's content (re-embedded by the caller) and record an
    /// `UPDATE` history event. Returns the updated memory.
    fn update_content(&self, id: &str, content: &str, embedding: &[f32]) -> Result<Memory>;

    /// Delete a memory and record its `DELETE` history event.
    fn delete(&self, id: &str) -> Result<()>;

    /// k-NN search restricted to `owner_id` and exact metadata matches.
    ///
    /// Results are ordered by similarity descending; ties broken by
    /// `created_at` descending.
    fn search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
        filters: &Filters,
    ) -> Result<Vec<SearchHit>>;

    /// All memories belonging to an owner, newest first.
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Memory>>;

    /// Row count, optionally scoped to an owner.
    fn count(&self, owner_id: Option<&str>) -> Result<usize>;

    /// Delete every memory belonging to an owner. Returns how many.
    fn delete_by_owner(&self, owner_id: &str) -> Result<usize>;

    /// Administrative full wipe: rows, vectors, and history.
    fn reset(&self) -> Result<()>;

    /// Ordered history events for one memory, oldest first.
    fn history(&self, memory_id: &str) -> Result<Vec<HistoryEvent>>;

    /// The configured embedding dimensionality D.
    fn dimensions(&self) -> usize;

    /// The index strategy decided at startup.
    fn strategy(&self) -> IndexStrategy;
}

/// A store that can be shared across request handlers.
pub type SharedVectorStore = std::sync::Arc<dyn VectorStore>;

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    content_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_owner ON memories(owner_id);

CREATE TABLE IF NOT EXISTS memory_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    memory_id TEXT NOT NULL,
    event TEXT NOT NULL CHECK(event IN ('ADD','UPDATE','DELETE')),
    prev_content TEXT,
    new_content TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_memory ON memory_history(memory_id);

CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite + sqlite-vec backed memory store.
#[derive(Debug)]
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
    dims: usize,
    strategy: IndexStrategy,
}

impl SqliteMemoryStore {
    /// Open or create a store at the given path with dimensionality `dims`.
    ///
    /// Fails if the store on disk was created with a different
    /// dimensionality; the index layout is not portable across D.
    pub fn open(path: impl AsRef<Path>, dims: usize) -> Result<Self> {
        vector::init_vector_extension();
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::initialize(conn, dims)
    }

    /// Create an in-memory store (tests and ephemeral deployments).
    pub fn open_in_memory(dims: usize) -> Result<Self> {
        vector::init_vector_extension();
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, dims)
    }

    fn initialize(conn: Connection, dims: usize) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;

        if let Some(stored) = read_meta(&conn, "embedding_dims")? {
            let stored: usize = stored.parse().unwrap_or(0);
            if stored != dims {
                return Err(StoreError::DimensionMismatch {
                    stored,
                    configured: dims,
                });
            }
        } else {
            write_meta(&conn, "embedding_dims", &dims.to_string())?;
        }

        let strategy = IndexStrategy::for_dimensions(dims);
        strategy.log_decision(dims);
        write_meta(&conn, "index_strategy", strategy.as_str())?;

        if strategy == IndexStrategy::Ann {
            vector::create_vector_table(&conn, dims)?;
        }

        info!(dims, strategy = strategy.as_str(), "memory store ready");

        Ok(Self {
            conn: Mutex::new(conn),
            dims,
            strategy,
        })
    }

    fn locked(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("store mutex poisoned".to_string()))
    }

    fn check_dims(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dims {
            return Err(StoreError::InvalidEmbedding {
                expected: self.dims,
                got: embedding.len(),
            });
        }
        Ok(())
    }
}

impl VectorStore for SqliteMemoryStore {
    fn insert(&self, memory: &Memory) -> Result<()> {
        self.check_dims(&memory.embedding)?;

        let mut conn = self.locked()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO memories
                (id, owner_id, content, embedding, metadata, created_at, updated_at, content_hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                memory.id,
                memory.owner_id,
                memory.content,
                memory.embedding.as_bytes(),
                serde_json::to_string(&memory.metadata)?,
                memory.created_at.to_rfc3339(),
                memory.updated_at.to_rfc3339(),
                memory.content_hash,
            ],
        )?;

        if self.strategy == IndexStrategy::Ann {
            vector::upsert_embedding(&tx, &memory.id, &memory.embedding)?;
        }

        record_event(
            &tx,
            &memory.id,
            HistoryEventKind::Add,
            None,
            Some(&memory.content),
        )?;

        tx.commit()?;
        debug!(memory_id = %memory.id, owner = %memory.owner_id, "memory inserted");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Memory> {
        let conn = self.locked()?;
        let memory = conn
            .query_row(
                "SELECT id, owner_id, content, embedding, metadata, created_at, updated_at, content_hash
                 FROM memories WHERE id = ?1",
                params![id],
                row_to_memory,
            )
            .optional()?;
        memory.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn update_content(&self, id: &str, content: &str, embedding: &[f32]) -> Result<Memory> {
        self.check_dims(embedding)?;

        let mut conn = self.locked()?;
        let tx = conn.transaction()?;

        let mut memory = tx
            .query_row(
                "SELECT id, owner_id, content, embedding, metadata, created_at, updated_at, content_hash
                 FROM memories WHERE id = ?1",
                params![id],
                row_to_memory,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let prev_content = memory.content.clone();
        let now = Utc::now();

        tx.execute(
            "UPDATE memories
             SET content = ?2, embedding = ?3, content_hash = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                id,
                content,
                embedding.as_bytes(),
                content_hash(content),
                now.to_rfc3339(),
            ],
        )?;

        if self.strategy == IndexStrategy::Ann {
            vector::upsert_embedding(&tx, id, embedding)?;
        }

        record_event(
            &tx,
            id,
            HistoryEventKind::Update,
            Some(&prev_content),
            Some(content),
        )?;

        tx.commit()?;

        memory.content = content.to_string();
        memory.embedding = embedding.to_vec();
        memory.content_hash = content_hash(content);
        memory.updated_at = now;
        Ok(memory)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.locked()?;
        let tx = conn.transaction()?;

        let content: Option<String> = tx
            .query_row(
                "SELECT content FROM memories WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let content = content.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        if self.strategy == IndexStrategy::Ann {
            vector::delete_embedding(&tx, id)?;
        }

        record_event(&tx, id, HistoryEventKind::Delete, Some(&content), None)?;

        tx.commit()?;
        debug!(memory_id = id, "memory deleted");
        Ok(())
    }

    fn search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
        filters: &Filters,
    ) -> Result<Vec<SearchHit>> {
        self.check_dims(query)?;
        let conn = self.locked()?;

        let mut hits = match self.strategy {
            IndexStrategy::Ann => {
                // Pre-filter candidates by ownership and metadata, then let
                // the index rank only those rows.
                let candidates = owned_candidates(&conn, owner_id, filters)?;
                let ranked = vector::knn_filtered(&conn, query, &candidates, limit)?;

                let mut hits = Vec::with_capacity(ranked.len());
                for (id, distance) in ranked {
                    let memory = conn.query_row(
                        "SELECT id, owner_id, content, embedding, metadata, created_at, updated_at, content_hash
                         FROM memories WHERE id = ?1",
                        params![id],
                        row_to_memory,
                    )?;
                    hits.push(SearchHit {
                        memory,
                        score: 1.0 - distance,
                    });
                }
                hits
            }
            IndexStrategy::ExactScan => {
                let mut hits = Vec::new();
                let mut stmt = conn.prepare(
                    "SELECT id, owner_id, content, embedding, metadata, created_at, updated_at, content_hash
                     FROM memories WHERE owner_id = ?1",
                )?;
                let rows = stmt.query_map(params![owner_id], row_to_memory)?;
                for row in rows {
                    let memory = row?;
                    if !metadata_matches(&memory.metadata, filters) {
                        continue;
                    }
                    let score = cosine(query, &memory.embedding);
                    hits.push(SearchHit { memory, score });
                }
                hits
            }
        };

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Memory>> {
        let conn = self.locked()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, content, embedding, metadata, created_at, updated_at, content_hash
             FROM memories WHERE owner_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], row_to_memory)?;
        let mut memories = Vec::new();
        for row in rows {
            memories.push(row?);
        }
        Ok(memories)
    }

    fn count(&self, owner_id: Option<&str>) -> Result<usize> {
        let conn = self.locked()?;
        let count: i64 = match owner_id {
            Some(owner) => conn.query_row(
                "SELECT COUNT(*) FROM memories WHERE owner_id = ?1",
                params![owner],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }

    fn delete_by_owner(&self, owner_id: &str) -> Result<usize> {
        let mut conn = self.locked()?;
        let tx = conn.transaction()?;

        let mut stmt = tx.prepare("SELECT id, content FROM memories WHERE owner_id = ?1")?;
        let rows: Vec<(String, String)> = stmt
            .query_map(params![owner_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        for (id, content) in &rows {
            tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
            if self.strategy == IndexStrategy::Ann {
                vector::delete_embedding(&tx, id)?;
            }
            record_event(&tx, id, HistoryEventKind::Delete, Some(content), None)?;
        }

        tx.commit()?;
        Ok(rows.len())
    }

    fn reset(&self) -> Result<()> {
        let conn = self.locked()?;
        conn.execute("DELETE FROM memories", [])?;
        conn.execute("DELETE FROM memory_history", [])?;
        if self.strategy == IndexStrategy::Ann {
            vector::clear_embeddings(&conn)?;
        }
        info!("memory store reset");
        Ok(())
    }

    fn history(&self, memory_id: &str) -> Result<Vec<HistoryEvent>> {
        let conn = self.locked()?;
        let mut stmt = conn.prepare(
            "SELECT memory_id, event, prev_content, new_content, created_at
             FROM memory_history WHERE memory_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![memory_id], |row| {
            let event: String = row.get(1)?;
            let created_at: String = row.get(4)?;
            Ok(HistoryEvent {
                memory_id: row.get(0)?,
                event: HistoryEventKind::parse(&event).unwrap_or(HistoryEventKind::Add),
                prev_content: row.get(2)?,
                new_content: row.get(3)?,
                created_at: parse_timestamp(&created_at),
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn strategy(&self) -> IndexStrategy {
        self.strategy
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn record_event(
    conn: &Connection,
    memory_id: &str,
    event: HistoryEventKind,
    prev_content: Option<&str>,
    new_content: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO memory_history (memory_id, event, prev_content, new_content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            memory_id,
            event.as_str(),
            prev_content,
            new_content,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Ids of an owner's memories whose metadata satisfies every filter exactly.
fn owned_candidates(conn: &Connection, owner_id: &str, filters: &Filters) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id, metadata FROM memories WHERE owner_id = ?1")?;
    let rows = stmt.query_map(params![owner_id], |row| {
        let id: String = row.get(0)?;
        let metadata: String = row.get(1)?;
        Ok((id, metadata))
    })?;

    let mut candidates = Vec::new();
    for row in rows {
        let (id, metadata_json) = row?;
        if filters.is_empty() {
            candidates.push(id);
            continue;
        }
        let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
        if metadata_matches(&metadata, filters) {
            candidates.push(id);
        }
    }
    Ok(candidates)
}

fn metadata_matches(metadata: &Metadata, filters: &Filters) -> bool {
    filters.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let embedding_blob: Vec<u8> = row.get(3)?;
    let metadata_json: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(Memory {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        content: row.get(2)?,
        embedding: vector::embedding_from_blob(&embedding_blob),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        content_hash: row.get(7)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Conformance Tests
// ─────────────────────────────────────────────────────────────────────────────
