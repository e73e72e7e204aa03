//! Core memory types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Open key→value metadata attached to a memory.
///
/// A `BTreeMap` keeps serialization order stable, which keeps content hashes
/// and test fixtures reproducible.
pub type Metadata = BTreeMap<String, Value>;

/// Exact-match filters applied to memory metadata during search.
pub type Filters = BTreeMap<String, Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a new opaque memory id.
pub fn new_memory_id() -> String {
    format!("mem_{}", Uuid::new_v4().simple())
}

/// The atomic unit of stored knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Opaque stable identifier.
    pub id: String,
    /// The user or project scope. Never changes after creation.
    pub owner_id: String,
    /// The extracted fact, not the raw submitted text.
    pub content: String,
    /// Dense embedding of `content`; length equals the store's configured D.
    pub embedding: Vec<f32>,
    /// Open metadata (chunk info, run id, agent id, user tags).
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stable hash of `content`, used for dedup and equality.
    pub content_hash: String,
}

impl Memory {
    /// Create a new memory with a fresh id and timestamps.
    pub fn new(
        owner_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: new_memory_id(),
            owner_id: owner_id.into(),
            content_hash: content_hash(&content),
            content,
            embedding,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Stable SHA-256 hash of memory content, hex encoded.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryEventKind {
    Add,
    Update,
    Delete,
}

impl HistoryEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADD" => Some(Self::Add),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Append-only record of a memory mutation. Never rewritten once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub memory_id: String,
    pub event: HistoryEventKind,
    pub prev_content: Option<String>,
    pub new_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Search
// ─────────────────────────────────────────────────────────────────────────────

/// One semantic search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub memory: Memory,
    /// Cosine similarity to the query, in [-1, 1].
    pub score: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
