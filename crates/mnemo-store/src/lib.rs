//! Vector-indexed memory storage for Mnemo.
//!
//! One SQLite file holds the memory rows, their embeddings, and the
//! append-only history log. Embeddings are indexed through sqlite-vec when
//! the configured dimensionality permits; above the index family's cap the
//! store falls back to an exact scan — decided once at startup, never at
//! query time.

pub mod error;
pub mod index;
pub mod store;
pub mod types;
pub mod vector;

pub use error::{Result, StoreError};
pub use index::{ANN_DIMENSION_CAP, IndexStrategy};
pub use store::{SharedVectorStore, SqliteMemoryStore, VectorStore};
pub use types::{
    Filters, HistoryEvent, HistoryEventKind, Memory, Metadata, SearchHit, content_hash,
    new_memory_id,
};
