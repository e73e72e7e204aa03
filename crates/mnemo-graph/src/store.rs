//! Graph storage: nodes, edges, and linking operations.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::types::{Component, Decision, Edge, EdgeKind, MemoryNode, new_decision_id};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS memory_nodes (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    obsolete INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_memory_nodes_owner ON memory_nodes(owner_id);

CREATE TABLE IF NOT EXISTS components (
    name TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS decisions (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    pros TEXT NOT NULL DEFAULT '[]',
    cons TEXT NOT NULL DEFAULT '[]',
    alternatives TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    tag TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(from_id, to_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Graph Store
// ─────────────────────────────────────────────────────────────────────────────

/// The relationship graph over memories, components, and decisions.
pub struct GraphStore {
    pub(crate) conn: Mutex<Connection>,
}

impl GraphStore {
    /// Open or create a graph store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        info!(path = %path.as_ref().display(), "graph store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory graph store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn locked(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GraphError::Internal("graph mutex poisoned".to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Memory Nodes
    // ─────────────────────────────────────────────────────────────────────────

    /// Create or refresh the graph mirror of a memory.
    ///
    /// Projection is idempotent: re-projecting an updated memory replaces
    /// its content while preserving edges and the obsolete flag.
    pub fn upsert_memory_node(
        &self,
        id: &str,
        owner_id: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.locked()?;
        conn.execute(
            r#"
            INSERT INTO memory_nodes (id, owner_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET content = excluded.content
            "#,
            params![id, owner_id, content, created_at.to_rfc3339()],
        )?;
        debug!(memory_id = id, "memory node projected");
        Ok(())
    }

    /// Fetch a memory node.
    pub fn get_memory_node(&self, id: &str) -> Result<MemoryNode> {
        let conn = self.locked()?;
        get_memory_node_inner(&conn, id)
    }

    /// Remove a memory node and every edge touching it.
    pub fn delete_memory_node(&self, id: &str) -> Result<bool> {
        let conn = self.locked()?;
        let removed = conn.execute("DELETE FROM memory_nodes WHERE id = ?1", params![id])?;
        conn.execute(
            "DELETE FROM edges WHERE from_id = ?1 OR to_id = ?1",
            params![id],
        )?;
        Ok(removed > 0)
    }

    /// All memory nodes belonging to an owner.
    pub fn list_memory_nodes(&self, owner_id: &str) -> Result<Vec<MemoryNode>> {
        let conn = self.locked()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, content, created_at, obsolete
             FROM memory_nodes WHERE owner_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![owner_id], row_to_memory_node)?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }
        Ok(nodes)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Memory Linking
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a typed relationship between two memories.
    ///
    /// `SUPERSEDES` additionally flags the target obsolete; analyses treat it
    /// as outdated from then on.
    pub fn link_memories(&self, from_id: &str, to_id: &str, kind: EdgeKind) -> Result<Edge> {
        if !kind.is_memory_relation() {
            return Err(GraphError::InvalidRelationship(kind.as_str().to_string()));
        }

        let conn = self.locked()?;
        get_memory_node_inner(&conn, from_id)?;
        get_memory_node_inner(&conn, to_id)?;

        let edge = insert_edge(&conn, from_id, to_id, kind, None)?;

        if kind == EdgeKind::Supersedes {
            conn.execute(
                "UPDATE memory_nodes SET obsolete = 1 WHERE id = ?1",
                params![to_id],
            )?;
        }

        Ok(edge)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Components
    // ─────────────────────────────────────────────────────────────────────────

    /// Create or refresh a component node. Names are unique.
    pub fn create_component(&self, name: &str, kind: &str) -> Result<Component> {
        let conn = self.locked()?;
        let now = Utc::now();
        conn.execute(
            r#"
            INSERT INTO components (name, kind, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET kind = excluded.kind
            "#,
            params![name, kind, now.to_rfc3339()],
        )?;
        get_component_inner(&conn, name)
    }

    /// Fetch a component by name.
    pub fn get_component(&self, name: &str) -> Result<Component> {
        let conn = self.locked()?;
        get_component_inner(&conn, name)
    }

    /// Create a `DEPENDS_ON` edge between two components.
    pub fn link_component_dependency(
        &self,
        from_name: &str,
        to_name: &str,
        tag: Option<&str>,
    ) -> Result<Edge> {
        let conn = self.locked()?;
        get_component_inner(&conn, from_name)?;
        get_component_inner(&conn, to_name)?;
        insert_edge(&conn, from_name, to_name, EdgeKind::DependsOn, tag)
    }

    /// Create a `DESCRIBES` edge from a memory to a component.
    pub fn link_memory_to_component(&self, memory_id: &str, component: &str) -> Result<Edge> {
        let conn = self.locked()?;
        get_memory_node_inner(&conn, memory_id)?;
        get_component_inner(&conn, component)?;
        insert_edge(&conn, memory_id, component, EdgeKind::Describes, None)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decisions
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a decision node with structured rationale. Returns its id.
    pub fn create_decision(
        &self,
        text: &str,
        owner_id: &str,
        pros: Vec<String>,
        cons: Vec<String>,
        alternatives: Vec<String>,
    ) -> Result<Decision> {
        let conn = self.locked()?;
        let decision = Decision {
            id: new_decision_id(),
            text: text.to_string(),
            owner_id: owner_id.to_string(),
            pros,
            cons,
            alternatives,
            created_at: Utc::now(),
        };

        conn.execute(
            r#"
            INSERT INTO decisions (id, text, owner_id, pros, cons, alternatives, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                decision.id,
                decision.text,
                decision.owner_id,
                serde_json::to_string(&decision.pros)?,
                serde_json::to_string(&decision.cons)?,
                serde_json::to_string(&decision.alternatives)?,
                decision.created_at.to_rfc3339(),
            ],
        )?;

        debug!(decision_id = %decision.id, "decision created");
        Ok(decision)
    }

    /// Fetch a decision node.
    pub fn get_decision(&self, id: &str) -> Result<Decision> {
        let conn = self.locked()?;
        get_decision_inner(&conn, id)
    }

    /// Create a `JUSTIFIES` edge from a decision to a memory.
    pub fn link_decision_to_memory(&self, decision_id: &str, memory_id: &str) -> Result<Edge> {
        let conn = self.locked()?;
        get_decision_inner(&conn, decision_id)?;
        get_memory_node_inner(&conn, memory_id)?;
        insert_edge(&conn, decision_id, memory_id, EdgeKind::Justifies, None)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stats & Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Administrative full wipe of nodes and edges.
    pub fn reset(&self) -> Result<()> {
        let conn = self.locked()?;
        conn.execute("DELETE FROM edges", [])?;
        conn.execute("DELETE FROM memory_nodes", [])?;
        conn.execute("DELETE FROM components", [])?;
        conn.execute("DELETE FROM decisions", [])?;
        info!("graph store reset");
        Ok(())
    }

    /// Node and edge counts, for health reporting.
    pub fn stats(&self) -> Result<(usize, usize)> {
        let conn = self.locked()?;
        let nodes: i64 = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM memory_nodes)
                  + (SELECT COUNT(*) FROM components)
                  + (SELECT COUNT(*) FROM decisions)",
            [],
            |row| row.get(0),
        )?;
        let edges: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok((nodes as usize, edges as usize))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn get_memory_node_inner(conn: &Connection, id: &str) -> Result<MemoryNode> {
    conn.query_row(
        "SELECT id, owner_id, content, created_at, obsolete FROM memory_nodes WHERE id = ?1",
        params![id],
        row_to_memory_node,
    )
    .optional()?
    .ok_or_else(|| GraphError::NodeNotFound {
        kind: "memory",
        id: id.to_string(),
    })
}

pub(crate) fn get_component_inner(conn: &Connection, name: &str) -> Result<Component> {
    conn.query_row(
        "SELECT name, kind, created_at FROM components WHERE name = ?1",
        params![name],
        |row| {
            let created_at: String = row.get(2)?;
            Ok(Component {
                name: row.get(0)?,
                kind: row.get(1)?,
                created_at: parse_timestamp(&created_at),
            })
        },
    )
    .optional()?
    .ok_or_else(|| GraphError::NodeNotFound {
        kind: "component",
        id: name.to_string(),
    })
}

pub(crate) fn get_decision_inner(conn: &Connection, id: &str) -> Result<Decision> {
    conn.query_row(
        "SELECT id, text, owner_id, pros, cons, alternatives, created_at
         FROM decisions WHERE id = ?1",
        params![id],
        |row| {
            let pros: String = row.get(3)?;
            let cons: String = row.get(4)?;
            let alternatives: String = row.get(5)?;
            let created_at: String = row.get(6)?;
            Ok(Decision {
                id: row.get(0)?,
                text: row.get(1)?,
                owner_id: row.get(2)?,
                pros: serde_json::from_str(&pros).unwrap_or_default(),
                cons: serde_json::from_str(&cons).unwrap_or_default(),
                alternatives: serde_json::from_str(&alternatives).unwrap_or_default(),
                created_at: parse_timestamp(&created_at),
            })
        },
    )
    .optional()?
    .ok_or_else(|| GraphError::NodeNotFound {
        kind: "decision",
        id: id.to_string(),
    })
}

pub(crate) fn insert_edge(
    conn: &Connection,
    from_id: &str,
    to_id: &str,
    kind: EdgeKind,
    tag: Option<&str>,
) -> Result<Edge> {
    let now = Utc::now();
    conn.execute(
        r#"
        INSERT INTO edges (from_id, to_id, kind, tag, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(from_id, to_id, kind) DO UPDATE SET tag = excluded.tag
        "#,
        params![from_id, to_id, kind.as_str(), tag, now.to_rfc3339()],
    )?;

    Ok(Edge {
        from_id: from_id.to_string(),
        to_id: to_id.to_string(),
        kind,
        tag: tag.map(str::to_string),
        created_at: now,
    })
}

pub(crate) fn row_to_memory_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryNode> {
    let created_at: String = row.get(3)?;
    let obsolete: i64 = row.get(4)?;
    Ok(MemoryNode {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        content: row.get(2)?,
        created_at: parse_timestamp(&created_at),
        obsolete: obsolete != 0,
    })
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_memories(ids: &[&str]) -> GraphStore {
        let graph = GraphStore::open_in_memory().unwrap();
        for id in ids {
            graph
                .upsert_memory_node(id, "alice", &format!("content of {id}"), Utc::now())
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let graph = graph_with_memories(&["m1"]);
        graph
            .upsert_memory_node("m1", "alice", "updated content", Utc::now())
            .unwrap();

        let node = graph.get_memory_node("m1").unwrap();
        assert_eq!(node.content, "updated content");
        assert_eq!(graph.stats().unwrap().0, 1);
    }

    #[test]
    fn test_link_memories_creates_edge() {
        let graph = graph_with_memories(&["m1", "m2"]);
        let edge = graph
            .link_memories("m1", "m2", EdgeKind::RelatesTo)
            .unwrap();
        assert_eq!(edge.kind, EdgeKind::RelatesTo);
        assert_eq!(graph.stats().unwrap().1, 1);
    }

    #[test]
    fn test_link_memories_requires_nodes() {
        let graph = graph_with_memories(&["m1"]);
        let err = graph
            .link_memories("m1", "ghost", EdgeKind::RelatesTo)
            .unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound { .. }));
    }

    #[test]
    fn test_link_memories_rejects_non_memory_kinds() {
        let graph = graph_with_memories(&["m1", "m2"]);
        let err = graph
            .link_memories("m1", "m2", EdgeKind::Describes)
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidRelationship(_)));
    }

    #[test]
    fn test_supersedes_flags_target_obsolete() {
        let graph = graph_with_memories(&["new", "old"]);
        graph
            .link_memories("new", "old", EdgeKind::Supersedes)
            .unwrap();

        assert!(graph.get_memory_node("old").unwrap().obsolete);
        assert!(!graph.get_memory_node("new").unwrap().obsolete);
    }

    #[test]
    fn test_component_upsert_unique_name() {
        let graph = GraphStore::open_in_memory().unwrap();
        graph.create_component("Auth Service", "Service").unwrap();
        graph
            .create_component("Auth Service", "Infrastructure")
            .unwrap();

        let component = graph.get_component("Auth Service").unwrap();
        assert_eq!(component.kind, "Infrastructure");
        assert_eq!(graph.stats().unwrap().0, 1);
    }

    #[test]
    fn test_component_dependency_with_tag() {
        let graph = GraphStore::open_in_memory().unwrap();
        graph.create_component("API", "Service").unwrap();
        graph.create_component("Database", "Infrastructure").unwrap();

        let edge = graph
            .link_component_dependency("API", "Database", Some("reads"))
            .unwrap();
        assert_eq!(edge.kind, EdgeKind::DependsOn);
        assert_eq!(edge.tag.as_deref(), Some("reads"));
    }

    #[test]
    fn test_decision_round_trip() {
        let graph = GraphStore::open_in_memory().unwrap();
        let decision = graph
            .create_decision(
                "Use PostgreSQL as primary database",
                "alice",
                vec!["ACID compliance".into(), "pgvector support".into()],
                vec!["Scaling complexity".into()],
                vec!["MongoDB".into(), "MySQL".into()],
            )
            .unwrap();

        let fetched = graph.get_decision(&decision.id).unwrap();
        assert_eq!(fetched.text, "Use PostgreSQL as primary database");
        assert_eq!(fetched.pros.len(), 2);
        assert_eq!(fetched.cons.len(), 1);
        assert_eq!(fetched.alternatives, vec!["MongoDB", "MySQL"]);
    }

    #[test]
    fn test_delete_memory_node_removes_edges() {
        let graph = graph_with_memories(&["m1", "m2"]);
        graph
            .link_memories("m1", "m2", EdgeKind::RelatesTo)
            .unwrap();

        assert!(graph.delete_memory_node("m1").unwrap());
        assert_eq!(graph.stats().unwrap().1, 0);
        assert!(graph.get_memory_node("m1").is_err());
    }

    #[test]
    fn test_duplicate_edge_is_merged() {
        let graph = graph_with_memories(&["m1", "m2"]);
        graph
            .link_memories("m1", "m2", EdgeKind::RelatesTo)
            .unwrap();
        graph
            .link_memories("m1", "m2", EdgeKind::RelatesTo)
            .unwrap();
        assert_eq!(graph.stats().unwrap().1, 1);
    }
}
