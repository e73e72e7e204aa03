//! Graph traversal: related memories, pathfinding, conversation threads.

use rusqlite::Connection;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{GraphError, Result};
use crate::store::{GraphStore, get_memory_node_inner, insert_edge};
use crate::types::{EdgeKind, MemoryNode, MemoryPath, RelatedMemory};

/// Default traversal depth for related-memory queries.
pub const DEFAULT_DEPTH: usize = 2;

/// An undirected adjacency view over the memory↔memory edges.
pub(crate) fn memory_adjacency(
    conn: &Connection,
    kinds: Option<&[EdgeKind]>,
) -> Result<HashMap<String, Vec<(String, EdgeKind)>>> {
    let mut stmt = conn.prepare("SELECT from_id, to_id, kind FROM edges")?;
    let rows = stmt.query_map([], |row| {
        let from: String = row.get(0)?;
        let to: String = row.get(1)?;
        let kind: String = row.get(2)?;
        Ok((from, to, kind))
    })?;

    let mut adjacency: HashMap<String, Vec<(String, EdgeKind)>> = HashMap::new();
    for row in rows {
        let (from, to, kind_str) = row?;
        let Some(kind) = EdgeKind::parse(&kind_str) else {
            continue;
        };
        if !kind.is_memory_relation() {
            continue;
        }
        if let Some(wanted) = kinds {
            if !wanted.contains(&kind) {
                continue;
            }
        }
        adjacency
            .entry(from.clone())
            .or_default()
            .push((to.clone(), kind));
        adjacency.entry(to).or_default().push((from, kind));
    }

    Ok(adjacency)
}

impl GraphStore {
    /// All memory nodes reachable within `depth` hops of `memory_id`.
    ///
    /// Breadth-first over undirected memory relationships; each node is
    /// reported once at its shortest distance, with the edge kinds that
    /// connected it. The origin itself is excluded.
    pub fn get_related_memories(
        &self,
        memory_id: &str,
        depth: usize,
    ) -> Result<Vec<RelatedMemory>> {
        let conn = self.locked()?;
        get_memory_node_inner(&conn, memory_id)?;

        let adjacency = memory_adjacency(&conn, None)?;

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(memory_id.to_string());

        let mut queue: VecDeque<(String, Vec<String>, usize)> = VecDeque::new();
        queue.push_back((memory_id.to_string(), Vec::new(), 0));

        let mut related = Vec::new();
        while let Some((current, path, distance)) = queue.pop_front() {
            if distance >= depth {
                continue;
            }
            let Some(neighbors) = adjacency.get(&current) else {
                continue;
            };
            for (neighbor, kind) in neighbors {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(kind.as_str().to_string());

                if let Ok(node) = get_memory_node_inner(&conn, neighbor) {
                    related.push(RelatedMemory {
                        memory_id: node.id,
                        content: node.content,
                        relationship_path: next_path.clone(),
                        distance: distance + 1,
                    });
                }
                queue.push_back((neighbor.clone(), next_path, distance + 1));
            }
        }

        related.sort_by(|a, b| a.distance.cmp(&b.distance).then(a.memory_id.cmp(&b.memory_id)));
        Ok(related)
    }

    /// Shortest edge-labelled path between two memories, if any.
    pub fn find_path(&self, from_id: &str, to_id: &str) -> Result<Option<MemoryPath>> {
        let conn = self.locked()?;
        get_memory_node_inner(&conn, from_id)?;
        get_memory_node_inner(&conn, to_id)?;

        if from_id == to_id {
            return Ok(Some(MemoryPath {
                memory_ids: vec![from_id.to_string()],
                relationships: Vec::new(),
                path_length: 0,
            }));
        }

        let adjacency = memory_adjacency(&conn, None)?;

        // BFS with parent pointers for path reconstruction.
        let mut parents: HashMap<String, (String, EdgeKind)> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(from_id.to_string());

        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(from_id.to_string());

        let mut found = false;
        'bfs: while let Some(current) = queue.pop_front() {
            let Some(neighbors) = adjacency.get(&current) else {
                continue;
            };
            for (neighbor, kind) in neighbors {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                parents.insert(neighbor.clone(), (current.clone(), *kind));
                if neighbor == to_id {
                    found = true;
                    break 'bfs;
                }
                queue.push_back(neighbor.clone());
            }
        }

        if !found {
            return Ok(None);
        }

        let mut memory_ids = vec![to_id.to_string()];
        let mut relationships = Vec::new();
        let mut cursor = to_id.to_string();
        while let Some((parent, kind)) = parents.get(&cursor) {
            relationships.push(kind.as_str().to_string());
            memory_ids.push(parent.clone());
            cursor = parent.clone();
        }
        memory_ids.reverse();
        relationships.reverse();

        let path_length = relationships.len();
        Ok(Some(MemoryPath {
            memory_ids,
            relationships,
            path_length,
        }))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Conversation Threads
    // ─────────────────────────────────────────────────────────────────────────

    /// Link memories into a conversation thread with sequential
    /// `RESPONDS_TO` edges (each message responds to the previous one).
    pub fn create_conversation_thread(&self, memory_ids: &[String]) -> Result<usize> {
        if memory_ids.len() < 2 {
            return Err(GraphError::InvalidRelationship(
                "a thread needs at least 2 memories".to_string(),
            ));
        }

        let conn = self.locked()?;
        for id in memory_ids {
            get_memory_node_inner(&conn, id)?;
        }

        for pair in memory_ids.windows(2) {
            insert_edge(&conn, &pair[1], &pair[0], EdgeKind::RespondsTo, None)?;
        }

        Ok(memory_ids.len())
    }

    /// The full conversation thread containing a memory, oldest first.
    pub fn get_conversation_thread(&self, memory_id: &str) -> Result<Vec<MemoryNode>> {
        let conn = self.locked()?;
        get_memory_node_inner(&conn, memory_id)?;

        let adjacency = memory_adjacency(&conn, Some(&[EdgeKind::RespondsTo]))?;

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(memory_id.to_string());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(memory_id.to_string());

        while let Some(current) = queue.pop_front() {
            if let Some(neighbors) = adjacency.get(&current) {
                for (neighbor, _) in neighbors {
                    if visited.insert(neighbor.clone()) {
                        queue.push_back(neighbor.clone());
                    }
                }
            }
        }

        let mut nodes = Vec::new();
        for id in &visited {
            nodes.push(get_memory_node_inner(&conn, id)?);
        }
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(nodes)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
