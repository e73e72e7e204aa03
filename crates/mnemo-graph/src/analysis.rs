//! Graph analyses: evolution, supersession, impact, communities, trust,
//! and the intelligence report.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::error::Result;
use crate::store::{GraphStore, get_component_inner, get_memory_node_inner};
use crate::traverse::memory_adjacency;
use crate::types::{
    CentralMemory, Communities, CommunityMember, ConflictEdge, DescribingMemory, DecisionRationale,
    EdgeKind, EvolutionEntry, ImpactAnalysis, ImpactedComponent, IntelligenceInsights,
    IntelligenceReport, IntelligenceSummary, SupersededPair, SupersededRef, TrustScore,
    TrustWeights,
};

/// Edge kinds that bind memories into topical communities.
const COMMUNITY_KINDS: &[EdgeKind] = &[EdgeKind::RelatesTo, EdgeKind::Extends, EdgeKind::RespondsTo];

/// Half-life of the trust recency term, in days.
const TRUST_HALF_LIFE_DAYS: f64 = 90.0;

/// Citation count at which the citation term saturates.
const TRUST_CITATION_CAP: usize = 5;

impl GraphStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Evolution & Supersession
    // ─────────────────────────────────────────────────────────────────────────

    /// Memories tracking how knowledge about `topic` evolved over time.
    ///
    /// Matches nodes whose content contains `topic` (case-insensitive), plus
    /// nodes reached from a match via `EXTENDS` or `SUPERSEDES`; ordered by
    /// creation time.
    pub fn get_memory_evolution(
        &self,
        topic: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<EvolutionEntry>> {
        let conn = self.locked()?;

        let needle = topic.to_lowercase();
        let mut stmt =
            conn.prepare("SELECT id, content, created_at FROM memory_nodes")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let content: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            Ok((id, content, created_at))
        })?;

        let mut matched: HashSet<String> = HashSet::new();
        for row in rows {
            let (id, content, _) = row?;
            if content.to_lowercase().contains(&needle) {
                matched.insert(id);
            }
        }

        // Pull in nodes the matches extend or supersede toward.
        let mut stmt = conn.prepare(
            "SELECT from_id, to_id FROM edges WHERE kind IN ('EXTENDS','SUPERSEDES')",
        )?;
        let edge_rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        for (from, to) in &edge_rows {
            if matched.contains(from) {
                matched.insert(to.clone());
            }
        }

        let mut entries = Vec::new();
        for id in &matched {
            let node = get_memory_node_inner(&conn, id)?;
            if let Some(since) = since {
                if node.created_at < since {
                    continue;
                }
            }
            if let Some(until) = until {
                if node.created_at > until {
                    continue;
                }
            }

            let superseded = superseded_target(&conn, id)?;
            entries.push(EvolutionEntry {
                memory_id: node.id,
                content: node.content,
                created_at: node.created_at,
                superseded,
            });
        }

        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.memory_id.cmp(&b.memory_id)));
        Ok(entries)
    }

    /// All of an owner's memories that another owned memory supersedes.
    pub fn find_superseded_memories(&self, owner_id: &str) -> Result<Vec<SupersededPair>> {
        let conn = self.locked()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT e.from_id, e.to_id
            FROM edges e
            JOIN memory_nodes cur ON cur.id = e.from_id
            JOIN memory_nodes old ON old.id = e.to_id
            WHERE e.kind = 'SUPERSEDES'
              AND old.owner_id = ?1
              AND cur.owner_id = ?1
            ORDER BY cur.created_at DESC
            "#,
        )?;
        let pairs: Vec<(String, String)> = stmt
            .query_map(params![owner_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let mut results = Vec::new();
        for (current_id, obsolete_id) in pairs {
            results.push(SupersededPair {
                current_memory: get_memory_node_inner(&conn, &current_id)?,
                obsolete_memory: get_memory_node_inner(&conn, &obsolete_id)?,
            });
        }
        Ok(results)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Impact Analysis
    // ─────────────────────────────────────────────────────────────────────────

    /// What breaks if `component` changes: the transitive set of components
    /// that depend on it (reversed `DEPENDS_ON`), each with the number of
    /// memories describing it, plus the memories describing the component
    /// itself.
    pub fn get_impact_analysis(&self, component: &str) -> Result<ImpactAnalysis> {
        let conn = self.locked()?;
        get_component_inner(&conn, component)?;

        // dependent -> dependency edges, reversed for upstream traversal.
        let mut stmt = conn.prepare("SELECT from_id, to_id FROM edges WHERE kind = 'DEPENDS_ON'")?;
        let edges: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, to) in &edges {
            reverse.entry(to.as_str()).or_default().push(from.as_str());
        }

        let mut dependents: Vec<String> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(component);
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(component);

        while let Some(current) = queue.pop_front() {
            if let Some(upstream) = reverse.get(current) {
                for &dep in upstream {
                    if visited.insert(dep) {
                        dependents.push(dep.to_string());
                        queue.push_back(dep);
                    }
                }
            }
        }
        dependents.sort();

        let mut impacted = Vec::with_capacity(dependents.len());
        let mut cascade_memories = 0usize;
        for name in &dependents {
            let count = describing_count(&conn, name)?;
            cascade_memories += count;
            impacted.push(ImpactedComponent {
                name: name.clone(),
                describing_memories: count,
            });
        }

        let describing_memories = describing_memories(&conn, component)?;
        let impact_score = impacted.len() + cascade_memories;

        Ok(ImpactAnalysis {
            component: component.to_string(),
            dependents: impacted,
            describing_memories,
            impact_score,
        })
    }

    /// Full rationale for a decision: the node plus its justifying memories.
    pub fn get_decision_rationale(&self, decision_id: &str) -> Result<DecisionRationale> {
        let conn = self.locked()?;
        let decision = crate::store::get_decision_inner(&conn, decision_id)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT m.id, m.content
            FROM edges e
            JOIN memory_nodes m ON m.id = e.to_id
            WHERE e.kind = 'JUSTIFIES' AND e.from_id = ?1
            ORDER BY m.created_at ASC
            "#,
        )?;
        let justified_by: Vec<DescribingMemory> = stmt
            .query_map(params![decision_id], |row| {
                Ok(DescribingMemory {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;

        Ok(DecisionRationale {
            decision,
            justified_by,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Communities
    // ─────────────────────────────────────────────────────────────────────────

    /// Partition an owner's memory subgraph into clusters by label
    /// propagation.
    ///
    /// Deterministic: nodes are processed in id order, each adopts the most
    /// frequent label among its neighbors, and frequency ties break toward
    /// the smallest label. Isolated nodes are excluded.
    pub fn detect_memory_communities(&self, owner_id: &str) -> Result<Communities> {
        let conn = self.locked()?;

        let owned: HashSet<String> = self
            .owned_ids(&conn, owner_id)?
            .into_iter()
            .collect();
        let adjacency = memory_adjacency(&conn, Some(COMMUNITY_KINDS))?;

        // Nodes with at least one in-scope connection, in deterministic order.
        let mut nodes: Vec<String> = owned
            .iter()
            .filter(|id| {
                adjacency
                    .get(*id)
                    .map(|n| n.iter().any(|(other, _)| owned.contains(other)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        nodes.sort();

        let mut labels: HashMap<String, String> =
            nodes.iter().map(|id| (id.clone(), id.clone())).collect();

        // Label propagation to fixpoint, bounded.
        for _ in 0..32 {
            let mut changed = false;
            for node in &nodes {
                let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
                if let Some(neighbors) = adjacency.get(node) {
                    for (neighbor, _) in neighbors {
                        if let Some(label) = labels.get(neighbor) {
                            *frequency.entry(label.as_str()).or_default() += 1;
                        }
                    }
                }
                if frequency.is_empty() {
                    continue;
                }
                // Highest count wins; BTreeMap iteration order makes the
                // smallest label win ties.
                let best = frequency
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                    .map(|(label, _)| label.to_string())
                    .unwrap_or_else(|| node.clone());
                if labels.get(node) != Some(&best) {
                    labels.insert(node.clone(), best);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut communities: Communities = BTreeMap::new();
        for node in &nodes {
            let label = labels.get(node).cloned().unwrap_or_else(|| node.clone());
            let info = get_memory_node_inner(&conn, node)?;
            let connections = adjacency
                .get(node)
                .map(|n| n.iter().filter(|(other, _)| owned.contains(other)).count())
                .unwrap_or(0);
            communities.entry(label).or_default().push(CommunityMember {
                memory_id: info.id,
                content: info.content,
                connections,
            });
        }

        for members in communities.values_mut() {
            members.sort_by(|a, b| {
                b.connections
                    .cmp(&a.connections)
                    .then(a.memory_id.cmp(&b.memory_id))
            });
        }

        Ok(communities)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Trust Score
    // ─────────────────────────────────────────────────────────────────────────

    /// Trust score for one memory, in [0, 1].
    ///
    /// Formula (deterministic for a given `now`):
    ///
    /// ```text
    /// citation_term = min(inbound RESPONDS_TO/EXTENDS edges, 5) / 5
    /// recency_term  = 0.5 ^ (age_days / 90)
    /// score = clamp(w_citation * citation_term
    ///             + w_recency  * recency_term
    ///             - w_conflict * conflicts, 0, 1)
    /// ```
    ///
    /// Weights come from [`TrustWeights`]; `conflicts` counts
    /// `CONFLICTS_WITH` edges touching the memory in either direction.
    pub fn calculate_trust_score(
        &self,
        memory_id: &str,
        weights: &TrustWeights,
        now: DateTime<Utc>,
    ) -> Result<TrustScore> {
        let conn = self.locked()?;
        let node = get_memory_node_inner(&conn, memory_id)?;

        let citations: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges
             WHERE to_id = ?1 AND kind IN ('RESPONDS_TO','EXTENDS')",
            params![memory_id],
            |row| row.get(0),
        )?;
        let conflicts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges
             WHERE kind = 'CONFLICTS_WITH' AND (from_id = ?1 OR to_id = ?1)",
            params![memory_id],
            |row| row.get(0),
        )?;

        let citations = citations as usize;
        let conflicts = conflicts as usize;
        let age_days = (now - node.created_at).num_days().max(0);

        let citation_term = citations.min(TRUST_CITATION_CAP) as f64 / TRUST_CITATION_CAP as f64;
        let recency_term = 0.5f64.powf(age_days as f64 / TRUST_HALF_LIFE_DAYS);

        let raw = weights.citation * citation_term + weights.recency * recency_term
            - weights.conflict_penalty * conflicts as f64;
        let score = raw.clamp(0.0, 1.0);

        Ok(TrustScore {
            memory_id: memory_id.to_string(),
            score,
            citations,
            conflicts,
            age_days,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Intelligence Report
    // ─────────────────────────────────────────────────────────────────────────

    /// Comprehensive report over an owner's memory graph.
    ///
    /// `knowledge_health_score` is in [0, 10] and deterministic:
    ///
    /// ```text
    /// score = 10 * ( 0.30 * (1 - isolated/total)
    ///              + 0.25 * (1 - obsolete/total)
    ///              + 0.25 * (1 - conflicted/total)
    ///              + 0.20 * min(avg_connections / 4, 1) )
    /// ```
    ///
    /// where `conflicted` is the number of distinct owned memories touching a
    /// `CONFLICTS_WITH` edge and an empty graph scores 10.
    pub fn analyze_memory_intelligence(&self, owner_id: &str) -> Result<IntelligenceReport> {
        let (total, avg_connections, isolated, obsolete, conflicts, central) = {
            let conn = self.locked()?;

            let owned = self.owned_ids(&conn, owner_id)?;
            let owned_set: HashSet<&String> = owned.iter().collect();
            let adjacency = memory_adjacency(&conn, None)?;

            let degree = |id: &String| -> usize {
                adjacency
                    .get(id)
                    .map(|n| n.iter().filter(|(other, _)| owned_set.contains(other)).count())
                    .unwrap_or(0)
            };

            let total = owned.len();
            let total_degree: usize = owned.iter().map(degree).sum();
            let avg_connections = if total > 0 {
                total_degree as f64 / total as f64
            } else {
                0.0
            };
            let isolated = owned.iter().filter(|id| degree(id) == 0).count();

            let obsolete: i64 = conn.query_row(
                "SELECT COUNT(*) FROM memory_nodes WHERE owner_id = ?1 AND obsolete = 1",
                params![owner_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                r#"
                SELECT e.from_id, e.to_id
                FROM edges e
                JOIN memory_nodes a ON a.id = e.from_id
                JOIN memory_nodes b ON b.id = e.to_id
                WHERE e.kind = 'CONFLICTS_WITH' AND a.owner_id = ?1 AND b.owner_id = ?1
                "#,
            )?;
            let conflicts: Vec<ConflictEdge> = stmt
                .query_map(params![owner_id], |row| {
                    Ok(ConflictEdge {
                        from_id: row.get(0)?,
                        to_id: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<_, _>>()?;

            let mut central: Vec<CentralMemory> = Vec::new();
            for id in &owned {
                let connections = degree(id);
                if connections == 0 {
                    continue;
                }
                let node = get_memory_node_inner(&conn, id)?;
                central.push(CentralMemory {
                    memory_id: node.id,
                    content: node.content,
                    connections,
                });
            }
            central.sort_by(|a, b| {
                b.connections
                    .cmp(&a.connections)
                    .then(a.memory_id.cmp(&b.memory_id))
            });
            central.truncate(10);

            (
                total,
                avg_connections,
                isolated,
                obsolete as usize,
                conflicts,
                central,
            )
        };

        let communities = self.detect_memory_communities(owner_id)?;
        let clusters: BTreeMap<String, usize> = communities
            .iter()
            .map(|(label, members)| (label.clone(), members.len()))
            .collect();

        let conflicted_nodes: HashSet<&str> = conflicts
            .iter()
            .flat_map(|c| [c.from_id.as_str(), c.to_id.as_str()])
            .collect();

        let health_score = if total == 0 {
            10.0
        } else {
            let total_f = total as f64;
            let isolation_ratio = isolated as f64 / total_f;
            let obsolete_ratio = obsolete as f64 / total_f;
            let conflict_ratio = conflicted_nodes.len() as f64 / total_f;
            let connectivity = (avg_connections / 4.0).min(1.0);

            (10.0
                * (0.30 * (1.0 - isolation_ratio)
                    + 0.25 * (1.0 - obsolete_ratio)
                    + 0.25 * (1.0 - conflict_ratio)
                    + 0.20 * connectivity))
                .clamp(0.0, 10.0)
        };

        let recommendations =
            build_recommendations(isolated, obsolete, conflicts.len(), health_score);

        Ok(IntelligenceReport {
            summary: IntelligenceSummary {
                total_memories: total,
                avg_connections: (avg_connections * 100.0).round() / 100.0,
                isolated_memories: isolated,
                obsolete_memories: obsolete,
                knowledge_health_score: (health_score * 10.0).round() / 10.0,
            },
            insights: IntelligenceInsights {
                conflicting_knowledge: conflicts,
                clusters,
                central_memories: central,
            },
            recommendations,
        })
    }

    fn owned_ids(&self, conn: &Connection, owner_id: &str) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT id FROM memory_nodes WHERE owner_id = ?1 ORDER BY id")?;
        let ids: Vec<String> = stmt
            .query_map(params![owner_id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(ids)
    }
}

fn superseded_target(conn: &Connection, id: &str) -> Result<Option<SupersededRef>> {
    use rusqlite::OptionalExtension;
    let target = conn
        .query_row(
            r#"
            SELECT m.id, m.content
            FROM edges e
            JOIN memory_nodes m ON m.id = e.to_id
            WHERE e.kind = 'SUPERSEDES' AND e.from_id = ?1
            LIMIT 1
            "#,
            params![id],
            |row| {
                Ok(SupersededRef {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(target)
}

fn describing_count(conn: &Connection, component: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM edges WHERE kind = 'DESCRIBES' AND to_id = ?1",
        params![component],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn describing_memories(conn: &Connection, component: &str) -> Result<Vec<DescribingMemory>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT m.id, m.content
        FROM edges e
        JOIN memory_nodes m ON m.id = e.from_id
        WHERE e.kind = 'DESCRIBES' AND e.to_id = ?1
        ORDER BY m.created_at ASC
        "#,
    )?;
    let memories: Vec<DescribingMemory> = stmt
        .query_map(params![component], |row| {
            Ok(DescribingMemory {
                id: row.get(0)?,
                content: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<_, _>>()?;
    Ok(memories)
}

fn build_recommendations(
    isolated: usize,
    obsolete: usize,
    conflicts: usize,
    health_score: f64,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if isolated > 5 {
        recommendations.push(format!(
            "Link {isolated} isolated memories to related knowledge for better context"
        ));
    }
    if obsolete > 3 {
        recommendations.push(format!("Archive or update {obsolete} obsolete memories"));
    }
    if conflicts > 0 {
        recommendations.push(format!(
            "Resolve {conflicts} conflicting relationships to maintain knowledge consistency"
        ));
    }
    if health_score < 5.0 {
        recommendations.push(
            "Knowledge graph health is low - consider adding more connections between related memories"
                .to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations
            .push("Memory graph is healthy! Continue building interconnected knowledge".to_string());
    }

    recommendations
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn graph_with(owner: &str, ids: &[&str]) -> GraphStore {
        let graph = GraphStore::open_in_memory().unwrap();
        let base = Utc::now() - Duration::days(10);
        for (i, id) in ids.iter().enumerate() {
            graph
                .upsert_memory_node(
                    id,
                    owner,
                    &format!("note about {id}"),
                    base + Duration::seconds(i as i64),
                )
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_evolution_matches_topic_and_links() {
        let graph = GraphStore::open_in_memory().unwrap();
        let base = Utc::now() - Duration::days(5);
        graph
            .upsert_memory_node("m1", "alice", "React class components everywhere", base)
            .unwrap();
        graph
            .upsert_memory_node(
                "m2",
                "alice",
                "Hooks are the way now",
                base + Duration::days(1),
            )
            .unwrap();
        graph
            .upsert_memory_node("m3", "alice", "Unrelated database note", base)
            .unwrap();
        graph.link_memories("m1", "m2", EdgeKind::Extends).unwrap();

        let entries = graph.get_memory_evolution("react", None, None).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.memory_id.as_str()).collect();
        // m1 matches by substring, m2 is reached via EXTENDS.
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn test_evolution_time_window() {
        let graph = GraphStore::open_in_memory().unwrap();
        let old = Utc::now() - Duration::days(30);
        let recent = Utc::now() - Duration::days(1);
        graph
            .upsert_memory_node("m1", "alice", "rust memory note", old)
            .unwrap();
        graph
            .upsert_memory_node("m2", "alice", "rust async note", recent)
            .unwrap();

        let entries = graph
            .get_memory_evolution("rust", Some(Utc::now() - Duration::days(7)), None)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].memory_id, "m2");
    }

    #[test]
    fn test_superseded_pairs_scoped_to_owner() {
        let graph = graph_with("alice", &["new", "old"]);
        graph
            .upsert_memory_node("other", "bob", "bob's note", Utc::now())
            .unwrap();
        graph
            .link_memories("new", "old", EdgeKind::Supersedes)
            .unwrap();

        let pairs = graph.find_superseded_memories("alice").unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].obsolete_memory.id, "old");
        assert_eq!(pairs[0].current_memory.id, "new");

        assert!(graph.find_superseded_memories("bob").unwrap().is_empty());
    }

    #[test]
    fn test_impact_analysis_transitive() {
        let graph = graph_with("alice", &["m1", "m2"]);
        graph.create_component("Database", "Infrastructure").unwrap();
        graph.create_component("API", "Service").unwrap();
        graph.create_component("Frontend", "Service").unwrap();
        graph
            .link_component_dependency("API", "Database", None)
            .unwrap();
        graph
            .link_component_dependency("Frontend", "API", None)
            .unwrap();
        graph.link_memory_to_component("m1", "Database").unwrap();
        graph.link_memory_to_component("m2", "API").unwrap();

        let impact = graph.get_impact_analysis("Database").unwrap();
        let names: Vec<_> = impact.dependents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["API", "Frontend"]);
        assert_eq!(impact.describing_memories.len(), 1);
        assert_eq!(impact.describing_memories[0].id, "m1");
        // 2 dependents + 1 memory describing API
        assert_eq!(impact.impact_score, 3);
    }

    #[test]
    fn test_decision_rationale_includes_justifying_memories() {
        let graph = graph_with("alice", &["m1"]);
        let decision = graph
            .create_decision("Adopt sqlite", "alice", vec![], vec![], vec![])
            .unwrap();
        graph.link_decision_to_memory(&decision.id, "m1").unwrap();

        let rationale = graph.get_decision_rationale(&decision.id).unwrap();
        assert_eq!(rationale.decision.id, decision.id);
        assert_eq!(rationale.justified_by.len(), 1);
        assert_eq!(rationale.justified_by[0].id, "m1");
    }

    #[test]
    fn test_communities_partition_components() {
        let graph = graph_with("alice", &["a1", "a2", "b1", "b2", "lonely"]);
        graph.link_memories("a1", "a2", EdgeKind::RelatesTo).unwrap();
        graph.link_memories("b1", "b2", EdgeKind::Extends).unwrap();

        let communities = graph.detect_memory_communities("alice").unwrap();
        assert_eq!(communities.len(), 2);

        let mut all: Vec<_> = communities
            .values()
            .flat_map(|members| members.iter().map(|m| m.memory_id.clone()))
            .collect();
        all.sort();
        assert_eq!(all, vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn test_communities_deterministic() {
        let build = || {
            let graph = graph_with("alice", &["a1", "a2", "a3"]);
            graph.link_memories("a1", "a2", EdgeKind::RelatesTo).unwrap();
            graph.link_memories("a2", "a3", EdgeKind::RelatesTo).unwrap();
            graph.detect_memory_communities("alice").unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_trust_score_citations_and_conflicts() {
        let graph = graph_with("alice", &["target", "citer", "enemy"]);
        graph
            .link_memories("citer", "target", EdgeKind::RespondsTo)
            .unwrap();

        let weights = TrustWeights::default();
        let now = Utc::now();

        let score = graph
            .calculate_trust_score("target", &weights, now)
            .unwrap();
        assert_eq!(score.citations, 1);
        assert_eq!(score.conflicts, 0);
        assert!(score.score > 0.0 && score.score <= 1.0);

        graph
            .link_memories("enemy", "target", EdgeKind::ConflictsWith)
            .unwrap();
        let conflicted = graph
            .calculate_trust_score("target", &weights, now)
            .unwrap();
        assert_eq!(conflicted.conflicts, 1);
        assert!(conflicted.score < score.score);
    }

    #[test]
    fn test_trust_score_deterministic_and_decaying() {
        let graph = graph_with("alice", &["m1"]);
        let weights = TrustWeights::default();
        let now = Utc::now();

        let a = graph.calculate_trust_score("m1", &weights, now).unwrap();
        let b = graph.calculate_trust_score("m1", &weights, now).unwrap();
        assert_eq!(a.score, b.score);

        let later = graph
            .calculate_trust_score("m1", &weights, now + Duration::days(365))
            .unwrap();
        assert!(later.score < a.score);
    }

    #[test]
    fn test_intelligence_report_shape() {
        let graph = graph_with("alice", &["m1", "m2", "m3"]);
        graph.link_memories("m1", "m2", EdgeKind::RelatesTo).unwrap();
        graph
            .link_memories("m1", "m3", EdgeKind::ConflictsWith)
            .unwrap();

        let report = graph.analyze_memory_intelligence("alice").unwrap();
        assert_eq!(report.summary.total_memories, 3);
        assert_eq!(report.summary.isolated_memories, 0);
        assert_eq!(report.insights.conflicting_knowledge.len(), 1);
        assert!(!report.recommendations.is_empty());
        assert!(report.summary.knowledge_health_score >= 0.0);
        assert!(report.summary.knowledge_health_score <= 10.0);
        assert!(!report.insights.central_memories.is_empty());
    }

    #[test]
    fn test_intelligence_report_deterministic() {
        let graph = graph_with("alice", &["m1", "m2"]);
        graph.link_memories("m1", "m2", EdgeKind::RelatesTo).unwrap();

        let a = graph.analyze_memory_intelligence("alice").unwrap();
        let b = graph.analyze_memory_intelligence("alice").unwrap();
        assert_eq!(
            a.summary.knowledge_health_score,
            b.summary.knowledge_health_score
        );
        assert_eq!(a.insights.clusters, b.insights.clusters);
    }

    #[test]
    fn test_empty_graph_scores_ten() {
        let graph = GraphStore::open_in_memory().unwrap();
        let report = graph.analyze_memory_intelligence("nobody").unwrap();
        assert_eq!(report.summary.total_memories, 0);
        assert_eq!(report.summary.knowledge_health_score, 10.0);
    }
}
