//! Background graph projection with bounded retry.
//!
//! Every successful memory insert schedules a projection job: mirror the
//! memory as a graph node and attach it to any components or decisions its
//! metadata references. Jobs run on a small worker pool fed by an in-memory
//! queue; each job retries with exponential backoff and, after the budget is
//! exhausted, logs the failure and gives up. The memory itself stays fully
//! readable through vector search either way.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use mnemo_graph::GraphStore;
use mnemo_store::Metadata;

/// Maximum projection attempts per job.
pub const MAX_ATTEMPTS: u32 = 7;

/// One unit of projection work.
#[derive(Debug, Clone)]
pub struct ProjectionJob {
    pub memory_id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
}

/// Backoff before retry `attempt` (1-based): 1s, 2s, 4s, 8s, 16s, 32s.
///
/// A pure function of the attempt count so the schedule is testable without
/// a clock.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt - 1).min(5))
}

/// Where projection jobs land. The production sink is the graph store;
/// tests substitute failure-injecting stubs.
pub trait GraphSink: Send + Sync {
    fn project(&self, job: &ProjectionJob) -> std::result::Result<(), String>;
}

impl GraphSink for GraphStore {
    fn project(&self, job: &ProjectionJob) -> std::result::Result<(), String> {
        self.upsert_memory_node(&job.memory_id, &job.owner_id, &job.content, job.created_at)
            .map_err(|e| e.to_string())?;

        // Attach to components and decisions referenced in metadata.
        for name in string_list(&job.metadata, "components") {
            if let Err(e) = self.link_memory_to_component(&job.memory_id, &name) {
                warn!(memory_id = %job.memory_id, component = %name, error = %e,
                      "could not attach memory to component");
            }
        }
        for decision_id in string_list(&job.metadata, "decisions") {
            if let Err(e) = self.link_decision_to_memory(&decision_id, &job.memory_id) {
                warn!(memory_id = %job.memory_id, decision = %decision_id, error = %e,
                      "could not attach memory to decision");
            }
        }

        Ok(())
    }
}

fn string_list(metadata: &Metadata, key: &str) -> Vec<String> {
    match metadata.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker Pool
// ─────────────────────────────────────────────────────────────────────────────

/// Handle for enqueueing projection jobs.
#[derive(Clone)]
pub struct Projector {
    tx: mpsc::Sender<ProjectionJob>,
}

impl Projector {
    /// Spawn `workers` background tasks draining a shared queue into `sink`.
    ///
    /// Worker lifecycle is bound to the handle: when every clone is dropped
    /// the queue closes and workers exit after draining.
    pub fn spawn(sink: Arc<dyn GraphSink>, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<ProjectionJob>(256);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for worker_id in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    run_with_retry(sink.as_ref(), &job, MAX_ATTEMPTS).await;
                }
                tracing::debug!(worker_id, "projection worker stopped");
            });
        }

        Self { tx }
    }

    /// Enqueue a job. Never blocks the request path; a full queue is logged
    /// and the job dropped (re-projection stays available via `/graph/sync`).
    pub fn enqueue(&self, job: ProjectionJob) {
        if let Err(e) = self.tx.try_send(job) {
            error!(error = %e, "projection queue full, dropping job");
        }
    }
}

/// Run one job through the retry budget.
pub async fn run_with_retry(sink: &dyn GraphSink, job: &ProjectionJob, max_attempts: u32) {
    for attempt in 1..=max_attempts {
        match sink.project(job) {
            Ok(()) => {
                info!(
                    memory_id = %job.memory_id,
                    attempt,
                    "memory projected to graph"
                );
                return;
            }
            Err(e) if attempt < max_attempts => {
                let delay = backoff_delay(attempt);
                warn!(
                    memory_id = %job.memory_id,
                    attempt,
                    max_attempts,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "graph projection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    memory_id = %job.memory_id,
                    attempts = max_attempts,
                    error = %e,
                    "graph projection failed permanently"
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn job() -> ProjectionJob {
        ProjectionJob {
            memory_id: "mem_1".into(),
            owner_id: "alice".into(),
            content: "fact".into(),
            created_at: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let schedule: Vec<u64> = (1..=6).map(|a| backoff_delay(a).as_secs()).collect();
        assert_eq!(schedule, vec![1, 2, 4, 8, 16, 32]);
        // Cumulative budget ~63s.
        assert_eq!(schedule.iter().sum::<u64>(), 63);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        struct CountingSink {
            fail_first: u32,
            calls: AtomicU32,
        }
        impl GraphSink for CountingSink {
            fn project(&self, _job: &ProjectionJob) -> std::result::Result<(), String> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.fail_first {
                    Err("graph store down".to_string())
                } else {
                    Ok(())
                }
            }
        }

        let sink = CountingSink {
            fail_first: 3,
            calls: AtomicU32::new(0),
        };
        run_with_retry(&sink, &job(), MAX_ATTEMPTS).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_budget() {
        struct AlwaysFails {
            calls: AtomicU32,
        }
        impl GraphSink for AlwaysFails {
            fn project(&self, _job: &ProjectionJob) -> std::result::Result<(), String> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err("still down".to_string())
            }
        }

        let sink = AlwaysFails {
            calls: AtomicU32::new(0),
        };
        run_with_retry(&sink, &job(), MAX_ATTEMPTS).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_projection_into_real_graph() {
        let graph = Arc::new(GraphStore::open_in_memory().unwrap());
        graph.create_component("Database", "Infrastructure").unwrap();

        let mut metadata = Metadata::new();
        metadata.insert(
            "components".to_string(),
            serde_json::json!(["Database"]),
        );

        let job = ProjectionJob {
            memory_id: "mem_1".into(),
            owner_id: "alice".into(),
            content: "We tuned the database".into(),
            created_at: Utc::now(),
            metadata,
        };

        GraphSink::project(graph.as_ref(), &job).unwrap();

        assert_eq!(graph.get_memory_node("mem_1").unwrap().content, "We tuned the database");
        let impact = graph.get_impact_analysis("Database").unwrap();
        assert_eq!(impact.describing_memories.len(), 1);
    }
}
