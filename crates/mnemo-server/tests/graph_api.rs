//! End-to-end tests for the graph intelligence REST surface.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use mnemo_graph::GraphStore;
use mnemo_llm::{Extractor, MockBackend, MockEmbedder};
use mnemo_server::{AppState, Projector, Server, Settings};
use mnemo_store::SqliteMemoryStore;

fn test_router() -> (Router, Arc<GraphStore>) {
    let store = Arc::new(SqliteMemoryStore::open_in_memory(8).unwrap());
    let graph = Arc::new(GraphStore::open_in_memory().unwrap());
    let backend = Arc::new(MockBackend::new(vec![]));
    let embedder = Arc::new(MockEmbedder::new(8));
    let projector = Projector::spawn(graph.clone(), 1);

    let state = AppState::new(
        store,
        graph.clone(),
        Extractor::new(backend),
        embedder,
        projector,
        Settings::default(),
    );
    (Server::from_state(state).router(), graph)
}

async fn request(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn seed_memories(graph: &GraphStore, owner: &str, ids: &[&str]) {
    for id in ids {
        graph
            .upsert_memory_node(id, owner, &format!("note {id}"), chrono::Utc::now())
            .unwrap();
    }
}

#[tokio::test]
async fn link_and_traverse() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["m1", "m2", "m3"]);

    let (status, body) = request(
        &router,
        "POST",
        "/graph/link",
        Some(json!({"memory_id_1": "m1", "memory_id_2": "m2", "relationship_type": "EXTENDS"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["relationship"], "EXTENDS");

    request(
        &router,
        "POST",
        "/graph/link",
        Some(json!({"memory_id_1": "m2", "memory_id_2": "m3"})),
    )
    .await;

    let (status, body) = request(&router, "GET", "/graph/related/m1?depth=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let related = body.as_array().unwrap();
    assert_eq!(related.len(), 2);

    let (status, body) = request(
        &router,
        "GET",
        "/graph/path?from_memory_id=m1&to_memory_id=m3",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path_length"], 2);
}

#[tokio::test]
async fn path_not_found_is_404() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["m1", "m2"]);

    let (status, body) = request(
        &router,
        "GET",
        "/graph/path?from_memory_id=m1&to_memory_id=m2",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "No path found between memories");
}

#[tokio::test]
async fn unknown_relationship_rejected() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["m1", "m2"]);

    let (status, body) = request(
        &router,
        "POST",
        "/graph/link",
        Some(json!({"memory_id_1": "m1", "memory_id_2": "m2", "relationship_type": "CITES"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_input");
}

#[tokio::test]
async fn supersession_flow() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["new", "old"]);

    request(
        &router,
        "POST",
        "/graph/link",
        Some(json!({"memory_id_1": "new", "memory_id_2": "old", "relationship_type": "SUPERSEDES"})),
    )
    .await;

    let (status, body) = request(&router, "GET", "/graph/superseded?user_id=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    let pairs = body.as_array().unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0]["obsolete_memory"]["id"], "old");
    assert_eq!(pairs[0]["current_memory"]["id"], "new");
}

#[tokio::test]
async fn component_impact_flow() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["m1"]);

    let (status, _) = request(
        &router,
        "POST",
        "/graph/component",
        Some(json!({"name": "Database", "component_type": "Infrastructure"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    request(
        &router,
        "POST",
        "/graph/component",
        Some(json!({"name": "API", "component_type": "Service"})),
    )
    .await;
    request(
        &router,
        "POST",
        "/graph/component/dependency",
        Some(json!({"component_from": "API", "component_to": "Database"})),
    )
    .await;
    request(
        &router,
        "POST",
        "/graph/component/link-memory",
        Some(json!({"memory_id": "m1", "component_name": "Database"})),
    )
    .await;

    let (status, body) = request(&router, "GET", "/graph/impact/Database", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["component"], "Database");
    assert_eq!(body["dependents"][0]["name"], "API");
    assert_eq!(body["describing_memories"][0]["id"], "m1");
}

#[tokio::test]
async fn decision_rationale_flow() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["m1"]);

    let (status, body) = request(
        &router,
        "POST",
        "/graph/decision",
        Some(json!({
            "text": "Use PostgreSQL as primary database",
            "user_id": "alice",
            "pros": ["ACID compliance", "pgvector support"],
            "cons": ["Scaling complexity"],
            "alternatives": ["MongoDB", "MySQL"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let decision_id = body["id"].as_str().unwrap().to_string();
    assert!(decision_id.starts_with("dec_"));

    request(
        &router,
        "POST",
        "/graph/decision/link",
        Some(json!({"decision_id": decision_id, "memory_id": "m1"})),
    )
    .await;

    let (status, body) = request(
        &router,
        "GET",
        &format!("/graph/decision/{decision_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"]["pros"].as_array().unwrap().len(), 2);
    assert_eq!(body["decision"]["alternatives"], json!(["MongoDB", "MySQL"]));
    assert_eq!(body["justified_by"][0]["id"], "m1");
}

#[tokio::test]
async fn intelligence_report_over_rest() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["m1", "m2", "m3"]);
    graph
        .link_memories("m1", "m2", mnemo_graph::EdgeKind::RelatesTo)
        .unwrap();

    let (status, body) = request(&router, "GET", "/graph/intelligence?user_id=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_memories"], 3);
    assert_eq!(body["summary"]["isolated_memories"], 1);
    assert!(body["summary"]["knowledge_health_score"].as_f64().unwrap() <= 10.0);
    assert!(!body["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn trust_score_over_rest() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["m1", "m2"]);
    graph
        .link_memories("m2", "m1", mnemo_graph::EdgeKind::RespondsTo)
        .unwrap();

    let (status, body) = request(&router, "GET", "/graph/trust-score/m1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["citations"], 1);
    let score = body["score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));
}

#[tokio::test]
async fn thread_flow() {
    let (router, graph) = test_router();
    seed_memories(&graph, "alice", &["m1", "m2", "m3"]);

    let (status, body) = request(
        &router,
        "POST",
        "/graph/thread",
        Some(json!({"memory_ids": ["m1", "m2", "m3"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["thread_length"], 3);

    let (status, body) = request(&router, "GET", "/graph/thread/m2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
}
