//! End-to-end tests for the Memory Service REST API.
//!
//! The router runs against in-memory stores, a scripted mock LLM backend,
//! and a deterministic mock embedder, so every scenario is reproducible.

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

const DIMS: usize = 8;

struct TestApp {
    state: AppState,
}

impl TestApp {
    fn new(responses: Vec<String>) -> Self {
        Self::with_settings(responses, Settings::default())
    }

    fn with_settings(responses: Vec<String>, settings: Settings) -> Self {
        let store = Arc::new(SqliteMemoryStore::open_in_memory(DIMS).unwrap());
        let graph = Arc::new(GraphStore::open_in_memory().unwrap());
        let backend = Arc::new(MockBackend::new(responses));
        let embedder = Arc::new(MockEmbedder::new(DIMS));
        let projector = Projector::spawn(graph.clone(), 1);

        let state = AppState::new(
            store,
            graph,
            Extractor::new(backend),
            embedder,
            projector,
            settings,
        );
        Self { state }
    }

    fn router(&self) -> Router {
        Server::from_state(self.state.clone()).router()
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router()
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
}

fn extraction(memories: &[(&str, &str)]) -> String {
    let items: Vec<Value> = memories
        .iter()
        .map(|(content, action)| json!({"content": content, "action": action}))
        .collect();
    json!({ "memories": items }).to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingestion
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_memories_returns_extracted_results() {
    let app = TestApp::new(vec![extraction(&[
        ("I use PostgreSQL 16", "ADD"),
        ("I deploy with Docker", "ADD"),
    ])]);

    let (status, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "I use PostgreSQL 16 and deploy with Docker"}],
                "user_id": "alice",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    // Result order mirrors the extractor's output order.
    assert_eq!(results[0]["memory"], "I use PostgreSQL 16");
    assert_eq!(results[0]["event"], "ADD");
    assert_eq!(results[1]["memory"], "I deploy with Docker");
    assert!(body["relations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_memories_requires_user_id() {
    let app = TestApp::new(vec![]);
    let (status, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_input");
}

#[tokio::test]
async fn extractor_failure_writes_nothing() {
    // No scripted responses: the backend errors.
    let app = TestApp::new(vec![]);

    let (status, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "anything"}],
                "user_id": "alice",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "provider_unavailable");

    let (status, body) = app.request("GET", "/memories?user_id=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn round_trip_insert_then_get() {
    let app = TestApp::new(vec![extraction(&[("I prefer tabs", "ADD")])]);

    let (_, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "I prefer tabs"}],
                "user_id": "alice",
                "metadata": {"topic": "style"},
            })),
        )
        .await;
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request("GET", &format!("/memories/{id}?user_id=alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memory"], "I prefer tabs");
    assert_eq!(body["metadata"]["topic"], "style");
}

// ─────────────────────────────────────────────────────────────────────────────
// Ownership
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ownership_boundary_returns_access_denied() {
    let app = TestApp::new(vec![extraction(&[("I use PostgreSQL 16", "ADD")])]);

    let (_, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "I use PostgreSQL 16"}],
                "user_id": "alice",
            })),
        )
        .await;
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    for (method, uri) in [
        ("GET", format!("/memories/{id}?user_id=bob")),
        ("DELETE", format!("/memories/{id}?user_id=bob")),
        ("GET", format!("/memories/{id}/history?user_id=bob")),
    ] {
        let (status, body) = app.request(method, &uri, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert_eq!(body["code"], "access_denied");
        assert_eq!(
            body["detail"],
            format!("Access denied: Memory {id} does not belong to user bob")
        );
    }

    // PUT carries the user in the body.
    let (status, body) = app
        .request(
            "PUT",
            &format!("/memories/{id}"),
            Some(json!({"user_id": "bob", "content": "hijacked"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "access_denied");
}

#[tokio::test]
async fn search_is_scoped_to_owner() {
    let app = TestApp::new(vec![
        extraction(&[("I prefer async/await over callbacks in JavaScript", "ADD")]),
        extraction(&[("I prefer promises in JavaScript", "ADD")]),
    ]);

    app.request(
        "POST",
        "/memories",
        Some(json!({
            "messages": [{"role": "user", "content": "async/await all the way"}],
            "user_id": "alice",
        })),
    )
    .await;
    app.request(
        "POST",
        "/memories",
        Some(json!({
            "messages": [{"role": "user", "content": "promises for me"}],
            "user_id": "bob",
        })),
    )
    .await;

    let (status, body) = app
        .request(
            "POST",
            "/search",
            Some(json!({
                "query": "I prefer async/await over callbacks in JavaScript",
                "user_id": "alice",
                "limit": 5,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0]["memory"],
        "I prefer async/await over callbacks in JavaScript"
    );
    // The query text matches the stored content exactly, so the mock
    // embedder puts it at the top with a near-perfect score.
    assert!(results[0]["score"].as_f64().unwrap() > 0.6);
}

// ─────────────────────────────────────────────────────────────────────────────
// Update & History
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn supersession_produces_add_then_update_history() {
    let settings = Settings {
        // The mock embedder has no semantic structure, so let the UPDATE
        // target resolution accept the nearest stored memory.
        update_similarity_threshold: -1.0,
        ..Settings::default()
    };
    let app = TestApp::with_settings(
        vec![
            extraction(&[("User prefers class components", "ADD")]),
            extraction(&[("User strongly prefers hooks", "UPDATE")]),
        ],
        settings,
    );

    let (_, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "I like class components"}],
                "user_id": "alice",
            })),
        )
        .await;
    let m1 = body["results"][0]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "Actually I strongly prefer hooks now"}],
                "user_id": "alice",
            })),
        )
        .await;
    assert_eq!(body["results"][0]["event"], "UPDATE");
    assert_eq!(body["results"][0]["id"], m1.as_str());

    let (status, body) = app
        .request("GET", &format!("/memories/{m1}?user_id=alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memory"], "User strongly prefers hooks");

    let (_, body) = app
        .request("GET", &format!("/memories/{m1}/history?user_id=alice"), None)
        .await;
    let events: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(events, vec!["ADD", "UPDATE"]);
}

#[tokio::test]
async fn put_then_get_returns_new_content_and_one_update_event() {
    let app = TestApp::new(vec![extraction(&[("I use Vim", "ADD")])]);

    let (_, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "I use Vim"}],
                "user_id": "alice",
            })),
        )
        .await;
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            "PUT",
            &format!("/memories/{id}"),
            Some(json!({"user_id": "alice", "content": "I use Neovim"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memory"], "I use Neovim");

    let (_, body) = app
        .request("GET", &format!("/memories/{id}/history?user_id=alice"), None)
        .await;
    let events: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(events, vec!["ADD", "UPDATE"]);
}

#[tokio::test]
async fn delete_then_get_returns_not_found() {
    let app = TestApp::new(vec![extraction(&[("temporary fact", "ADD")])]);

    let (_, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "temp"}],
                "user_id": "alice",
            })),
        )
        .await;
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request("DELETE", &format!("/memories/{id}?user_id=alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request("GET", &format!("/memories/{id}?user_id=alice"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

// ─────────────────────────────────────────────────────────────────────────────
// Background Projection
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn inserted_memory_appears_in_graph() {
    let app = TestApp::new(vec![extraction(&[("graph me", "ADD")])]);

    let started = std::time::Instant::now();
    let (_, body) = app
        .request(
            "POST",
            "/memories",
            Some(json!({
                "messages": [{"role": "user", "content": "graph me"}],
                "user_id": "alice",
            })),
        )
        .await;
    // The synchronous response does not wait for projection.
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    // The projection worker picks the job up asynchronously.
    let mut projected = false;
    for _ in 0..50 {
        let (status, _) = app
            .request("GET", &format!("/graph/related/{id}?depth=1"), None)
            .await;
        if status == StatusCode::OK {
            projected = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(projected, "memory node never appeared in the graph");
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_requires_admin_token() {
    let auth = Arc::new(mnemo_auth::AuthStore::open_in_memory().unwrap());
    let plain = auth.create_token("alice", None, None, None, &[]).unwrap();
    let admin = auth
        .create_token("root", None, None, None, &["admin".to_string()])
        .unwrap();

    let app = TestApp::new(vec![]);
    let state = app.state.clone().with_auth(auth);
    let router = Server::from_state(state).router();

    // No credentials.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid token without the admin capability.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reset")
                .header("Authorization", format!("Bearer {plain}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Admin token.
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reset")
                .header("Authorization", format!("Bearer {admin}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_reports_provider() {
    let app = TestApp::new(vec![]);
    let (status, body) = app.request("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "mnemo-server");
}
