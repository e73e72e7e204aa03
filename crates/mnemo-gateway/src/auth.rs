//! Per-request authentication middleware.
//!
//! Every MCP request must carry `X-MCP-Token` and `X-MCP-UserID` headers.
//! The middleware validates the pair against the auth store before the
//! request reaches a transport; failures answer 401 with a JSON body and the
//! attempt lands in the audit log either way.

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use mnemo_auth::SharedAuthStore;

/// Header carrying the opaque token.
pub const TOKEN_HEADER: &str = "X-MCP-Token";

/// Header carrying the claimed user id.
pub const USER_ID_HEADER: &str = "X-MCP-UserID";

fn unauthorized(detail: String) -> Response {
    let body = json!({
        "detail": detail,
        "code": "unauthenticated",
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Authentication middleware for the MCP transports.
pub async fn auth_middleware(
    State(auth): State<SharedAuthStore>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let token = header_value(&request, TOKEN_HEADER);
    let user_id = header_value(&request, USER_ID_HEADER);

    let (Some(token), Some(user_id)) = (token, user_id) else {
        warn!("MCP request missing authentication headers");
        return unauthorized(
            "Missing authentication credentials. Set the X-MCP-Token and X-MCP-UserID headers."
                .to_string(),
        );
    };

    let client_info = json!({
        "transport": request.uri().path(),
        "user_agent": header_value(&request, "user-agent"),
    });

    let validation = match auth.validate(&token, &user_id, Some(client_info)) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "auth store unavailable");
            return unauthorized("Authentication system error. Please try again.".to_string());
        }
    };

    if !validation.ok {
        warn!(user_id = %user_id, "MCP authentication failed");
        return unauthorized(
            validation
                .error
                .unwrap_or_else(|| "Invalid authentication token.".to_string()),
        );
    }

    debug!(user_id = %user_id, "MCP request authenticated");
    next.run(request).await
}

fn header_value(request: &Request<Body>, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, middleware, routing::post};
    use std::sync::Arc;
    use tower::ServiceExt;

    use mnemo_auth::AuthStore;

    async fn protected() -> &'static str {
        "through"
    }

    fn router_with_auth(auth: SharedAuthStore) -> Router {
        Router::new()
            .route("/mcp/", post(protected))
            .layer(middleware::from_fn_with_state(auth.clone(), auth_middleware))
    }

    fn request(token: Option<&str>, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/mcp/");
        if let Some(token) = token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn rejects_garbage_token_and_audits() {
        let auth = Arc::new(AuthStore::open_in_memory().unwrap());
        let app = router_with_auth(auth.clone());

        let response = app
            .oneshot(request(Some("garbage"), Some("alice@x")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(
            body["detail"]
                .as_str()
                .unwrap()
                .contains("Invalid authentication token")
        );

        let audit = auth.audit(1, None).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, mnemo_auth::AuditAction::AuthFailed);
        assert_eq!(audit[0].token.as_deref(), Some("garbage"));
    }

    #[tokio::test]
    async fn rejects_missing_headers() {
        let auth = Arc::new(AuthStore::open_in_memory().unwrap());
        let app = router_with_auth(auth);

        let response = app.oneshot(request(None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_user_mismatch() {
        let auth = Arc::new(AuthStore::open_in_memory().unwrap());
        let token = auth
            .create_token("alice@x", None, None, None, &[])
            .unwrap();
        let app = router_with_auth(auth.clone());

        let response = app
            .oneshot(request(Some(&token), Some("bob@x")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let audit = auth.audit(1, None).unwrap();
        assert_eq!(audit[0].action, mnemo_auth::AuditAction::Denied);
    }

    #[tokio::test]
    async fn passes_valid_credentials() {
        let auth = Arc::new(AuthStore::open_in_memory().unwrap());
        let token = auth
            .create_token("alice@x", None, None, None, &[])
            .unwrap();
        let app = router_with_auth(auth.clone());

        let response = app
            .oneshot(request(Some(&token), Some("alice@x")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let audit = auth.audit(1, None).unwrap();
        assert_eq!(audit[0].action, mnemo_auth::AuditAction::Success);

        // last_used_at was touched.
        let tokens = auth.list(Some("alice@x")).unwrap();
        assert!(tokens[0].last_used_at.is_some());
    }
}
