//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_check, index, initial_state, login};
use super::state::AppState;
use super::websocket::ws_handler;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/auth/token", post(login))
        .route("/api/initial_state", get(initial_state))
        // Trailing slash is part of the path clients use
        .route("/time/tic/", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::JwtAuth;
    use crate::channels::InMemoryRegistry;
    use crate::store::{MemoryStore, SharedStore, TIME_KEY};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::util::ServiceExt;

    const SECRET: &str = "router-test-secret-key-with-32-plus-chars";

    fn test_state() -> (Arc<AppState>, Arc<MemoryStore>, InMemoryRegistry) {
        let mut auth = JwtAuth::new(SECRET).with_hash_cost(4);
        auth.add_user("alice", "wonderland").unwrap();

        let store = Arc::new(MemoryStore::new());
        let registry = InMemoryRegistry::new();
        let state = AppState::new(Arc::new(registry.clone()), store.clone(), Arc::new(auth));
        (Arc::new(state), store, registry)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (state, _, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_index_page() {
        let (state, _, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_initial_state_requires_auth() {
        let (state, _, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/initial_state")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_initial_state_returns_stored_value() {
        let (state, store, _) = test_state();
        store.set(TIME_KEY, "12:34:56").await.unwrap();
        let token = state.auth.issue_token("alice").unwrap().access_token;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/initial_state")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["current"], "12:34:56");
    }

    #[tokio::test]
    async fn test_initial_state_before_first_tick() {
        let (state, _, _) = test_state();
        let token = state.auth.issue_token("alice").unwrap().access_token;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/initial_state?token={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["current"].is_null());
    }

    #[tokio::test]
    async fn test_login() {
        let (state, _, _) = test_state();
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/token")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"username":"alice","password":"wonderland"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["token_type"], "Bearer");
        let token = body["access_token"].as_str().unwrap();
        assert_eq!(state.auth.validate_token(token).unwrap().sub, "alice");
    }

    #[tokio::test]
    async fn test_login_bad_password() {
        let (state, _, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/token")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"alice","password":"nope"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_plain_request_to_socket_endpoint() {
        let (state, _, registry) = test_state();
        let token = state.auth.issue_token("alice").unwrap().access_token;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/time/tic/?token={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
        assert_eq!(registry.group_count(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_socket_is_forbidden() {
        let (state, _, registry) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/time/tic/")
                    .header(header::CONNECTION, "upgrade")
                    .header(header::UPGRADE, "websocket")
                    .header(header::SEC_WEBSOCKET_VERSION, "13")
                    .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(registry.group_count(), 0);
    }
}
