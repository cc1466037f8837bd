//! REST endpoints
//!
//! - `GET /health` - liveness
//! - `GET /api/initial_state` - last published value for late joiners
//! - `POST /auth/token` - exchange credentials for a bearer token
//! - `GET /` - landing page

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auth::{AuthError, LoginRequest};
use super::state::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Optional `?token=` for clients that cannot set headers
#[derive(Debug, Default, Deserialize)]
pub struct TokenParams {
    pub token: Option<String>,
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "UNAUTHORIZED".to_string(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "SERVICE_UNAVAILABLE".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "INTERNAL_ERROR".to_string(),
        }
    }
}

/// Body of `GET /api/initial_state`
#[derive(Debug, Serialize, Deserialize)]
pub struct InitialState {
    /// `None` until the first tick has been stored
    pub current: Option<String>,
}

/// GET / - Landing page
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health - Liveness check
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/initial_state - Current value for clients that just connected
pub async fn initial_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<TokenParams>,
) -> Response {
    let identity = state
        .auth
        .resolve_identity(&headers, params.token.as_deref());
    if identity.is_anonymous() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiError::unauthorized("Authentication required")),
        )
            .into_response();
    }

    match state.store.get(&state.key).await {
        Ok(current) => Json(InitialState { current }).into_response(),
        Err(e) => {
            warn!(error = %e, "Initial state read failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError::unavailable(e.to_string())),
            )
                .into_response()
        }
    }
}

/// POST /auth/token - Username/password login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let username = request.username.clone();
    match state.auth.clone().login_blocking(request).await {
        Ok(tokens) => {
            info!(user = %username, "Issued access token");
            Json(tokens).into_response()
        }
        Err(AuthError::InvalidCredentials) => {
            warn!(user = %username, "Login failed");
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::unauthorized("Invalid username or password")),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(e.to_string())),
        )
            .into_response(),
    }
}
