//! WebSocket endpoint for the tick stream

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use super::handlers::TokenParams;
use super::state::AppState;
use crate::error::Error;

/// GET /time/tic/ - Join the time group and stream ticks.
///
/// Anonymous clients are refused with 403 before the handshake and never
/// reach the registry. Authenticated clients join the group first; the
/// upgrade is acknowledged only after the join succeeded.
pub async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    headers: HeaderMap,
    Query(params): Query<TokenParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let identity = state
        .auth
        .resolve_identity(&headers, params.token.as_deref());
    if identity.is_anonymous() {
        info!("Rejected anonymous WebSocket connection");
        return (StatusCode::FORBIDDEN, "Authentication required").into_response();
    }

    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "Expected a WebSocket upgrade").into_response();
    };

    let mut connection = state.new_connection(identity);
    match connection.connect().await {
        Ok(inbox) => ws.on_upgrade(move |socket| connection.run(inbox, socket)),
        Err(Error::AuthRejected) => {
            (StatusCode::FORBIDDEN, "Authentication required").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to join group");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}
