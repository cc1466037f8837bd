//! HTTP and WebSocket surface
//!
//! Authenticated clients stream ticks over `/time/tic/` and read the last
//! published value from `/api/initial_state`.

pub mod auth;
pub mod handlers;
pub mod http;
pub mod state;
pub mod websocket;

pub use auth::JwtAuth;
pub use http::create_router;
pub use state::AppState;
