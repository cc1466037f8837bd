//! tic broadcast server
//!
//! Publishes a value (local wall-clock time) on a fixed beat, stores the
//! latest value in a shared key-value store, and fans it out to every
//! authenticated WebSocket client in the `time` group.
//!
//! # Features
//!
//! - **Fixed-rate beat**: 0.5s default, overrun ticks are skipped
//! - **Decoupled fan-out**: the publisher only knows a group name
//! - **Slow-consumer isolation**: bounded per-connection queues
//! - **Multi-process**: optional redis store and channel layer
//! - **JWT auth**: anonymous clients are refused before joining
//!
//! # Modules
//!
//! - `store`: last-value key-value store (memory, redis)
//! - `channels`: group registry and broadcast (memory, redis pub/sub)
//! - `connection`: per-client state machine and event dispatch
//! - `scheduler`: periodic beat
//! - `publisher`: per-tick store write and broadcast
//! - `api`: HTTP routes, WebSocket endpoint, authentication
//! - `server`: process bootstrap
//!
//! # Example
//!
//! ```no_run
//! use tic_broadcast::{Config, JwtAuth, TicServer};
//!
//! #[tokio::main]
//! async fn main() -> tic_broadcast::Result<()> {
//!     let config = Config::from_env()?;
//!     let auth = JwtAuth::new("a-secret-key-of-at-least-32-characters");
//!     TicServer::build(config, auth).await?.run().await
//! }
//! ```

pub mod api;
pub mod channels;
pub mod config;
pub mod connection;
pub mod error;
pub mod publisher;
pub mod scheduler;
pub mod server;
pub mod store;

// Re-export commonly used items at crate root
pub use api::{create_router, AppState, JwtAuth};
pub use channels::{Event, GroupRegistry, InMemoryRegistry, RedisChannelLayer, TIME_GROUP};
pub use config::Config;
pub use connection::{Connection, ConnectionState, Identity};
pub use error::{Error, Result};
pub use publisher::Publisher;
pub use scheduler::Scheduler;
pub use server::TicServer;
pub use store::{MemoryStore, RedisStore, SharedStore, TIME_KEY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
