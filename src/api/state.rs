//! Shared application state for HTTP and WebSocket handlers

use std::sync::Arc;

use crate::channels::{GroupRegistry, TIME_GROUP};
use crate::config::DEFAULT_QUEUE_CAPACITY;
use crate::connection::{Connection, Identity};
use crate::store::{SharedStore, TIME_KEY};

use super::auth::JwtAuth;

/// State handed to every request
pub struct AppState {
    /// Group membership and fan-out
    pub registry: Arc<dyn GroupRegistry>,
    /// Holds the last published value
    pub store: Arc<dyn SharedStore>,
    pub auth: Arc<JwtAuth>,
    /// Group every socket joins
    pub group: String,
    /// Store key read by `/api/initial_state`
    pub key: String,
    /// Inbound queue size for new connections
    pub queue_capacity: usize,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn GroupRegistry>,
        store: Arc<dyn SharedStore>,
        auth: Arc<JwtAuth>,
    ) -> Self {
        Self {
            registry,
            store,
            auth,
            group: TIME_GROUP.to_string(),
            key: TIME_KEY.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Fresh connection for `identity`, bound to this state's group
    pub fn new_connection(&self, identity: Identity) -> Connection {
        Connection::new(identity, self.group.clone(), self.registry.clone())
            .with_queue_capacity(self.queue_capacity)
    }
}
