//! Per-client connection: `Connecting → Open → Closed`
//!
//! A connection owns exactly one group membership. It joins on a successful
//! `connect`, receives group events through its bounded inbound queue,
//! turns them into frames through an explicit `event type → handler` table,
//! and leaves exactly once when it closes for any reason.

pub mod transport;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channels::{
    ClientMessage, ConnectionId, Event, Frame, GroupRegistry, Member, PongMessage, TIC_MESSAGE,
};
use crate::config::DEFAULT_QUEUE_CAPACITY;
use crate::error::{Error, Result};

pub use transport::{Inbound, Transport};

/// Who is on the other end of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(String),
    Anonymous,
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Identity::User(name) => Some(name),
            Identity::Anonymous => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(name) => write!(f, "{}", name),
            Identity::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Turns a group event into the frame for this connection, or `None` to drop it
pub type EventHandler = fn(&Connection, &Event) -> Option<Frame>;

/// Handler for `tic_message`: forward the payload to authenticated clients only
fn tic_message(conn: &Connection, event: &Event) -> Option<Frame> {
    if conn.identity.is_anonymous() {
        return None;
    }

    match event {
        Event::TicMessage { message } => Some(Frame {
            message: message.clone(),
        }),
    }
}

/// Session bound to one client transport
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    group: String,
    state: ConnectionState,
    registry: Arc<dyn GroupRegistry>,
    handlers: HashMap<&'static str, EventHandler>,
    queue_capacity: usize,
}

impl Connection {
    /// New connection in `Connecting` state, subscribed to `tic_message`
    pub fn new(
        identity: Identity,
        group: impl Into<String>,
        registry: Arc<dyn GroupRegistry>,
    ) -> Self {
        let mut handlers: HashMap<&'static str, EventHandler> = HashMap::new();
        handlers.insert(TIC_MESSAGE, tic_message);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity,
            group: group.into(),
            state: ConnectionState::Connecting,
            registry,
            handlers,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the inbound queue size (minimum 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Register or replace the handler for an event type
    pub fn with_handler(mut self, event_type: &'static str, handler: EventHandler) -> Self {
        self.handlers.insert(event_type, handler);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Accept attempt.
    ///
    /// Anonymous identities are rejected with [`Error::AuthRejected`] and the
    /// connection goes straight to `Closed` without touching the registry.
    /// Otherwise the connection joins its group and returns the receiving
    /// half of its inbound queue; the caller acknowledges the handshake
    /// after this returns.
    pub async fn connect(&mut self) -> Result<mpsc::Receiver<Event>> {
        if self.state != ConnectionState::Connecting {
            return Err(Error::Transport(format!(
                "connect called in state {:?}",
                self.state
            )));
        }

        if self.identity.is_anonymous() {
            self.state = ConnectionState::Closed;
            info!(connection_id = %self.id, "Rejected anonymous connection");
            return Err(Error::AuthRejected);
        }

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        if let Err(e) = self
            .registry
            .join(&self.group, Member::new(self.id.clone(), tx))
            .await
        {
            self.state = ConnectionState::Closed;
            return Err(e);
        }

        self.state = ConnectionState::Open;
        info!(
            connection_id = %self.id,
            user = %self.identity,
            group = %self.group,
            "Connection accepted"
        );
        Ok(rx)
    }

    /// Handle one group event.
    ///
    /// Never fails: a frame that cannot be serialized or sent closes the
    /// connection. Returns whether the connection is still open.
    pub async fn receive_event<T>(&mut self, event: &Event, transport: &mut T) -> bool
    where
        T: Transport + ?Sized,
    {
        if self.state != ConnectionState::Open {
            return false;
        }

        let Some(handler) = self.handlers.get(event.event_type()).copied() else {
            debug!(
                connection_id = %self.id,
                event_type = event.event_type(),
                "No handler for event type, dropping"
            );
            return true;
        };

        let Some(frame) = handler(self, event) else {
            return true;
        };

        let sent = match frame.to_text() {
            Ok(text) => transport.send_frame(text).await,
            Err(e) => Err(e),
        };

        if let Err(e) = sent {
            let err = Error::DeliveryFailure {
                connection_id: self.id.clone(),
                reason: e.to_string(),
            };
            warn!(error = %err, "Closing connection after failed delivery");
            self.close().await;
            return false;
        }

        debug!(connection_id = %self.id, event_type = event.event_type(), "Frame sent");
        true
    }

    /// Move to `Closed`, leaving the group if currently joined. Idempotent.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Open {
            if let Err(e) = self.registry.leave(&self.group, &self.id).await {
                warn!(connection_id = %self.id, error = %e, "Failed to leave group");
            }
        }
        self.state = ConnectionState::Closed;
    }

    /// Drive an open connection until the client goes away or a delivery fails
    pub async fn run<T: Transport>(mut self, mut inbox: mpsc::Receiver<Event>, mut transport: T) {
        debug!(connection_id = %self.id, "Connection task started");

        loop {
            tokio::select! {
                event = inbox.recv() => match event {
                    Some(event) => {
                        if !self.receive_event(&event, &mut transport).await {
                            break;
                        }
                    }
                    // Registry dropped our queue
                    None => break,
                },

                inbound = transport.next_inbound() => match inbound {
                    Some(Inbound::Text(text)) => {
                        if !self.handle_client_text(&text, &mut transport).await {
                            break;
                        }
                    }
                    Some(Inbound::Binary) => {}
                    Some(Inbound::Close) | None => break,
                },
            }
        }

        // Pending events die with the queue
        drop(inbox);
        self.close().await;
        transport.shutdown().await;

        info!(
            connection_id = %self.id,
            user = %self.identity,
            "Connection closed"
        );
    }

    async fn handle_client_text<T>(&mut self, text: &str, transport: &mut T) -> bool
    where
        T: Transport + ?Sized,
    {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Ping) => {
                let sent = match serde_json::to_string(&PongMessage::default()) {
                    Ok(pong) => transport.send_frame(pong).await,
                    Err(e) => Err(e.into()),
                };
                if let Err(e) = sent {
                    warn!(connection_id = %self.id, error = %e, "Failed to answer ping");
                    self.close().await;
                    return false;
                }
            }
            Err(_) => {
                debug!(connection_id = %self.id, "Ignoring unrecognised client message");
            }
        }
        true
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state != ConnectionState::Open {
            return;
        }

        // Dropped while joined, e.g. the upgrade never completed
        let registry = self.registry.clone();
        let group = self.group.clone();
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = registry.leave(&group, &id).await {
                        warn!(connection_id = %id, error = %e, "Failed to leave group on drop");
                    }
                });
            }
            Err(_) => {
                warn!(
                    connection_id = %self.id,
                    "Connection dropped outside a runtime, membership reclaimed on next broadcast"
                );
            }
        }
    }
}
