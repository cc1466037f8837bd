//! Transport seam between a connection and its client socket

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use tracing::debug;

use crate::error::{Error, Result};

/// Inbound traffic a connection reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary,
    /// Client sent a close frame
    Close,
}

/// Bidirectional client channel owned by one connection
#[async_trait]
pub trait Transport: Send {
    /// Push one text frame to the client
    async fn send_frame(&mut self, text: String) -> Result<()>;

    /// Next inbound message; `None` once the transport is gone
    async fn next_inbound(&mut self) -> Option<Inbound>;

    /// Best-effort close
    async fn shutdown(&mut self);
}

#[async_trait]
impl Transport for WebSocket {
    async fn send_frame(&mut self, text: String) -> Result<()> {
        self.send(Message::Text(text))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn next_inbound(&mut self) -> Option<Inbound> {
        loop {
            match self.recv().await? {
                Ok(Message::Text(text)) => return Some(Inbound::Text(text)),
                Ok(Message::Binary(_)) => return Some(Inbound::Binary),
                // Pings are answered by the socket itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => return Some(Inbound::Close),
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    return None;
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        let _ = self.send(Message::Close(None)).await;
    }
}
