//! Redis pub/sub channel layer for multi-process deployments
//!
//! Membership stays local: each process keeps its own [`InMemoryRegistry`].
//! `broadcast` publishes the event on `tic:group:{group}`; every process
//! (including the publishing one) is pattern-subscribed to `tic:group:*` and
//! fans the event out to its local members. A single publisher connection
//! and a single subscriber stream keep per-connection delivery in issue
//! order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::Event;
use super::registry::{InMemoryRegistry, Member};
use super::GroupRegistry;
use crate::error::{Error, Result};

/// Prefix of the redis channel carrying a group's events
pub const GROUP_CHANNEL_PREFIX: &str = "tic:group:";

/// Initial backoff delay for subscriber reconnection
const INITIAL_BACKOFF_SECS: u64 = 1;

/// Maximum backoff delay for subscriber reconnection
const MAX_BACKOFF_SECS: u64 = 30;

/// Cross-process GroupRegistry backed by redis pub/sub
pub struct RedisChannelLayer {
    client: redis::Client,
    publisher: ConnectionManager,
    local: InMemoryRegistry,
    cancel_token: CancellationToken,
}

impl RedisChannelLayer {
    /// Connect to redis and start the subscriber task
    pub async fn connect(redis_url: &str, local: InMemoryRegistry) -> Result<Arc<Self>> {
        let client = redis::Client::open(redis_url).map_err(layer_error)?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(layer_error)?;

        let layer = Arc::new(Self {
            client,
            publisher,
            local,
            cancel_token: CancellationToken::new(),
        });

        tokio::spawn(layer.clone().run_subscriber());
        info!(url = %redis_url, "Redis channel layer started");

        Ok(layer)
    }

    /// Redis channel name for `group`
    pub fn channel_name(group: &str) -> String {
        format!("{}{}", GROUP_CHANNEL_PREFIX, group)
    }

    /// Stop the subscriber task
    pub fn shutdown(&self) {
        info!("Shutting down redis channel layer");
        self.cancel_token.cancel();
    }

    /// Keep a pattern subscription alive, reconnecting with backoff
    async fn run_subscriber(self: Arc<Self>) {
        let mut backoff_secs = INITIAL_BACKOFF_SECS;

        while !self.cancel_token.is_cancelled() {
            match self.subscribe_and_dispatch(&mut backoff_secs).await {
                Ok(()) if self.cancel_token.is_cancelled() => break,
                Ok(()) => warn!("Redis subscription ended, reconnecting"),
                Err(e) => error!(
                    error = %e,
                    backoff_secs,
                    "Redis subscriber failed, retrying"
                ),
            }

            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
            }
            backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
        }

        info!("Redis subscriber task stopped");
    }

    async fn subscribe_and_dispatch(&self, backoff_secs: &mut u64) -> Result<()> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(layer_error)?;
        let pattern = format!("{}*", GROUP_CHANNEL_PREFIX);
        pubsub.psubscribe(&pattern).await.map_err(layer_error)?;

        info!(pattern = %pattern, "Redis subscriber connected");
        *backoff_secs = INITIAL_BACKOFF_SECS;

        let mut stream = pubsub.on_message();
        loop {
            let msg = tokio::select! {
                _ = self.cancel_token.cancelled() => return Ok(()),
                msg = stream.next() => msg,
            };

            // None: the redis connection was lost
            let Some(msg) = msg else {
                return Ok(());
            };

            match msg.get_payload::<String>() {
                Ok(payload) => {
                    dispatch(&self.local, msg.get_channel_name(), &payload);
                }
                Err(e) => warn!(
                    error = %e,
                    channel = %msg.get_channel_name(),
                    "Invalid payload"
                ),
            }
        }
    }
}

#[async_trait]
impl GroupRegistry for RedisChannelLayer {
    async fn join(&self, group: &str, member: Member) -> Result<()> {
        self.local.add(group, member);
        Ok(())
    }

    async fn leave(&self, group: &str, connection_id: &str) -> Result<()> {
        self.local.remove(group, connection_id);
        Ok(())
    }

    async fn broadcast(&self, group: &str, event: Event) -> Result<usize> {
        let payload = serde_json::to_string(&event)?;
        let mut conn = self.publisher.clone();
        let receivers: usize = conn
            .publish(Self::channel_name(group), payload)
            .await
            .map_err(layer_error)?;

        debug!(
            group = %group,
            receivers,
            event_type = event.event_type(),
            "Event published to redis"
        );
        Ok(receivers)
    }

    fn member_count(&self, group: &str) -> usize {
        self.local.member_count(group)
    }
}

/// Fan an event received from redis out to local members
fn dispatch(local: &InMemoryRegistry, channel: &str, payload: &str) -> usize {
    let Some(group) = channel.strip_prefix(GROUP_CHANNEL_PREFIX) else {
        return 0;
    };

    match serde_json::from_str::<Event>(payload) {
        Ok(event) => {
            let delivered = local.deliver(group, &event);
            debug!(
                group = %group,
                delivered,
                event_type = event.event_type(),
                "Dispatched event from redis"
            );
            delivered
        }
        Err(e) => {
            warn!(
                error = %e,
                channel = %channel,
                "Failed to deserialize group event"
            );
            0
        }
    }
}

fn layer_error(err: redis::RedisError) -> Error {
    Error::ChannelLayer(err.to_string())
}
