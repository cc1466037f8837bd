//! Channel layer: group membership and fan-out
//!
//! The registry is the sole fan-out point. Publishers broadcast to a group
//! name without holding any reference to a connection; connections join and
//! leave by id. Two backends share one interface:
//!
//! - [`InMemoryRegistry`] for single-process deployments
//! - [`RedisChannelLayer`] for several processes sharing one logical group

pub mod events;
pub mod redis_layer;
pub mod registry;

use async_trait::async_trait;

use crate::error::Result;

pub use events::{ClientMessage, Event, Frame, PongMessage, TicMessage, TIC_MESSAGE};
pub use redis_layer::RedisChannelLayer;
pub use registry::{ConnectionId, InMemoryRegistry, Member, MemberSender};

/// Group name every tick is broadcast to
pub const TIME_GROUP: &str = "time";

/// Group membership and broadcast
#[async_trait]
pub trait GroupRegistry: Send + Sync {
    /// Register `member` in `group`. Idempotent.
    async fn join(&self, group: &str, member: Member) -> Result<()>;

    /// Remove a member. No-op if it is not joined.
    async fn leave(&self, group: &str, connection_id: &str) -> Result<()>;

    /// Hand `event` to every current member of `group`.
    ///
    /// Per-member failures are isolated and never surface here. The count
    /// returned is backend specific: members enqueued for the in-memory
    /// registry, receiving processes for redis.
    async fn broadcast(&self, group: &str, event: Event) -> Result<usize>;

    /// Members of `group` joined through this process
    fn member_count(&self, group: &str) -> usize;
}
