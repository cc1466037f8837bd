//! Shared key-value store holding the last published value
//!
//! The store is the only place a late client can read the current value
//! from. Writes overwrite unconditionally; there is no history, versioning
//! or compare-and-swap.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;

use crate::error::Result;

/// Well-known key the publisher writes on every tick
pub const TIME_KEY: &str = "time";

/// Key-value store reachable by every process instance
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Last written value, or `None` if the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value under `key`
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
