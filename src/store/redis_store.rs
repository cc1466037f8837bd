//! Redis-backed store shared by every process instance

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::SharedStore;
use crate::error::{Error, Result};

/// SharedStore backed by redis `GET`/`SET`.
///
/// `ConnectionManager` multiplexes and reconnects internally; it is cloned
/// per operation to obtain a mutable handle.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to redis, e.g. `redis://127.0.0.1:6379`
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(store_error)?;
        let conn = ConnectionManager::new(client).await.map_err(store_error)?;
        info!(url = %redis_url, "Connected to redis store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(store_error)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(store_error)
    }
}

fn store_error(err: redis::RedisError) -> Error {
    Error::StoreUnavailable(err.to_string())
}
