//! Tick publisher
//!
//! On every tick: compute the value, overwrite it in the shared store, then
//! broadcast a `tic_message` to the group. A failed store write is logged
//! and the broadcast still goes out with the freshly computed value; the
//! next tick overwrites the store again.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::channels::{Event, GroupRegistry, TIME_GROUP};
use crate::error::Result;
use crate::scheduler::{Tick, TickTask};
use crate::store::{SharedStore, TIME_KEY};

/// Produces the value published on each tick
pub trait ValueSource: Send + Sync {
    fn current_value(&self) -> String;
}

/// Local wall-clock time as `HH:MM:SS`
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl ValueSource for WallClock {
    fn current_value(&self) -> String {
        chrono::Local::now().format("%H:%M:%S").to_string()
    }
}

/// Outcome of one publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub value: String,
    /// Whether the store write succeeded
    pub stored: bool,
    /// Count reported by the registry's broadcast
    pub delivered: usize,
}

/// Writes the current value to the store and fans it out to the group
pub struct Publisher {
    store: Arc<dyn SharedStore>,
    registry: Arc<dyn GroupRegistry>,
    source: Arc<dyn ValueSource>,
    group: String,
    key: String,
}

impl Publisher {
    /// Publisher for the `time` group and key, driven by [`WallClock`]
    pub fn new(store: Arc<dyn SharedStore>, registry: Arc<dyn GroupRegistry>) -> Self {
        Self {
            store,
            registry,
            source: Arc::new(WallClock),
            group: TIME_GROUP.to_string(),
            key: TIME_KEY.to_string(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ValueSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Publish once. Only a broadcast failure is returned as an error.
    pub async fn publish(&self) -> Result<TickReport> {
        let value = self.source.current_value();

        let stored = match self.store.set(&self.key, &value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    error = %e,
                    key = %self.key,
                    "Skipping store update for this tick"
                );
                false
            }
        };

        let delivered = self
            .registry
            .broadcast(&self.group, Event::tic(value.clone()))
            .await?;

        Ok(TickReport {
            value,
            stored,
            delivered,
        })
    }
}

#[async_trait]
impl TickTask for Publisher {
    async fn on_tick(&self, tick: Tick) {
        match self.publish().await {
            Ok(report) => debug!(
                tick = tick.seq,
                value = %report.value,
                stored = report.stored,
                delivered = report.delivered,
                "Tick published"
            ),
            Err(e) => error!(tick = tick.seq, error = %e, "Tick broadcast failed"),
        }
    }
}
