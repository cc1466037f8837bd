//! Process configuration read from environment variables
//!
//! ## Environment
//! - `TIC_BIND_ADDR`: listen address (default `127.0.0.1:8000`)
//! - `TIC_REDIS_URL`: redis URL; enables the redis store and channel layer
//! - `TIC_TICK_PERIOD_MS`: beat period in milliseconds (default 500)
//! - `TIC_QUEUE_CAPACITY`: per-connection inbound queue size (default 64)
//!
//! Authentication settings live in [`crate::api::auth::JwtAuth::from_env`].

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default beat period (0.5 seconds)
pub const TICK_PERIOD: Duration = Duration::from_millis(500);

/// Default bounded queue size for each connection
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// When set, store and channel layer are backed by redis
    pub redis_url: Option<String>,
    pub tick_period: Duration,
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            redis_url: None,
            tick_period: TICK_PERIOD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("TIC_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("TIC_BIND_ADDR: {}", e)))?;

        let redis_url = lookup("TIC_REDIS_URL").filter(|url| !url.trim().is_empty());

        let tick_period = match lookup("TIC_TICK_PERIOD_MS") {
            Some(raw) => {
                let millis = raw
                    .parse::<u64>()
                    .map_err(|e| Error::Config(format!("TIC_TICK_PERIOD_MS: {}", e)))?;
                if millis == 0 {
                    return Err(Error::Config(
                        "TIC_TICK_PERIOD_MS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_millis(millis)
            }
            None => TICK_PERIOD,
        };

        let queue_capacity = match lookup("TIC_QUEUE_CAPACITY") {
            Some(raw) => {
                let capacity = raw
                    .parse::<usize>()
                    .map_err(|e| Error::Config(format!("TIC_QUEUE_CAPACITY: {}", e)))?;
                if capacity == 0 {
                    return Err(Error::Config(
                        "TIC_QUEUE_CAPACITY must be greater than zero".to_string(),
                    ));
                }
                capacity
            }
            None => DEFAULT_QUEUE_CAPACITY,
        };

        Ok(Self {
            bind_addr,
            redis_url,
            tick_period,
            queue_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8000");
        assert_eq!(config.tick_period, Duration::from_millis(500));
        assert_eq!(config.queue_capacity, 64);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("TIC_BIND_ADDR", "0.0.0.0:9000"),
            ("TIC_REDIS_URL", "redis://127.0.0.1:6379"),
            ("TIC_TICK_PERIOD_MS", "250"),
            ("TIC_QUEUE_CAPACITY", "8"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.tick_period, Duration::from_millis(250));
        assert_eq!(config.queue_capacity, 8);
    }

    #[test]
    fn test_blank_redis_url_is_ignored() {
        let config = Config::from_lookup(lookup_from(&[("TIC_REDIS_URL", "  ")])).unwrap();
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("TIC_TICK_PERIOD_MS", "0")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("TIC_TICK_PERIOD_MS", "fast")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("TIC_BIND_ADDR", "nowhere")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("TIC_QUEUE_CAPACITY", "0")])),
            Err(Error::Config(_))
        ));
    }
}
