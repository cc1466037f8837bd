//! Process bootstrap
//!
//! Wires the store and channel layer, starts the tick publisher on its own
//! scheduler, and serves the HTTP/WebSocket router until shutdown. The
//! publisher runs independently of any connection: it ticks with zero
//! clients attached and keeps ticking as clients come and go.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::api::{create_router, AppState, JwtAuth};
use crate::channels::{GroupRegistry, InMemoryRegistry, RedisChannelLayer};
use crate::config::Config;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::scheduler::Scheduler;
use crate::store::{MemoryStore, RedisStore, SharedStore};

/// Fully wired server, ready to serve
pub struct TicServer {
    config: Config,
    state: Arc<AppState>,
    redis_layer: Option<Arc<RedisChannelLayer>>,
}

impl TicServer {
    /// Connect the backends named by `config`.
    ///
    /// With `redis_url` set, both the store and the channel layer go through
    /// redis so several processes share one group and one current value.
    pub async fn build(config: Config, auth: JwtAuth) -> Result<Self> {
        let store: Arc<dyn SharedStore>;
        let registry: Arc<dyn GroupRegistry>;
        let mut redis_layer = None;

        match &config.redis_url {
            Some(url) => {
                store = Arc::new(RedisStore::connect(url).await?);
                let layer = RedisChannelLayer::connect(url, InMemoryRegistry::new()).await?;
                registry = layer.clone();
                redis_layer = Some(layer);
                info!("Using redis store and channel layer");
            }
            None => {
                store = Arc::new(MemoryStore::new());
                registry = Arc::new(InMemoryRegistry::new());
                info!("Using in-process store and channel layer");
            }
        }

        Ok(Self::with_backends(config, store, registry, auth).with_redis_layer(redis_layer))
    }

    /// Server over caller-provided backends
    pub fn with_backends(
        config: Config,
        store: Arc<dyn SharedStore>,
        registry: Arc<dyn GroupRegistry>,
        auth: JwtAuth,
    ) -> Self {
        let state = AppState::new(registry, store, Arc::new(auth))
            .with_queue_capacity(config.queue_capacity);

        Self {
            config,
            state: Arc::new(state),
            redis_layer: None,
        }
    }

    fn with_redis_layer(mut self, redis_layer: Option<Arc<RedisChannelLayer>>) -> Self {
        self.redis_layer = redis_layer;
        self
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// The tick publisher starts before the first request is accepted and is
    /// stopped after the HTTP server has drained.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let publisher = Publisher::new(self.state.store.clone(), self.state.registry.clone())
            .with_group(self.state.group.clone())
            .with_key(self.state.key.clone());
        let scheduler = Scheduler::new(self.config.tick_period)?.start(Arc::new(publisher));

        info!(addr = %listener.local_addr()?, "tic server listening");

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        scheduler.shutdown().await;
        if let Some(layer) = &self.redis_layer {
            layer.shutdown();
        }

        if let Err(e) = &served {
            error!(error = %e, "HTTP server error");
        }
        info!("tic server shut down");
        served.map_err(Into::into)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
