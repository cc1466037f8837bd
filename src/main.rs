//! tic server - Binary Entry Point

use anyhow::Context;
use tic_broadcast::{Config, JwtAuth, TicServer};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tic_broadcast=info,tower_http=info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;
    let auth = JwtAuth::from_env().context("invalid authentication settings")?;

    tracing::info!(
        version = tic_broadcast::VERSION,
        tick_period_ms = config.tick_period.as_millis() as u64,
        redis = config.redis_url.is_some(),
        "Starting {}",
        tic_broadcast::NAME
    );

    let server = TicServer::build(config, auth)
        .await
        .context("failed to connect backends")?;
    server.run().await?;

    Ok(())
}
