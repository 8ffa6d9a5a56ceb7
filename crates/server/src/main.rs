//! Watch party server — WebSocket coordinator.
//!
//! Optional env: HOST, PORT, BROADCAST_CAPACITY, EVENT_QUEUE_CAPACITY,
//! PING_INTERVAL_SECS, RUST_LOG

use tracing_subscriber::EnvFilter;

use watchparty_server::{api, config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env();
    let addr = config
        .bind_addr()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {}", e))?;

    let state = api::AppState::new(config);
    let app = api::router(state);

    tracing::info!("Watch party server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
