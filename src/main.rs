use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use estate_auth::{AuthConfigBuilder, AuthServices};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AuthConfigBuilder::new()
        .from_env()
        .build()
        .context("invalid auth configuration")?;

    estate_auth::init_tracing_with_config(&config);

    let addr = config
        .server
        .addr()
        .context("invalid server address")?;

    let services = AuthServices::builder(config)
        .build()
        .context("failed to construct auth services")?;

    let sweeper = services.rate_limiter.spawn_sweeper(SWEEP_INTERVAL);
    let purger = services.password_reset.spawn_purger(PURGE_INTERVAL);
    let app = estate_auth::router(services);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "estate-auth listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();
    purger.abort();
    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
