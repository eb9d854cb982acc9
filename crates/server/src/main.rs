mod config;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use common::logger;
use engine::SignalProcessor;
use exchange::{GatewayProvider, HttpGatewayRegistry};

use crate::config::Config;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::setup_logger();

    let config = Config::from_env()?;
    info!(bind_addr = %config.bind_addr, db = %config.database_path, "starting signalbot");

    let pool = storage::db::connect(&config.database_path)
        .await
        .context("opening database")?;

    let provider: Arc<dyn GatewayProvider> = Arc::new(HttpGatewayRegistry::new(
        config.coinbase_base_url.clone(),
        config.gateway_timeout,
    ));

    let state = Arc::new(AppState {
        pool: pool.clone(),
        processor: SignalProcessor::new(pool, provider.clone(), config.gateway_timeout),
        provider,
        gateway_timeout: config.gateway_timeout,
        admin_api_token: config.admin_api_token.clone(),
        public_base_url: config.public_base_url.clone(),
    });

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
    }
}
