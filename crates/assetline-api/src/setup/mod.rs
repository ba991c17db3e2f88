//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use anyhow::{Context, Result};
use assetline_core::Config;

/// Validate configuration, initialize logging, connect both stores and build the router.
pub async fn initialize_app(config: Config) -> Result<axum::Router> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry().context("Failed to initialize logging")?;
    tracing::info!(
        environment = %config.environment(),
        owner_services = config.owner_services.len(),
        "Configuration loaded and validated successfully"
    );

    let pools = database::setup_databases(&config).await?;
    let state = services::initialize_services(&config, pools).await?;

    routes::setup_routes(&config, state)
}
