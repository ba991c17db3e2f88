//! Service wiring

use std::sync::Arc;

use anyhow::{Context, Result};
use assetline_core::{Config, CursorCodec};
use assetline_db::{PostgresAssetStore, PostgresMetadataStore};
use assetline_owners::create_owner_registry;
use assetline_platform::create_platform;
use assetline_services::{
    AssetLifecycleService, CleanupService, CleanupSettings, LifecycleSettings, OwnerReconciler,
    WebhookPipeline,
};

use super::database::Pools;
use crate::state::{AppState, HealthState};

/// Build the lifecycle services over PostgreSQL and start the sweeper.
pub async fn initialize_services(config: &Config, pools: Pools) -> Result<AppState> {
    let platform = create_platform(config).context("Failed to create media platform client")?;
    tracing::info!(platform = platform.name(), "Media platform client ready");

    let registry = create_owner_registry(config).await?;
    let reconciler = Arc::new(OwnerReconciler::new(
        registry,
        config.reconcile_max_parallel_types,
    ));

    let lifecycle = Arc::new(AssetLifecycleService::new(
        Arc::new(PostgresAssetStore::new(pools.canonical.clone())),
        Arc::new(PostgresMetadataStore::new(pools.metadata.clone())),
        platform,
        reconciler,
        CursorCodec::new(&config.cursor_secret),
        LifecycleSettings::from_config(config),
    ));
    let webhooks = Arc::new(WebhookPipeline::new(
        lifecycle.clone(),
        config.webhook_validity_window(),
    ));

    let cleanup = Arc::new(CleanupService::new(
        lifecycle.clone(),
        CleanupSettings::from_config(config),
    ));
    match config.cleanup_interval() {
        Some(period) => {
            cleanup.clone().start(period);
            tracing::info!(
                interval_secs = period.as_secs(),
                retention_hours = config.broken_retention_hours,
                orphan_sweep_delete = config.orphan_sweep_delete,
                "Cleanup service started"
            );
        }
        None => tracing::info!("Cleanup service disabled (CLEANUP_INTERVAL_SECS=0)"),
    }

    Ok(AppState::new(
        lifecycle,
        webhooks,
        Some(cleanup),
        HealthState {
            canonical_pool: Some(pools.canonical),
            metadata_pool: Some(pools.metadata),
        },
    ))
}
