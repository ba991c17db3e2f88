//! Application state shared by every handler.

use std::sync::Arc;

use assetline_services::{AssetLifecycleService, CleanupService, WebhookPipeline};
use sqlx::PgPool;

/// Pools probed by the health endpoint. Empty when running over in-memory stores.
#[derive(Clone, Default)]
pub struct HealthState {
    pub canonical_pool: Option<PgPool>,
    pub metadata_pool: Option<PgPool>,
}

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<AssetLifecycleService>,
    pub webhooks: Arc<WebhookPipeline>,
    /// Present when the sweeper is configured; also backs the manual cleanup endpoint.
    pub cleanup: Option<Arc<CleanupService>>,
    pub health: HealthState,
}

impl AppState {
    pub fn new(
        lifecycle: Arc<AssetLifecycleService>,
        webhooks: Arc<WebhookPipeline>,
        cleanup: Option<Arc<CleanupService>>,
        health: HealthState,
    ) -> Self {
        Self {
            lifecycle,
            webhooks,
            cleanup,
            health,
        }
    }
}
