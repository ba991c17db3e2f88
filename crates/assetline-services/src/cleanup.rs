//! Periodic sweeper
//!
//! Archives assets that stayed Broken past the retention period and looks for
//! remote assets in the upload folder that no canonical row points at.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use assetline_core::models::{AuditTrailOptions, ResourceType};
use assetline_core::{AppError, Config};
use assetline_platform::RemoteAsset;
use chrono::Utc;
use serde::Serialize;
use tokio::time::interval;
use uuid::Uuid;

use crate::lifecycle::AssetLifecycleService;

const BROKEN_BATCH_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct CleanupSettings {
    pub broken_retention: chrono::Duration,
    pub upload_folder: String,
    /// Delete orphans instead of only reporting them.
    pub orphan_sweep_delete: bool,
    pub batch_size: u32,
}

impl CleanupSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            broken_retention: chrono::Duration::hours(config.broken_retention_hours),
            upload_folder: config.platform.upload_folder.clone(),
            orphan_sweep_delete: config.orphan_sweep_delete,
            batch_size: BROKEN_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub broken_archived: usize,
    pub orphans_found: Vec<String>,
    pub orphans_deleted: usize,
}

#[derive(Clone)]
pub struct CleanupService {
    lifecycle: Arc<AssetLifecycleService>,
    settings: CleanupSettings,
}

impl CleanupService {
    pub fn new(lifecycle: Arc<AssetLifecycleService>, settings: CleanupSettings) -> Self {
        Self {
            lifecycle,
            settings,
        }
    }

    /// Start the background sweep. Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);

            loop {
                ticker.tick().await;
                tracing::info!("Starting scheduled cleanup");
                let report = self.run_once().await;
                tracing::info!(
                    broken_archived = report.broken_archived,
                    orphans_found = report.orphans_found.len(),
                    orphans_deleted = report.orphans_deleted,
                    "Cleanup completed"
                );
            }
        })
    }

    /// One full sweep. Each part logs its own failure and the other still runs.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        match self.archive_stale_broken().await {
            Ok(count) => report.broken_archived = count,
            Err(e) => tracing::error!(error = %e, "Failed to archive stale broken assets"),
        }

        match self.sweep_orphans().await {
            Ok((found, deleted)) => {
                report.orphans_found = found;
                report.orphans_deleted = deleted;
            }
            Err(e) => tracing::error!(error = %e, "Orphan sweep failed"),
        }
        report
    }

    #[tracing::instrument(skip(self), fields(cleanup.operation = "archive_broken"))]
    async fn archive_stale_broken(&self) -> Result<usize, AppError> {
        let cutoff = Utc::now() - self.settings.broken_retention;
        let stale = self
            .lifecycle
            .assets()
            .list_broken_before(cutoff, self.settings.batch_size)
            .await?;

        let mut archived = 0;
        for asset in stale {
            let audit = AuditTrailOptions::sweeper(format!(
                "broken for more than {} hours",
                self.settings.broken_retention.num_hours()
            ));
            match self.lifecycle.archive(asset.id, audit).await {
                Ok(_) => {
                    tracing::info!(asset_id = %asset.id, broken_since = %asset.updated_at, "Archived stale broken asset");
                    archived += 1;
                }
                Err(e) => {
                    tracing::error!(asset_id = %asset.id, error = %e, "Failed to archive broken asset")
                }
            }
        }
        Ok(archived)
    }

    /// Remote assets in the upload folder with no canonical row.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "orphans", folder = %self.settings.upload_folder))]
    async fn sweep_orphans(&self) -> Result<(Vec<String>, usize), AppError> {
        let remote = self
            .lifecycle
            .platform()
            .list_assets_in_folder(&self.settings.upload_folder)
            .await?;
        if remote.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let ids: Vec<String> = remote.iter().map(|r| r.id.clone()).collect();
        let known: HashSet<String> = self
            .lifecycle
            .assets()
            .find_by_external_asset_ids(&ids)
            .await?
            .into_iter()
            .filter_map(|a| a.external_asset_id)
            .collect();

        let mut orphans = Vec::new();
        for candidate in remote.into_iter().filter(|r| !known.contains(&r.id)) {
            if self.linked_by_passthrough(&candidate).await? {
                continue;
            }
            tracing::warn!(external_id = %candidate.id, "Remote asset has no canonical row");
            orphans.push(candidate);
        }

        let mut deleted = 0;
        if self.settings.orphan_sweep_delete {
            for orphan in &orphans {
                let Some(resource_type) = orphan.resource_type else {
                    tracing::warn!(external_id = %orphan.id, "Skipping orphan with unknown resource type");
                    continue;
                };
                match self.delete_orphan(&orphan.id, resource_type).await {
                    Ok(()) => deleted += 1,
                    Err(e) => {
                        tracing::error!(external_id = %orphan.id, error = %e, "Failed to delete orphan")
                    }
                }
            }
        }

        Ok((orphans.into_iter().map(|o| o.id).collect(), deleted))
    }

    /// A row created before the platform assigned its asset id is found by passthrough.
    async fn linked_by_passthrough(&self, remote: &RemoteAsset) -> Result<bool, AppError> {
        let Some(id) = remote
            .passthrough
            .as_deref()
            .and_then(|p| Uuid::parse_str(p.trim()).ok())
        else {
            return Ok(false);
        };
        Ok(self.lifecycle.assets().get(id).await?.is_some())
    }

    async fn delete_orphan(&self, external_id: &str, resource_type: ResourceType) -> Result<(), AppError> {
        self.lifecycle
            .platform()
            .delete_remote_asset(external_id, resource_type)
            .await?;
        tracing::info!(external_id, resource_type = %resource_type, "Deleted orphaned remote asset");
        Ok(())
    }
}
