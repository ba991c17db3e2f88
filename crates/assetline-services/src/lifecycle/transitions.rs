use assetline_core::models::{
    Asset, AssetMetadata, AssetPatch, AssetStatus, AuditTrailOptions, PatchField,
};
use assetline_core::{ensure_legal, AppError, LifecycleOp};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::AssetLifecycleService;
use crate::saga::{Saga, StepPolicy};

/// What an upstream deletion did, per asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpstreamDeletionReport {
    pub archived: Vec<Uuid>,
    /// Already archived by this very event; only the metadata purge was re-run.
    pub already_processed: Vec<Uuid>,
    pub metadata_purged: usize,
}

fn owners_block(id: Uuid, count: usize, action: &str) -> AppError {
    AppError::Conflict(format!(
        "asset {} still has {} owner(s); remove them before {}",
        id, count, action
    ))
}

fn archive_patch(audit: &AuditTrailOptions) -> AssetPatch {
    let now = Utc::now();
    AssetPatch {
        status: PatchField::Set(AssetStatus::Archived),
        deleted_at: PatchField::Set(now),
        archived_by: PatchField::Set(audit.record(now)),
        archive_event_id: audit
            .event_id
            .clone()
            .filter(|e| !e.trim().is_empty())
            .map(PatchField::Set)
            .unwrap_or_default(),
        ..Default::default()
    }
}

impl AssetLifecycleService {
    /// Archive an owner-less asset. A Broken asset first has any owners left
    /// over from an interrupted release withdrawn. After commit every owner
    /// service is asked to drop anything it still holds for the asset.
    #[tracing::instrument(skip(self, audit), fields(actor_id = %audit.actor_id))]
    pub async fn archive(&self, id: Uuid, audit: AuditTrailOptions) -> Result<Asset, AppError> {
        let asset = self.load(id).await?;
        if asset.status == AssetStatus::Broken {
            self.release_owners(&asset).await?;
        }

        let archived = self.archive_row(id, &audit).await?;
        tracing::info!(asset_id = %id, from = %asset.status, "Asset archived");

        self.reconciler
            .force_delete_all(&[archived.asset_ref()])
            .await?;
        Ok(archived)
    }

    /// The owner check runs while the row is locked. Owner writes re-check the
    /// status under the same lock after their write, so one of the two always
    /// sees the other.
    async fn archive_row(&self, id: Uuid, audit: &AuditTrailOptions) -> Result<Asset, AppError> {
        let mut tx = self.assets.begin().await?;
        let current = match tx.lock(id).await {
            Ok(Some(asset)) => asset,
            Ok(None) => {
                tx.rollback().await?;
                return Err(AppError::NotFound(format!("asset {} not found", id)));
            }
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        if let Err(e) = ensure_legal(LifecycleOp::Archive, current.status) {
            tx.rollback().await?;
            return Err(e);
        }
        let owners = match self.current_owners(id).await {
            Ok(owners) => owners,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        if !owners.is_empty() {
            tx.rollback().await?;
            return Err(owners_block(id, owners.len(), "archiving"));
        }

        let archived = match tx.apply(id, archive_patch(audit)).await {
            Ok(asset) => asset,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        tx.commit().await?;
        Ok(archived)
    }

    /// Mark an asset broken and withdraw its owners.
    #[tracing::instrument(skip(self, audit), fields(actor_id = %audit.actor_id))]
    pub async fn mark_as_broken(
        &self,
        id: Uuid,
        audit: AuditTrailOptions,
    ) -> Result<Asset, AppError> {
        let (_, broken) = self
            .transition(id, LifecycleOp::MarkAsBroken, |_| {
                let now = Utc::now();
                Ok(AssetPatch {
                    status: PatchField::Set(AssetStatus::Broken),
                    marked_as_broken_by: PatchField::Set(audit.record(now)),
                    ..Default::default()
                })
            })
            .await?;

        self.release_owners(&broken).await?;
        Ok(broken)
    }

    /// Bring an archived asset back. Owners are left as they are. The archiving
    /// event id is kept so a redelivered deletion event stays a no-op.
    #[tracing::instrument(skip(self, audit), fields(actor_id = %audit.actor_id))]
    pub async fn restore(&self, id: Uuid, audit: AuditTrailOptions) -> Result<Asset, AppError> {
        let (_, restored) = self
            .transition(id, LifecycleOp::Restore, |_| {
                let now = Utc::now();
                Ok(AssetPatch {
                    status: PatchField::Set(AssetStatus::Active),
                    deleted_at: PatchField::Clear,
                    archived_by: PatchField::Clear,
                    restored_by: PatchField::Set(audit.record(now)),
                    ..Default::default()
                })
            })
            .await?;

        // An upstream deletion purges the document; a restored asset needs one again.
        if self.metadata.get(id).await?.is_none() {
            let document =
                AssetMetadata::new(id, None, None, Default::default(), restored.updated_at);
            match self.metadata.create(&document).await {
                Ok(()) | Err(AppError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(restored)
    }

    /// Destroy an archived asset: canonical row, remote asset, then metadata.
    ///
    /// The canonical delete is not undone if the remote delete fails; the
    /// metadata is still purged and the remote failure is returned afterwards.
    #[tracing::instrument(skip(self, audit), fields(actor_id = %audit.actor_id))]
    pub async fn permanently_delete(
        &self,
        id: Uuid,
        audit: AuditTrailOptions,
    ) -> Result<(), AppError> {
        let owners = self.current_owners(id).await?;
        if !owners.is_empty() {
            return Err(owners_block(id, owners.len(), "deleting"));
        }

        let mut saga = Saga::new("permanent_delete", id);
        let asset = saga
            .required("delete_canonical_row", self.delete_archived_row(id))
            .await?;

        if let Some(remote_id) = asset.remote_id() {
            let remote_id = remote_id.to_string();
            saga.step("delete_remote_asset", StepPolicy::ContinueOnError, async {
                self.platform
                    .delete_remote_asset(&remote_id, asset.resource_type)
                    .await
                    .map_err(AppError::from)
            })
            .await?;
        }

        saga.required("delete_metadata", self.metadata.delete(id))
            .await?;

        tracing::info!(asset_id = %id, actor_id = %audit.actor_id, "Asset permanently deleted");
        saga.finish()
    }

    async fn delete_archived_row(&self, id: Uuid) -> Result<Asset, AppError> {
        let mut tx = self.assets.begin().await?;
        let asset = match tx.lock(id).await {
            Ok(Some(asset)) => asset,
            Ok(None) => {
                tx.rollback().await?;
                return Err(AppError::NotFound(format!("asset {} not found", id)));
            }
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        if let Err(e) = ensure_legal(LifecycleOp::PermanentDelete, asset.status) {
            tx.rollback().await?;
            return Err(e);
        }
        if let Err(e) = tx.delete(id).await {
            tx.rollback().await?;
            return Err(e);
        }
        tx.commit().await?;
        Ok(asset)
    }

    /// Handle a "deleted upstream" event for `assets`.
    ///
    /// Per asset: withdraw owners, archive with `event_id`, purge metadata. An
    /// asset already archived by `event_id` only gets the purge re-run, unless it
    /// has been restored since, in which case it is left alone. Every asset is
    /// attempted; the first failure is returned at the end.
    #[tracing::instrument(skip(self, assets), fields(event_id = %event_id, count = assets.len()))]
    pub async fn archive_from_upstream(
        &self,
        assets: Vec<Asset>,
        event_id: &str,
    ) -> Result<UpstreamDeletionReport, AppError> {
        let mut report = UpstreamDeletionReport::default();
        let mut first_error = None;

        for asset in assets {
            let id = asset.id;
            let already_processed = asset.archive_event_id.as_deref() == Some(event_id);
            let result = if already_processed && asset.status != AssetStatus::Archived {
                tracing::info!(asset_id = %id, event_id, status = %asset.status, "Deletion event predates a restore, skipping");
                Ok(false)
            } else if already_processed {
                self.metadata.delete(id).await
            } else {
                self.archive_one_from_upstream(&asset, event_id).await
            };

            match result {
                Ok(purged) => {
                    if already_processed {
                        report.already_processed.push(id);
                    } else {
                        report.archived.push(id);
                    }
                    if purged {
                        report.metadata_purged += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(asset_id = %id, event_id, error = %e, "Upstream deletion failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn archive_one_from_upstream(&self, asset: &Asset, event_id: &str) -> Result<bool, AppError> {
        let mut saga = Saga::new("upstream_deletion", asset.id);

        saga.required("release_owners", self.release_owners(asset))
            .await?;
        saga.required("archive", self.archive_for_event(asset.id, event_id))
            .await?;
        let purged = saga
            .required("purge_metadata", self.metadata.delete(asset.id))
            .await?;

        saga.finish()?;
        Ok(purged)
    }

    /// Archive on behalf of the platform. A row that is already archived is left
    /// as it is.
    async fn archive_for_event(&self, id: Uuid, event_id: &str) -> Result<(), AppError> {
        let audit = AuditTrailOptions::platform_event(event_id).with_note("deleted upstream");
        let applied = self
            .apply_locked(id, |current| {
                if current.status == AssetStatus::Archived {
                    return Ok(AssetPatch::default());
                }
                ensure_legal(LifecycleOp::Archive, current.status)?;
                Ok(archive_patch(&audit))
            })
            .await?;

        if applied.changed() {
            tracing::info!(asset_id = %id, event_id, from = %applied.before.status, "Asset archived after upstream deletion");
        } else {
            tracing::debug!(asset_id = %id, event_id, "Asset already archived");
        }
        Ok(())
    }
}
