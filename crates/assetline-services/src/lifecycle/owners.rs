use std::collections::BTreeSet;

use assetline_core::models::{Asset, AssetMetadata, AuditTrailOptions, Owner, OwnerType};
use assetline_core::validation::validate_title;
use assetline_core::{
    diff_owners, ensure_legal, group_owners, AppError, GroupedOwners, LifecycleOp, OwnerDiff,
};
use uuid::Uuid;

use super::{AssetLifecycleService, MAX_OWNER_WRITE_ATTEMPTS};
use crate::reconcile::ReconcileReport;

/// Owner set before and after a compare-and-swap write.
struct OwnerChange {
    before: BTreeSet<Owner>,
    after: AssetMetadata,
}

impl OwnerChange {
    fn diff(&self) -> OwnerDiff {
        diff_owners(&group_owners(&self.before), &group_owners(&self.after.owners))
    }
}

fn lost_race(id: Uuid) -> AppError {
    AppError::Conflict(format!(
        "owners of asset {} kept changing concurrently ({} attempts); try again",
        id, MAX_OWNER_WRITE_ATTEMPTS
    ))
}

impl AssetLifecycleService {
    /// Read, change, compare-and-swap. `change` returns `None` to leave the set
    /// as it is. Re-reads and re-applies `change` when another writer got there first.
    async fn mutate_owners<F>(&self, id: Uuid, mut change: F) -> Result<OwnerChange, AppError>
    where
        F: FnMut(&BTreeSet<Owner>) -> Result<Option<BTreeSet<Owner>>, AppError> + Send,
    {
        for attempt in 1..=MAX_OWNER_WRITE_ATTEMPTS {
            let current = self.load_metadata(id).await?;
            let Some(next) = change(&current.owners)? else {
                return Ok(OwnerChange {
                    before: current.owners.clone(),
                    after: current,
                });
            };

            match self
                .metadata
                .replace_owners(id, &next, current.version)
                .await
            {
                Ok(after) => {
                    return Ok(OwnerChange {
                        before: current.owners,
                        after,
                    })
                }
                Err(AppError::Conflict(_)) => {
                    tracing::debug!(asset_id = %id, attempt, "Owner write lost a race, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(lost_race(id))
    }

    /// Fails before anything is written when an owner's type has no owner service.
    pub(super) async fn ensure_routable<'a, I>(&self, owners: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = &'a Owner>,
    {
        let types: BTreeSet<&OwnerType> = owners.into_iter().map(|o| &o.owner_type).collect();
        for owner_type in types {
            if !self.reconciler.registry().contains(owner_type).await {
                return Err(AppError::InvalidArgument(format!(
                    "no owner service handles owner type '{}'",
                    owner_type
                )));
            }
        }
        Ok(())
    }

    /// Re-read the status under the row lock after an owner write. If the asset
    /// left the states where `op` is legal in the meantime, the previous set is
    /// put back and the write fails.
    async fn confirm_still_live(
        &self,
        id: Uuid,
        op: LifecycleOp,
        change: &OwnerChange,
    ) -> Result<(), AppError> {
        if change.before == change.after.owners {
            return Ok(());
        }

        let mut tx = self.assets.begin().await?;
        let locked = tx.lock(id).await;
        tx.rollback().await?;
        let verdict = match locked? {
            Some(asset) => ensure_legal(op, asset.status),
            None => Err(AppError::NotFound(format!("asset {} not found", id))),
        };
        let Err(e) = verdict else {
            return Ok(());
        };

        match self
            .metadata
            .replace_owners(id, &change.before, change.after.version)
            .await
        {
            Ok(_) => {
                tracing::warn!(asset_id = %id, op = %op, "Asset changed state during owner write; write reverted")
            }
            Err(revert) => {
                tracing::error!(asset_id = %id, op = %op, error = %revert, "Failed to revert owner write")
            }
        }
        Err(e)
    }

    #[tracing::instrument(skip(self, audit), fields(owner = %owner, actor_id = %audit.actor_id))]
    pub async fn add_owner(
        &self,
        id: Uuid,
        owner: Owner,
        audit: AuditTrailOptions,
    ) -> Result<AssetMetadata, AppError> {
        let asset = self.load(id).await?;
        ensure_legal(LifecycleOp::AddOwner, asset.status)?;
        self.ensure_routable([&owner]).await?;

        let change = self
            .mutate_owners(id, |owners| {
                if owners.contains(&owner) {
                    return Err(AppError::AlreadyExists(format!(
                        "asset {} is already owned by {}",
                        id, owner
                    )));
                }
                let mut next = owners.clone();
                next.insert(owner.clone());
                Ok(Some(next))
            })
            .await?;
        self.confirm_still_live(id, LifecycleOp::AddOwner, &change)
            .await?;

        self.reconciler.add_one(&asset.asset_ref(), &owner).await?;
        tracing::info!(asset_id = %id, owner = %owner, "Owner added");
        Ok(change.after)
    }

    #[tracing::instrument(skip(self, audit), fields(owner = %owner, actor_id = %audit.actor_id))]
    pub async fn remove_owner(
        &self,
        id: Uuid,
        owner: Owner,
        audit: AuditTrailOptions,
    ) -> Result<AssetMetadata, AppError> {
        let asset = self.load(id).await?;
        ensure_legal(LifecycleOp::RemoveOwner, asset.status)?;

        let change = self
            .mutate_owners(id, |owners| {
                if !owners.contains(&owner) {
                    return Err(AppError::NotFound(format!(
                        "asset {} is not owned by {}",
                        id, owner
                    )));
                }
                let mut next = owners.clone();
                next.remove(&owner);
                Ok(Some(next))
            })
            .await?;

        self.reconciler.delete_one(&asset.asset_ref(), &owner).await?;
        tracing::info!(asset_id = %id, owner = %owner, "Owner removed");
        Ok(change.after)
    }

    /// Replace the owner set and push the difference, one batch per owner type.
    #[tracing::instrument(skip(self, owners, audit), fields(requested = owners.len(), actor_id = %audit.actor_id))]
    pub async fn set_owners(
        &self,
        id: Uuid,
        owners: BTreeSet<Owner>,
        audit: AuditTrailOptions,
    ) -> Result<AssetMetadata, AppError> {
        let asset = self.load(id).await?;
        ensure_legal(LifecycleOp::SetOwners, asset.status)?;
        self.ensure_routable(&owners).await?;

        let change = self
            .mutate_owners(id, |current| {
                Ok((current != &owners).then(|| owners.clone()))
            })
            .await?;
        self.confirm_still_live(id, LifecycleOp::SetOwners, &change)
            .await?;

        let diff = change.diff();
        if !diff.is_empty() {
            let report = self.reconciler.reconcile(&asset.asset_ref(), &diff).await?;
            tracing::info!(
                asset_id = %id,
                added = report.added,
                deleted = report.deleted,
                "Owners replaced"
            );
        }
        Ok(change.after)
    }

    /// Announce every stored owner again. Used to re-drive a reconciliation that
    /// failed after the owner set was already written.
    #[tracing::instrument(skip(self))]
    pub async fn resync_owners(&self, id: Uuid) -> Result<ReconcileReport, AppError> {
        let asset = self.load(id).await?;
        ensure_legal(LifecycleOp::SetOwners, asset.status)?;

        let owners = self.current_owners(id).await?;
        let diff = diff_owners(&GroupedOwners::new(), &group_owners(&owners));
        self.reconciler.reconcile(&asset.asset_ref(), &diff).await
    }

    #[tracing::instrument(skip(self, title, audit), fields(actor_id = %audit.actor_id))]
    pub async fn update_title(
        &self,
        id: Uuid,
        title: Option<String>,
        audit: AuditTrailOptions,
    ) -> Result<AssetMetadata, AppError> {
        self.load(id).await?;
        let title = match title {
            Some(t) => {
                validate_title(&t)?;
                Some(t.trim().to_string())
            }
            None => None,
        };
        self.metadata.update_title(id, title).await
    }

    /// Withdraw every owner of `asset` from the owner services, then clear the
    /// stored set. Notifying first keeps the owners on record until the owner
    /// services have acknowledged, so a failed run is simply repeated.
    /// Returns how many owners were released.
    pub async fn release_owners(&self, asset: &Asset) -> Result<usize, AppError> {
        for attempt in 1..=MAX_OWNER_WRITE_ATTEMPTS {
            let Some(current) = self.metadata.get(asset.id).await? else {
                return Ok(0);
            };
            if current.owners.is_empty() {
                return Ok(0);
            }

            let diff = OwnerDiff::remove_all(&current.owners);
            self.reconciler.reconcile(&asset.asset_ref(), &diff).await?;

            match self
                .metadata
                .replace_owners(asset.id, &BTreeSet::new(), current.version)
                .await
            {
                Ok(_) => {
                    tracing::info!(asset_id = %asset.id, released = current.owners.len(), "Owners released");
                    return Ok(current.owners.len());
                }
                Err(AppError::Conflict(_)) => {
                    tracing::debug!(asset_id = %asset.id, attempt, "Owner release lost a race, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(lost_race(asset.id))
    }
}
