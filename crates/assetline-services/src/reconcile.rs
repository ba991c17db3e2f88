//! Owner reconciliation
//!
//! Turns an [`OwnerDiff`] into owner-service calls: one delete batch and one add
//! batch per owner type. Types run concurrently up to a bound; calls for the same
//! type always run one after the other. Per-type failures are collected and
//! reported together once every type has been attempted.

use std::collections::BTreeSet;
use std::sync::Arc;

use assetline_core::models::{AssetRef, Owner, OwnerType};
use assetline_core::{AppError, OwnerDiff};
use assetline_owners::{OwnerClientRegistry, OwnerServiceClient};
use futures::stream::{self, StreamExt};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;

/// Service name carried by aggregated reconciliation failures.
pub const RECONCILIATION_SERVICE: &str = "owner-reconciliation";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: u64,
    pub deleted: u64,
    pub batches: usize,
}

impl ReconcileReport {
    fn merge(&mut self, other: ReconcileReport) {
        self.added += other.added;
        self.deleted += other.deleted;
        self.batches += other.batches;
    }
}

pub struct OwnerReconciler {
    registry: OwnerClientRegistry,
    max_parallel_types: usize,
}

impl OwnerReconciler {
    pub fn new(registry: OwnerClientRegistry, max_parallel_types: usize) -> Self {
        Self {
            registry,
            max_parallel_types: max_parallel_types.max(1),
        }
    }

    pub fn registry(&self) -> &OwnerClientRegistry {
        &self.registry
    }

    async fn client_for(
        &self,
        owner_type: &OwnerType,
    ) -> Result<Arc<dyn OwnerServiceClient>, AppError> {
        self.registry
            .get(owner_type)
            .await
            .map_err(|e| AppError::external(RECONCILIATION_SERVICE, e.to_string()))
    }

    /// Push `diff` to the owner services. Succeeds only when every batch succeeded.
    #[tracing::instrument(skip(self, diff), fields(asset_id = %asset.asset_id, changes = diff.len()))]
    pub async fn reconcile(
        &self,
        asset: &AssetRef,
        diff: &OwnerDiff,
    ) -> Result<ReconcileReport, AppError> {
        if diff.is_empty() {
            return Ok(ReconcileReport::default());
        }

        // Each batch future owns its inputs so the whole call stays `Send`
        // when driven from a spawned task.
        let mut batches = Vec::new();
        for owner_type in diff.owner_types() {
            batches.push(TypeBatch {
                client: self.registry.get(&owner_type).await.map_err(|e| e.to_string()),
                asset: *asset,
                to_delete: non_empty(diff.to_delete.get(&owner_type)),
                to_add: non_empty(diff.to_add.get(&owner_type)),
                owner_type,
            });
        }

        let results: Vec<(OwnerType, Result<ReconcileReport, String>)> = stream::iter(batches)
            .map(TypeBatch::run)
            .buffer_unordered(self.max_parallel_types)
            .collect()
            .await;

        let mut report = ReconcileReport::default();
        let mut failures = Vec::new();
        for (owner_type, result) in results {
            match result {
                Ok(partial) => report.merge(partial),
                Err(message) => {
                    tracing::warn!(
                        asset_id = %asset.asset_id,
                        owner_type = %owner_type,
                        error = %message,
                        "Owner reconciliation batch failed"
                    );
                    failures.push(format!("{}: {}", owner_type, message));
                }
            }
        }

        if !failures.is_empty() {
            failures.sort();
            return Err(AppError::external(
                RECONCILIATION_SERVICE,
                format!(
                    "{} of {} owner types failed: {}",
                    failures.len(),
                    diff.owner_types().len(),
                    failures.join("; ")
                ),
            ));
        }

        tracing::debug!(
            asset_id = %asset.asset_id,
            added = report.added,
            deleted = report.deleted,
            batches = report.batches,
            "Owner reconciliation completed"
        );
        Ok(report)
    }

    /// Announce a single new owner.
    pub async fn add_one(&self, asset: &AssetRef, owner: &Owner) -> Result<(), AppError> {
        let client = self.client_for(&owner.owner_type).await?;
        client
            .add(asset, &owner.owner_id, &owner.owner_type)
            .await
            .map_err(AppError::from)
    }

    /// Withdraw a single owner.
    pub async fn delete_one(&self, asset: &AssetRef, owner: &Owner) -> Result<(), AppError> {
        let client = self.client_for(&owner.owner_type).await?;
        client
            .delete(asset, &owner.owner_id, &owner.owner_type)
            .await
            .map_err(AppError::from)
    }

    /// Ask every registered owner service to drop whatever it still holds for `assets`.
    #[tracing::instrument(skip(self, assets), fields(count = assets.len()))]
    pub async fn force_delete_all(&self, assets: &[AssetRef]) -> Result<u64, AppError> {
        if assets.is_empty() {
            return Ok(0);
        }

        let routes: Vec<_> = self
            .registry
            .all()
            .await
            .into_iter()
            .map(|(owner_type, client)| (owner_type, client, assets.to_vec()))
            .collect();
        let attempted = routes.len();
        let calls: Vec<BoxFuture<'static, (OwnerType, Result<u64, String>)>> = routes
            .into_iter()
            .map(|(owner_type, client, assets)| {
                async move {
                    let result = client
                        .force_delete_batch(&assets)
                        .await
                        .map_err(|e| e.to_string());
                    (owner_type, result)
                }
                .boxed()
            })
            .collect();
        let results: Vec<(OwnerType, Result<u64, String>)> = stream::iter(calls)
            .buffer_unordered(self.max_parallel_types)
            .collect()
            .await;

        let mut removed = 0;
        let mut failures = Vec::new();
        for (owner_type, result) in results {
            match result {
                Ok(count) => {
                    if count > 0 {
                        tracing::warn!(
                            owner_type = %owner_type,
                            count,
                            "Owner service still held associations for torn-down assets"
                        );
                    }
                    removed += count;
                }
                Err(message) => failures.push(format!("{}: {}", owner_type, message)),
            }
        }

        if !failures.is_empty() {
            failures.sort();
            return Err(AppError::external(
                RECONCILIATION_SERVICE,
                format!(
                    "force delete failed for {} of {} owner services: {}",
                    failures.len(),
                    attempted,
                    failures.join("; ")
                ),
            ));
        }
        Ok(removed)
    }
}

/// Pending calls for one owner type: deletes first, then adds.
struct TypeBatch {
    client: Result<Arc<dyn OwnerServiceClient>, String>,
    asset: AssetRef,
    owner_type: OwnerType,
    to_delete: Option<Vec<String>>,
    to_add: Option<Vec<String>>,
}

impl TypeBatch {
    async fn run(self) -> (OwnerType, Result<ReconcileReport, String>) {
        let result = self.send().await;
        (self.owner_type, result)
    }

    async fn send(&self) -> Result<ReconcileReport, String> {
        let client = self.client.as_ref().map_err(Clone::clone)?;
        let mut report = ReconcileReport::default();

        if let Some(ids) = &self.to_delete {
            report.deleted = client
                .delete_batch(&self.asset, ids, &self.owner_type)
                .await
                .map_err(|e| e.to_string())?;
            report.batches += 1;
        }
        if let Some(ids) = &self.to_add {
            report.added = client
                .add_batch(&self.asset, ids, &self.owner_type)
                .await
                .map_err(|e| e.to_string())?;
            report.batches += 1;
        }
        Ok(report)
    }
}

fn non_empty(ids: Option<&BTreeSet<String>>) -> Option<Vec<String>> {
    ids.filter(|ids| !ids.is_empty())
        .map(|ids| ids.iter().cloned().collect())
}
