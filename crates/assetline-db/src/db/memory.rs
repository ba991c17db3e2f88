//! In-memory stores
//!
//! Used by tests and local development. The asset store serializes
//! transactions behind one async mutex (a table lock); staged writes become
//! visible only on commit.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use assetline_core::models::{
    Asset, AssetListQuery, AssetMetadata, AssetPatch, AssetStatus, CorrelationKey, NewAsset,
    Owner, PlatformData, SortDirection,
};
use assetline_core::{AppError, PageCursor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::store::{
    asset_not_found, metadata_not_found, owners_remain, version_mismatch, AssetStore,
    AssetTransaction, MetadataStore,
};

type AssetTable = HashMap<Uuid, Asset>;

#[derive(Clone, Default)]
pub struct MemoryAssetStore {
    rows: Arc<Mutex<AssetTable>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed row, bypassing creation rules. Test fixtures only.
    pub async fn insert_raw(&self, asset: Asset) {
        self.rows.lock().await.insert(asset.id, asset);
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

fn sort_key(asset: &Asset, query: &AssetListQuery) -> PageCursor {
    PageCursor::from_asset(asset, query.order_by)
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn begin(&self) -> Result<Box<dyn AssetTransaction>, AppError> {
        let guard = self.rows.clone().lock_owned().await;
        Ok(Box::new(MemoryAssetTransaction {
            guard,
            staged: HashMap::new(),
        }))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn find_by_correlation(&self, key: &CorrelationKey) -> Result<Option<Asset>, AppError> {
        let rows = self.rows.lock().await;
        let found = match key {
            CorrelationKey::InternalId(id) => rows.get(id),
            CorrelationKey::ExternalUploadId(upload_id) => rows
                .values()
                .find(|a| a.external_upload_id.as_deref() == Some(upload_id.as_str())),
            CorrelationKey::ExternalAssetId(asset_id) => rows
                .values()
                .find(|a| a.external_asset_id.as_deref() == Some(asset_id.as_str())),
        };
        Ok(found.cloned())
    }

    async fn find_by_external_asset_ids(&self, ids: &[String]) -> Result<Vec<Asset>, AppError> {
        let rows = self.rows.lock().await;
        let mut found: Vec<Asset> = rows
            .values()
            .filter(|a| {
                a.external_asset_id
                    .as_ref()
                    .is_some_and(|ext| ids.contains(ext))
            })
            .cloned()
            .collect();
        found.sort_by_key(|a| a.id);
        Ok(found)
    }

    async fn list(&self, query: &AssetListQuery) -> Result<Vec<Asset>, AppError> {
        let rows = self.rows.lock().await;
        let mut matching: Vec<&Asset> = rows
            .values()
            .filter(|a| query.scope.matches(a) && query.filter.matches(a))
            .filter(|a| {
                query
                    .after
                    .as_ref()
                    .is_none_or(|cursor| cursor.admits(a, query.direction))
            })
            .collect();

        matching.sort_by(|a, b| {
            let (ka, kb) = (sort_key(a, query), sort_key(b, query));
            let ord = (&ka.value, ka.id).cmp(&(&kb.value, kb.id));
            match query.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        Ok(matching
            .into_iter()
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn create(&self, asset: NewAsset) -> Result<Asset, AppError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&asset.id) {
            return Err(AppError::AlreadyExists(format!(
                "asset {} already exists",
                asset.id
            )));
        }
        let duplicate_external = rows.values().any(|existing| {
            (asset.external_upload_id.is_some()
                && existing.external_upload_id == asset.external_upload_id)
                || (asset.external_asset_id.is_some()
                    && existing.external_asset_id == asset.external_asset_id)
        });
        if duplicate_external {
            return Err(AppError::AlreadyExists(
                "external platform id is already linked to another asset".to_string(),
            ));
        }
        let asset = asset.into_asset();
        rows.insert(asset.id, asset.clone());
        Ok(asset)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.rows.lock().await.remove(&id).is_some())
    }

    async fn list_broken_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Asset>, AppError> {
        let rows = self.rows.lock().await;
        let mut broken: Vec<Asset> = rows
            .values()
            .filter(|a| a.status == AssetStatus::Broken && a.updated_at < cutoff)
            .cloned()
            .collect();
        broken.sort_by_key(|a| (a.updated_at, a.id));
        broken.truncate(limit as usize);
        Ok(broken)
    }
}

/// Holds the table lock for its whole lifetime. `None` in `staged` marks a delete.
pub struct MemoryAssetTransaction {
    guard: OwnedMutexGuard<AssetTable>,
    staged: HashMap<Uuid, Option<Asset>>,
}

impl MemoryAssetTransaction {
    fn current(&self, id: Uuid) -> Option<Asset> {
        match self.staged.get(&id) {
            Some(staged) => staged.clone(),
            None => self.guard.get(&id).cloned(),
        }
    }
}

#[async_trait]
impl AssetTransaction for MemoryAssetTransaction {
    async fn lock(&mut self, id: Uuid) -> Result<Option<Asset>, AppError> {
        Ok(self.current(id))
    }

    async fn apply(&mut self, id: Uuid, patch: AssetPatch) -> Result<Asset, AppError> {
        let mut asset = self.current(id).ok_or_else(|| asset_not_found(id))?;
        if patch.is_empty() {
            return Ok(asset);
        }
        patch.apply_to(&mut asset, Utc::now());
        if (asset.status == AssetStatus::Archived) != asset.deleted_at.is_some() {
            return Err(AppError::Internal(format!(
                "asset {} would break the deleted_at/status constraint",
                id
            )));
        }
        self.staged.insert(id, Some(asset.clone()));
        Ok(asset)
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), AppError> {
        if self.current(id).is_none() {
            return Err(asset_not_found(id));
        }
        self.staged.insert(id, None);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryAssetTransaction { mut guard, staged } = *self;
        for (id, row) in staged {
            match row {
                Some(asset) => {
                    guard.insert(id, asset);
                }
                None => {
                    guard.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    documents: Arc<RwLock<HashMap<Uuid, AssetMetadata>>>,
    platform_data: Arc<RwLock<HashMap<Uuid, PlatformData>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create(&self, metadata: &AssetMetadata) -> Result<(), AppError> {
        let mut docs = self.documents.write().await;
        if docs.contains_key(&metadata.asset_id) {
            return Err(AppError::AlreadyExists(format!(
                "metadata for asset {} already exists",
                metadata.asset_id
            )));
        }
        docs.insert(metadata.asset_id, metadata.clone());
        Ok(())
    }

    async fn get(&self, asset_id: Uuid) -> Result<Option<AssetMetadata>, AppError> {
        Ok(self.documents.read().await.get(&asset_id).cloned())
    }

    async fn get_many(&self, asset_ids: &[Uuid]) -> Result<HashMap<Uuid, AssetMetadata>, AppError> {
        let docs = self.documents.read().await;
        Ok(asset_ids
            .iter()
            .filter_map(|id| docs.get(id).map(|m| (*id, m.clone())))
            .collect())
    }

    async fn replace_owners(
        &self,
        asset_id: Uuid,
        owners: &BTreeSet<Owner>,
        expected_version: i64,
    ) -> Result<AssetMetadata, AppError> {
        let mut docs = self.documents.write().await;
        let doc = docs
            .get_mut(&asset_id)
            .ok_or_else(|| metadata_not_found(asset_id))?;
        if doc.version != expected_version {
            return Err(version_mismatch(asset_id, expected_version));
        }
        doc.owners = owners.clone();
        doc.version += 1;
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn update_title(
        &self,
        asset_id: Uuid,
        title: Option<String>,
    ) -> Result<AssetMetadata, AppError> {
        let mut docs = self.documents.write().await;
        let doc = docs
            .get_mut(&asset_id)
            .ok_or_else(|| metadata_not_found(asset_id))?;
        doc.title = title;
        doc.version += 1;
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn get_platform_data(&self, asset_id: Uuid) -> Result<Option<PlatformData>, AppError> {
        Ok(self.platform_data.read().await.get(&asset_id).cloned())
    }

    async fn upsert_platform_data(
        &self,
        asset_id: Uuid,
        data: &PlatformData,
    ) -> Result<(), AppError> {
        self.platform_data
            .write()
            .await
            .insert(asset_id, data.clone());
        Ok(())
    }

    async fn delete(&self, asset_id: Uuid) -> Result<bool, AppError> {
        let mut docs = self.documents.write().await;
        if docs.get(&asset_id).is_some_and(AssetMetadata::has_owners) {
            return Err(owners_remain(asset_id));
        }
        let removed = docs.remove(&asset_id).is_some();
        self.platform_data.write().await.remove(&asset_id);
        Ok(removed)
    }
}
