//! Store interfaces
//!
//! The canonical asset store is transactional; the metadata store is not and
//! never takes part in an asset transaction.

use std::collections::{BTreeSet, HashMap};

use assetline_core::models::{
    Asset, AssetListQuery, AssetMetadata, AssetPatch, CorrelationKey, NewAsset, Owner,
    PlatformData,
};
use assetline_core::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Canonical store of record for [`Asset`].
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Open a transaction. Rows read through [`AssetTransaction::lock`] stay
    /// locked until commit or rollback.
    async fn begin(&self) -> Result<Box<dyn AssetTransaction>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Asset>, AppError>;

    async fn find_by_correlation(&self, key: &CorrelationKey) -> Result<Option<Asset>, AppError>;

    async fn find_by_external_asset_ids(&self, ids: &[String]) -> Result<Vec<Asset>, AppError>;

    /// Up to `query.limit` rows strictly after `query.after`, sorted by
    /// `(order_by, id)` in `query.direction`.
    async fn list(&self, query: &AssetListQuery) -> Result<Vec<Asset>, AppError>;

    async fn create(&self, asset: NewAsset) -> Result<Asset, AppError>;

    /// Remove a row outside any lifecycle rule. Only used to undo a failed creation.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Broken assets not touched since `cutoff`, oldest first.
    async fn list_broken_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Asset>, AppError>;
}

/// One canonical-store transaction.
#[async_trait]
pub trait AssetTransaction: Send {
    /// Read and row-lock an asset.
    async fn lock(&mut self, id: Uuid) -> Result<Option<Asset>, AppError>;

    /// Apply a patch to a locked row and return the updated record.
    /// An empty patch returns the row untouched.
    async fn apply(&mut self, id: Uuid, patch: AssetPatch) -> Result<Asset, AppError>;

    async fn delete(&mut self, id: Uuid) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

/// Store of record for [`AssetMetadata`] and bulky [`PlatformData`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// `AlreadyExists` if a document is already stored for the asset.
    async fn create(&self, metadata: &AssetMetadata) -> Result<(), AppError>;

    async fn get(&self, asset_id: Uuid) -> Result<Option<AssetMetadata>, AppError>;

    async fn get_many(&self, asset_ids: &[Uuid]) -> Result<HashMap<Uuid, AssetMetadata>, AppError>;

    /// Compare-and-swap on `version`: `Conflict` when the stored version is no
    /// longer `expected_version`, `NotFound` when there is no document.
    async fn replace_owners(
        &self,
        asset_id: Uuid,
        owners: &BTreeSet<Owner>,
        expected_version: i64,
    ) -> Result<AssetMetadata, AppError>;

    async fn update_title(
        &self,
        asset_id: Uuid,
        title: Option<String>,
    ) -> Result<AssetMetadata, AppError>;

    async fn get_platform_data(&self, asset_id: Uuid) -> Result<Option<PlatformData>, AppError>;

    async fn upsert_platform_data(
        &self,
        asset_id: Uuid,
        data: &PlatformData,
    ) -> Result<(), AppError>;

    /// Delete the document and its platform data. Refuses with `Conflict` while
    /// owners remain. Returns false when nothing was stored.
    async fn delete(&self, asset_id: Uuid) -> Result<bool, AppError>;
}

pub(crate) fn owners_remain(asset_id: Uuid) -> AppError {
    AppError::Conflict(format!(
        "metadata for asset {} still has owners; clear them first",
        asset_id
    ))
}

pub(crate) fn version_mismatch(asset_id: Uuid, expected: i64) -> AppError {
    AppError::Conflict(format!(
        "metadata for asset {} changed concurrently (expected version {})",
        asset_id, expected
    ))
}

pub(crate) fn metadata_not_found(asset_id: Uuid) -> AppError {
    AppError::NotFound(format!("metadata for asset {} not found", asset_id))
}

pub(crate) fn asset_not_found(asset_id: Uuid) -> AppError {
    AppError::NotFound(format!("asset {} not found", asset_id))
}
