//! Asset lifecycle orchestration
//!
//! [`AssetLifecycleService`] is the only writer of assets. Each operation checks
//! its preconditions, changes the canonical row inside one canonical-store
//! transaction, and only after commit touches the metadata store, the owner
//! services and the media platform. Post-commit steps are re-driven from stored
//! state, so repeating an operation after a partial failure converges.

mod owners;
mod transitions;

use std::collections::BTreeSet;
use std::sync::Arc;

use assetline_core::models::{
    Asset, AssetListQuery, AssetMetadata, AssetPage, AssetPatch, AssetView, BeginUploadRequest,
    BeginUploadResponse, ListAssetsRequest, NewAsset, Owner,
};
use assetline_core::validation::{normalize_page_size, validate_title};
use assetline_core::{
    diff_owners, ensure_legal, group_owners, AppError, Config, CursorCodec, GroupedOwners,
    LifecycleOp, PageCursor,
};
use assetline_db::{AssetStore, MetadataStore};
use assetline_platform::{MediaPlatform, UploadCredentialRequest};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::reconcile::OwnerReconciler;

pub use transitions::UpstreamDeletionReport;

/// Owner mutations re-read and re-diff this many times before giving up.
const MAX_OWNER_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub upload_folder: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl LifecycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_folder: config.platform.upload_folder.clone(),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            upload_folder: "assets".to_string(),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

pub struct AssetLifecycleService {
    assets: Arc<dyn AssetStore>,
    metadata: Arc<dyn MetadataStore>,
    platform: Arc<dyn MediaPlatform>,
    reconciler: Arc<OwnerReconciler>,
    cursor: CursorCodec,
    settings: LifecycleSettings,
}

impl AssetLifecycleService {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        metadata: Arc<dyn MetadataStore>,
        platform: Arc<dyn MediaPlatform>,
        reconciler: Arc<OwnerReconciler>,
        cursor: CursorCodec,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            assets,
            metadata,
            platform,
            reconciler,
            cursor,
            settings,
        }
    }

    pub fn assets(&self) -> &Arc<dyn AssetStore> {
        &self.assets
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn platform(&self) -> &Arc<dyn MediaPlatform> {
        &self.platform
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Create the asset: platform credential, canonical row, then metadata.
    /// A failed metadata write removes the canonical row again.
    #[tracing::instrument(skip(self, request), fields(resource_type = %request.resource_type, actor_id = %request.audit.actor_id))]
    pub async fn begin_upload(
        &self,
        request: BeginUploadRequest,
    ) -> Result<BeginUploadResponse, AppError> {
        request.validate()?;
        if let Some(title) = &request.title {
            validate_title(title)?;
        }
        let owners = request.owner_set();
        self.ensure_routable(&owners).await?;

        let id = Uuid::now_v7();
        let now = Utc::now();
        let credential = self
            .platform
            .issue_upload_credential(&UploadCredentialRequest {
                passthrough: id,
                resource_type: request.resource_type,
                folder: self.settings.upload_folder.clone(),
                cors_origin: request.cors_origin.clone(),
            })
            .await?;

        let asset = self
            .assets
            .create(NewAsset {
                id,
                resource_type: request.resource_type,
                external_asset_id: credential.external_asset_id.clone(),
                external_upload_id: Some(credential.external_upload_id.clone()),
                created_by: request.audit.record(now),
                created_at: now,
            })
            .await?;

        let document = AssetMetadata::new(
            id,
            request.title.as_ref().map(|t| t.trim().to_string()),
            request.creator_id.clone(),
            owners.clone(),
            now,
        );
        if let Err(e) = self.metadata.create(&document).await {
            tracing::error!(asset_id = %id, error = %e, "Metadata write failed, removing canonical row");
            if let Err(undo) = self.assets.delete(id).await {
                tracing::error!(asset_id = %id, error = %undo, "Compensation failed; canonical row left without metadata");
            }
            return Err(e);
        }

        if !owners.is_empty() {
            let diff = diff_owners(&GroupedOwners::new(), &group_owners(&owners));
            self.reconciler.reconcile(&asset.asset_ref(), &diff).await?;
        }

        tracing::info!(asset_id = %id, owners = owners.len(), "Upload started");
        Ok(BeginUploadResponse {
            asset,
            upload_url: credential.upload_url,
        })
    }

    pub async fn get_asset(&self, id: Uuid) -> Result<AssetView, AppError> {
        let asset = self.load(id).await?;
        let metadata = self.metadata.get(id).await?;
        Ok(AssetView { asset, metadata })
    }

    /// One page of assets with their metadata attached.
    #[tracing::instrument(skip(self, request), fields(scope = ?request.scope, order_by = %request.order_by))]
    pub async fn list_assets(&self, request: ListAssetsRequest) -> Result<AssetPage, AppError> {
        let page_size = normalize_page_size(
            request.page_size,
            self.settings.default_page_size,
            self.settings.max_page_size,
        );
        let after = self
            .cursor
            .decode_for(request.page_token.as_deref(), request.order_by)?;

        let mut rows = self
            .assets
            .list(&AssetListQuery {
                scope: request.scope,
                filter: request.filter,
                order_by: request.order_by,
                direction: request.direction,
                after,
                limit: page_size + 1,
            })
            .await?;

        let has_more = rows.len() > page_size as usize;
        rows.truncate(page_size as usize);
        let next_page_token = match rows.last() {
            Some(last) if has_more => self
                .cursor
                .encode(&PageCursor::from_asset(last, request.order_by))?,
            _ => String::new(),
        };

        let ids: Vec<Uuid> = rows.iter().map(|a| a.id).collect();
        let mut documents = self.metadata.get_many(&ids).await?;
        let assets = rows
            .into_iter()
            .map(|asset| {
                let metadata = documents.remove(&asset.id);
                AssetView { asset, metadata }
            })
            .collect();

        Ok(AssetPage {
            assets,
            next_page_token,
        })
    }

    async fn load(&self, id: Uuid) -> Result<Asset, AppError> {
        self.assets
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("asset {} not found", id)))
    }

    async fn load_metadata(&self, id: Uuid) -> Result<AssetMetadata, AppError> {
        self.metadata
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("metadata for asset {} not found", id)))
    }

    /// Lock the row, build a patch from the locked state and apply it. An empty
    /// patch rolls back and leaves the row untouched.
    pub async fn apply_locked<F>(&self, id: Uuid, build: F) -> Result<AppliedPatch, AppError>
    where
        F: FnOnce(&Asset) -> Result<AssetPatch, AppError> + Send,
    {
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

        let patch = match build(&current) {
            Ok(patch) => patch,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        if patch.is_empty() {
            tx.rollback().await?;
            return Ok(AppliedPatch {
                after: current.clone(),
                before: current,
                changed_fields: Vec::new(),
            });
        }

        let changed_fields = patch.changed_fields();
        let updated = match tx.apply(id, patch).await {
            Ok(asset) => asset,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        tx.commit().await?;

        Ok(AppliedPatch {
            before: current,
            after: updated,
            changed_fields,
        })
    }

    /// [`apply_locked`](Self::apply_locked) guarded by the legality table.
    async fn transition<F>(
        &self,
        id: Uuid,
        op: LifecycleOp,
        build: F,
    ) -> Result<(Asset, Asset), AppError>
    where
        F: FnOnce(&Asset) -> Result<AssetPatch, AppError> + Send,
    {
        let applied = self
            .apply_locked(id, move |current| {
                ensure_legal(op, current.status)?;
                build(current)
            })
            .await?;

        tracing::info!(
            asset_id = %id,
            op = %op,
            from = %applied.before.status,
            to = %applied.after.status,
            "Asset transitioned"
        );
        Ok((applied.before, applied.after))
    }

    /// Owners of `id`, empty when the metadata document is gone.
    async fn current_owners(&self, id: Uuid) -> Result<BTreeSet<Owner>, AppError> {
        Ok(self
            .metadata
            .get(id)
            .await?
            .map(|m| m.owners)
            .unwrap_or_default())
    }
}

/// Result of [`AssetLifecycleService::apply_locked`].
#[derive(Debug, Clone)]
pub struct AppliedPatch {
    pub before: Asset,
    pub after: Asset,
    /// Empty when nothing was written.
    pub changed_fields: Vec<&'static str>,
}

impl AppliedPatch {
    pub fn changed(&self) -> bool {
        !self.changed_fields.is_empty()
    }
}
