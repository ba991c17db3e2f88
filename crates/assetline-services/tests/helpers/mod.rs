//! Test helpers: an engine wired over in-memory stores with scripted
//! collaborators.
//!
//! Run from workspace root: `cargo test -p assetline-services`.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetline_core::models::{
    Asset, AssetMetadata, AssetRef, AuditTrailOptions, BeginUploadRequest, Owner, OwnerType,
    PlatformData, ResourceType,
};
use assetline_core::{AppError, CursorCodec};
use assetline_db::{MemoryAssetStore, MemoryMetadataStore, MetadataStore};
use assetline_owners::{
    OwnerClientRegistry, OwnerServiceClient, OwnerServiceError, OwnerServiceResult,
};
use assetline_platform::{
    MediaPlatform, PlatformResult, RemoteAsset, UploadCredential, UploadCredentialRequest,
    WebhookSigner,
};
use assetline_services::{
    AssetLifecycleService, LifecycleSettings, OwnerReconciler, WebhookOutcome, WebhookPipeline,
};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const CURSOR_SECRET: &str = "cursor-secret-for-tests";
pub const UPLOAD_FOLDER: &str = "assets";

/// Media platform double. Upload ids are `up_<n>`; remote deletes are recorded.
pub struct ScriptedPlatform {
    signer: WebhookSigner,
    issued: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub remote: Mutex<Vec<RemoteAsset>>,
    pub fail_deletes: AtomicBool,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self {
            signer: WebhookSigner::new(WEBHOOK_SECRET),
            issued: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
            remote: Mutex::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn set_remote(&self, assets: Vec<RemoteAsset>) {
        *self.remote.lock().unwrap() = assets;
    }
}

#[async_trait]
impl MediaPlatform for ScriptedPlatform {
    async fn issue_upload_credential(
        &self,
        request: &UploadCredentialRequest,
    ) -> PlatformResult<UploadCredential> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadCredential {
            upload_url: format!("https://upload.test/{}", request.passthrough),
            external_upload_id: format!("up_{n}"),
            external_asset_id: None,
        })
    }

    async fn delete_remote_asset(
        &self,
        external_id: &str,
        _resource_type: ResourceType,
    ) -> PlatformResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(assetline_platform::PlatformError::Transport(
                "connection reset".to_string(),
            ));
        }
        self.deleted.lock().unwrap().push(external_id.to_string());
        Ok(())
    }

    fn verify_signature(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
        validity_window: Duration,
    ) -> bool {
        self.signer
            .verify(payload, signature, timestamp, validity_window)
    }

    async fn list_assets_in_folder(&self, _folder: &str) -> PlatformResult<Vec<RemoteAsset>> {
        Ok(self.remote.lock().unwrap().clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Owner service double that keeps the associations it was told about and
/// counts every call.
pub struct CountingOwnerClient {
    name: String,
    pub held: Mutex<HashSet<(Uuid, String)>>,
    pub calls: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl CountingOwnerClient {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            held: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn held_for(&self, asset_id: Uuid) -> BTreeSet<String> {
        self.held
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == asset_id)
            .map(|(_, owner)| owner.clone())
            .collect()
    }

    fn enter(&self, call: String) -> OwnerServiceResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(OwnerServiceError::unavailable(&self.name, "service down"));
        }
        Ok(())
    }
}

#[async_trait]
impl OwnerServiceClient for CountingOwnerClient {
    async fn add_batch(
        &self,
        asset: &AssetRef,
        owner_ids: &[String],
        _owner_type: &OwnerType,
    ) -> OwnerServiceResult<u64> {
        self.enter(format!("add_batch:{}", owner_ids.join(",")))?;
        let mut held = self.held.lock().unwrap();
        Ok(owner_ids
            .iter()
            .filter(|o| held.insert((asset.asset_id, o.to_string())))
            .count() as u64)
    }

    async fn delete_batch(
        &self,
        asset: &AssetRef,
        owner_ids: &[String],
        _owner_type: &OwnerType,
    ) -> OwnerServiceResult<u64> {
        self.enter(format!("delete_batch:{}", owner_ids.join(",")))?;
        let mut held = self.held.lock().unwrap();
        Ok(owner_ids
            .iter()
            .filter(|o| held.remove(&(asset.asset_id, o.to_string())))
            .count() as u64)
    }

    async fn add(
        &self,
        asset: &AssetRef,
        owner_id: &str,
        _owner_type: &OwnerType,
    ) -> OwnerServiceResult<()> {
        self.enter(format!("add:{owner_id}"))?;
        self.held
            .lock()
            .unwrap()
            .insert((asset.asset_id, owner_id.to_string()));
        Ok(())
    }

    async fn delete(
        &self,
        asset: &AssetRef,
        owner_id: &str,
        _owner_type: &OwnerType,
    ) -> OwnerServiceResult<()> {
        self.enter(format!("delete:{owner_id}"))?;
        self.held
            .lock()
            .unwrap()
            .remove(&(asset.asset_id, owner_id.to_string()));
        Ok(())
    }

    async fn force_delete_batch(&self, assets: &[AssetRef]) -> OwnerServiceResult<u64> {
        self.enter(format!("force_delete_batch:{}", assets.len()))?;
        let ids: HashSet<Uuid> = assets.iter().map(|a| a.asset_id).collect();
        let mut held = self.held.lock().unwrap();
        let before = held.len();
        held.retain(|(id, _)| !ids.contains(id));
        Ok((before - held.len()) as u64)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Metadata store whose `create` can be made to fail, and which can commit a
/// canonical row change right before the next owner write lands.
#[derive(Default)]
pub struct FailingMetadataStore {
    inner: MemoryMetadataStore,
    pub fail_create: AtomicBool,
    before_owner_write: Mutex<Option<(Arc<MemoryAssetStore>, Asset)>>,
}

impl FailingMetadataStore {
    pub fn archive_before_next_owner_write(&self, assets: Arc<MemoryAssetStore>, archived: Asset) {
        *self.before_owner_write.lock().unwrap() = Some((assets, archived));
    }
}

#[async_trait]
impl MetadataStore for FailingMetadataStore {
    async fn create(&self, metadata: &AssetMetadata) -> Result<(), AppError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::Internal("metadata store unreachable".to_string()));
        }
        self.inner.create(metadata).await
    }

    async fn get(&self, asset_id: Uuid) -> Result<Option<AssetMetadata>, AppError> {
        self.inner.get(asset_id).await
    }

    async fn get_many(&self, asset_ids: &[Uuid]) -> Result<HashMap<Uuid, AssetMetadata>, AppError> {
        self.inner.get_many(asset_ids).await
    }

    async fn replace_owners(
        &self,
        asset_id: Uuid,
        owners: &BTreeSet<Owner>,
        expected_version: i64,
    ) -> Result<AssetMetadata, AppError> {
        let pending = self.before_owner_write.lock().unwrap().take();
        if let Some((assets, row)) = pending {
            assets.insert_raw(row).await;
        }
        self.inner
            .replace_owners(asset_id, owners, expected_version)
            .await
    }

    async fn update_title(
        &self,
        asset_id: Uuid,
        title: Option<String>,
    ) -> Result<AssetMetadata, AppError> {
        self.inner.update_title(asset_id, title).await
    }

    async fn get_platform_data(&self, asset_id: Uuid) -> Result<Option<PlatformData>, AppError> {
        self.inner.get_platform_data(asset_id).await
    }

    async fn upsert_platform_data(
        &self,
        asset_id: Uuid,
        data: &PlatformData,
    ) -> Result<(), AppError> {
        self.inner.upsert_platform_data(asset_id, data).await
    }

    async fn delete(&self, asset_id: Uuid) -> Result<bool, AppError> {
        self.inner.delete(asset_id).await
    }
}

/// Engine over in-memory stores with owner types `users` and `groups`.
pub struct TestEngine {
    pub lifecycle: Arc<AssetLifecycleService>,
    pub pipeline: WebhookPipeline,
    pub assets: Arc<MemoryAssetStore>,
    pub metadata: Arc<FailingMetadataStore>,
    pub platform: Arc<ScriptedPlatform>,
    pub users: Arc<CountingOwnerClient>,
    pub groups: Arc<CountingOwnerClient>,
    signer: WebhookSigner,
}

pub async fn setup_engine() -> TestEngine {
    setup_engine_with(LifecycleSettings {
        upload_folder: UPLOAD_FOLDER.to_string(),
        default_page_size: 2,
        max_page_size: 5,
    })
    .await
}

pub async fn setup_engine_with(settings: LifecycleSettings) -> TestEngine {
    let assets = Arc::new(MemoryAssetStore::new());
    let metadata = Arc::new(FailingMetadataStore::default());
    let platform = Arc::new(ScriptedPlatform::new());
    let users = CountingOwnerClient::new("users");
    let groups = CountingOwnerClient::new("groups");

    let registry = OwnerClientRegistry::new();
    registry
        .register(OwnerType::new("users").unwrap(), users.clone())
        .await;
    registry
        .register(OwnerType::new("groups").unwrap(), groups.clone())
        .await;

    let lifecycle = Arc::new(AssetLifecycleService::new(
        assets.clone(),
        metadata.clone(),
        platform.clone(),
        Arc::new(OwnerReconciler::new(registry, 4)),
        CursorCodec::new(CURSOR_SECRET),
        settings,
    ));
    let pipeline = WebhookPipeline::new(lifecycle.clone(), Duration::from_secs(300));

    TestEngine {
        lifecycle,
        pipeline,
        assets,
        metadata,
        platform,
        users,
        groups,
        signer: WebhookSigner::new(WEBHOOK_SECRET),
    }
}

pub fn admin() -> AuditTrailOptions {
    AuditTrailOptions::admin("admin-1", "Ada Admin")
}

pub fn owner(owner_type: &str, id: &str) -> Owner {
    Owner::parse(owner_type, id).unwrap()
}

pub fn upload_request(owners: Vec<Owner>) -> BeginUploadRequest {
    BeginUploadRequest {
        resource_type: ResourceType::Video,
        title: Some("Launch video".to_string()),
        creator_id: Some("creator-1".to_string()),
        owners,
        cors_origin: None,
        audit: admin(),
    }
}

impl TestEngine {
    /// Begin an upload and return the new asset id.
    pub async fn create_asset(&self, owners: Vec<Owner>) -> Uuid {
        self.lifecycle
            .begin_upload(upload_request(owners))
            .await
            .unwrap()
            .asset
            .id
    }

    /// Begin an upload and drive it to Active through an `asset.ready` event.
    pub async fn create_active_asset(&self, owners: Vec<Owner>) -> (Uuid, String) {
        let id = self.create_asset(owners).await;
        let external_id = format!("ext_{}", id.simple());
        self.deliver(&serde_json::json!({
            "id": format!("evt_ready_{}", id.simple()),
            "type": "asset.ready",
            "data": {"id": external_id, "passthrough": id.to_string(), "status": "ready"}
        }))
        .await
        .unwrap();
        (id, external_id)
    }

    /// Sign `body` with the current time and run it through the pipeline.
    pub async fn deliver(&self, body: &serde_json::Value) -> Result<WebhookOutcome, AppError> {
        let payload = serde_json::to_vec(body).unwrap();
        let ts = Utc::now().timestamp();
        let signature = self.signer.sign(&payload, ts);
        self.pipeline
            .handle(&payload, Some(&signature), Some(&ts.to_string()))
            .await
    }
}
