//! Router test harness: the full axum router over in-memory stores, a fake
//! media platform and a single `users` owner service.
//!
//! Run from workspace root: `cargo test -p assetline-api`.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetline_api::setup::routes::router;
use assetline_api::state::{AppState, HealthState};
use assetline_core::models::{AssetRef, OwnerType, ResourceType};
use assetline_core::CursorCodec;
use assetline_db::{MemoryAssetStore, MemoryMetadataStore};
use assetline_owners::{OwnerClientRegistry, OwnerServiceClient, OwnerServiceResult};
use assetline_platform::{
    MediaPlatform, PlatformResult, RemoteAsset, UploadCredential, UploadCredentialRequest,
    WebhookSigner,
};
use assetline_services::{
    AssetLifecycleService, CleanupService, CleanupSettings, LifecycleSettings, OwnerReconciler,
    WebhookPipeline,
};
use async_trait::async_trait;
use axum_test::TestServer;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_api_test";
pub const ACTOR: &str = "admin-7";

pub fn api_path(path: &str) -> String {
    format!("{}{}", assetline_api::constants::API_PREFIX, path)
}

pub struct FakePlatform {
    signer: WebhookSigner,
    issued: AtomicUsize,
}

#[async_trait]
impl MediaPlatform for FakePlatform {
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
        _external_id: &str,
        _resource_type: ResourceType,
    ) -> PlatformResult<()> {
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
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Owner service that remembers `(asset, owner)` pairs.
#[derive(Default)]
pub struct UsersService {
    pub held: Mutex<HashSet<(Uuid, String)>>,
}

impl UsersService {
    pub fn holds(&self, asset_id: Uuid, owner_id: &str) -> bool {
        self.held
            .lock()
            .unwrap()
            .contains(&(asset_id, owner_id.to_string()))
    }
}

#[async_trait]
impl OwnerServiceClient for UsersService {
    async fn add_batch(
        &self,
        asset: &AssetRef,
        owner_ids: &[String],
        _owner_type: &OwnerType,
    ) -> OwnerServiceResult<u64> {
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
        self.held
            .lock()
            .unwrap()
            .remove(&(asset.asset_id, owner_id.to_string()));
        Ok(())
    }

    async fn force_delete_batch(&self, assets: &[AssetRef]) -> OwnerServiceResult<u64> {
        let ids: HashSet<Uuid> = assets.iter().map(|a| a.asset_id).collect();
        let mut held = self.held.lock().unwrap();
        let before = held.len();
        held.retain(|(id, _)| !ids.contains(id));
        Ok((before - held.len()) as u64)
    }

    fn name(&self) -> &str {
        "users"
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub users: Arc<UsersService>,
    signer: WebhookSigner,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Sign `body` the way the platform does; returns `(payload, signature, timestamp)`.
    pub fn sign(&self, body: &serde_json::Value) -> (Vec<u8>, String, String) {
        let payload = serde_json::to_vec(body).unwrap();
        let ts = chrono::Utc::now().timestamp();
        let signature = self.signer.sign(&payload, ts);
        (payload, signature, ts.to_string())
    }

    /// POST a begin-upload as the test actor and return the new asset id.
    pub async fn create_asset(&self, owners: serde_json::Value) -> Uuid {
        let response = self
            .server
            .post(&api_path("/assets"))
            .add_header("x-actor-id", ACTOR)
            .json(&serde_json::json!({
                "resource_type": "video",
                "title": "Intro",
                "owners": owners
            }))
            .await;
        assert_eq!(response.status_code(), 201);
        let body: serde_json::Value = response.json();
        body["asset"]["id"].as_str().unwrap().parse().unwrap()
    }
}

pub async fn setup_test_app() -> TestApp {
    let users = Arc::new(UsersService::default());
    let registry = OwnerClientRegistry::new();
    registry
        .register(OwnerType::new("users").unwrap(), users.clone())
        .await;

    let lifecycle = Arc::new(AssetLifecycleService::new(
        Arc::new(MemoryAssetStore::new()),
        Arc::new(MemoryMetadataStore::new()),
        Arc::new(FakePlatform {
            signer: WebhookSigner::new(WEBHOOK_SECRET),
            issued: AtomicUsize::new(0),
        }),
        Arc::new(OwnerReconciler::new(registry, 2)),
        CursorCodec::new("api-test-cursor-secret"),
        LifecycleSettings {
            upload_folder: "assets".to_string(),
            default_page_size: 2,
            max_page_size: 10,
        },
    ));
    let webhooks = Arc::new(WebhookPipeline::new(
        lifecycle.clone(),
        Duration::from_secs(300),
    ));
    let cleanup = Arc::new(CleanupService::new(
        lifecycle.clone(),
        CleanupSettings {
            broken_retention: chrono::Duration::hours(72),
            upload_folder: "assets".to_string(),
            orphan_sweep_delete: false,
            batch_size: 10,
        },
    ));

    let state = AppState::new(lifecycle, webhooks, Some(cleanup), HealthState::default());
    let server = TestServer::new(router(state)).expect("Failed to create test server");

    TestApp {
        server,
        users,
        signer: WebhookSigner::new(WEBHOOK_SECRET),
    }
}
