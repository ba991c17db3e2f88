//! Webhook pipeline: verification, resolution, idempotent patching and side effects.
//!
//! Run with: `cargo test -p assetline-services --test webhook_test`

mod helpers;

use assetline_core::models::{AssetStatus, PLATFORM_ACTOR_ID};
use assetline_core::AppError;
use assetline_db::{AssetStore, MetadataStore};
use assetline_services::WebhookStage;
use chrono::Utc;
use helpers::{owner, setup_engine};
use serde_json::json;

#[tokio::test]
async fn test_ready_event_activates_and_redelivery_is_a_no_op() {
    let engine = setup_engine().await;
    let id = engine.create_asset(vec![]).await;
    let event = json!({
        "id": "evt_1",
        "type": "asset.ready",
        "data": {
            "id": "ext_1",
            "passthrough": id.to_string(),
            "status": "ready",
            "duration": 31.5,
            "width": 1920,
            "height": 1080
        }
    });

    let first = engine.deliver(&event).await.unwrap();
    assert_eq!(first.stage, WebhookStage::SideEffectsApplied);
    assert_eq!(first.asset_ids, vec![id]);
    assert!(first.changed_fields.contains(&"status"));

    let asset = engine.assets.get(id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Active);
    assert_eq!(asset.external_asset_id.as_deref(), Some("ext_1"));
    assert_eq!(asset.attributes.width, Some(1920));
    let updated_at = asset.updated_at;

    let second = engine.deliver(&event).await.unwrap();
    assert!(second.changed_fields.is_empty());
    assert!(!second.ignored);
    assert_eq!(
        engine.assets.get(id).await.unwrap().unwrap().updated_at,
        updated_at
    );
}

#[tokio::test]
async fn test_unsigned_or_forged_deliveries_are_rejected() {
    let engine = setup_engine().await;
    let payload = br#"{"id":"evt_x","type":"asset.ready","data":{}}"#;
    let ts = Utc::now().timestamp().to_string();

    let missing = engine.pipeline.handle(payload, None, Some(&ts)).await;
    assert!(matches!(missing, Err(AppError::PermissionDenied(_))));

    let forged = engine
        .pipeline
        .handle(payload, Some("v1=deadbeef"), Some(&ts))
        .await;
    assert!(matches!(forged, Err(AppError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_argument() {
    let engine = setup_engine().await;
    let payload = b"not json";
    let ts = Utc::now().timestamp();
    let signature = assetline_platform::WebhookSigner::new(helpers::WEBHOOK_SECRET)
        .sign(payload, ts);

    let result = engine
        .pipeline
        .handle(payload, Some(&signature), Some(&ts.to_string()))
        .await;
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_unknown_type_and_unknown_asset_are_acknowledged() {
    let engine = setup_engine().await;

    let unknown_type = engine
        .deliver(&json!({"id": "evt_2", "type": "live_stream.idle", "data": {"id": "ls_1"}}))
        .await
        .unwrap();
    assert!(unknown_type.ignored);

    let unknown_asset = engine
        .deliver(&json!({"id": "evt_3", "type": "asset.updated", "data": {"id": "ext_missing"}}))
        .await
        .unwrap();
    assert!(unknown_asset.ignored);
    assert_eq!(unknown_asset.stage, WebhookStage::SignatureVerified);
}

#[tokio::test]
async fn test_upload_event_links_platform_asset_id() {
    let engine = setup_engine().await;
    let id = engine.create_asset(vec![]).await;

    engine
        .deliver(&json!({
            "id": "evt_4",
            "type": "upload.asset_created",
            "data": {"id": "up_1", "asset_id": "ext_44", "status": "asset_created"}
        }))
        .await
        .unwrap();

    let asset = engine.assets.get(id).await.unwrap().unwrap();
    assert_eq!(asset.external_asset_id.as_deref(), Some("ext_44"));
    assert_eq!(asset.attributes.upload_status.as_deref(), Some("asset_created"));
    assert_eq!(asset.status, AssetStatus::UploadUrlGenerated);
}

#[tokio::test]
async fn test_errored_event_marks_broken_and_releases_owners() {
    let engine = setup_engine().await;
    let (id, external_id) = engine
        .create_active_asset(vec![owner("users", "u1"), owner("groups", "g1")])
        .await;

    engine
        .deliver(&json!({
            "id": "evt_5",
            "type": "asset.errored",
            "data": {"id": external_id, "errors": {"type": "invalid_input", "messages": ["bad codec"]}}
        }))
        .await
        .unwrap();

    let asset = engine.assets.get(id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Broken);
    assert_eq!(
        asset.marked_as_broken_by.unwrap().actor_id,
        PLATFORM_ACTOR_ID
    );
    assert!(engine.users.held_for(id).is_empty());
    assert!(engine.groups.held_for(id).is_empty());
    assert!(!engine.metadata.get(id).await.unwrap().unwrap().has_owners());
}

#[tokio::test]
async fn test_tracks_are_stored_apart_and_only_when_changed() {
    let engine = setup_engine().await;
    let (id, external_id) = engine.create_active_asset(vec![]).await;
    let event = json!({
        "id": "evt_6",
        "type": "asset.tracks_updated",
        "data": {
            "id": external_id,
            "tracks": [{"type": "video", "max_width": 1920}],
            "playback_ids": [{"id": "pb_1", "policy": "public"}]
        }
    });

    let first = engine.deliver(&event).await.unwrap();
    assert!(first.changed_fields.contains(&"platform_data"));
    let stored = engine.metadata.get_platform_data(id).await.unwrap().unwrap();
    assert_eq!(stored.tracks.len(), 1);
    assert_eq!(stored.playback_ids[0].id, "pb_1");

    let second = engine.deliver(&event).await.unwrap();
    assert!(second.changed_fields.is_empty());
}

#[tokio::test]
async fn test_upstream_deletion_archives_and_purges_once() {
    let engine = setup_engine().await;
    let (first, first_ext) = engine
        .create_active_asset(vec![owner("users", "u1")])
        .await;
    let (second, second_ext) = engine.create_active_asset(vec![]).await;
    let event = json!({
        "id": "evt_del",
        "type": "asset.deleted",
        "data": {"deleted_ids": [first_ext, second_ext]}
    });

    let outcome = engine.deliver(&event).await.unwrap();
    assert_eq!(outcome.stage, WebhookStage::SideEffectsApplied);
    assert_eq!(outcome.asset_ids.len(), 2);

    for id in [first, second] {
        let asset = engine.assets.get(id).await.unwrap().unwrap();
        assert_eq!(asset.status, AssetStatus::Archived);
        assert_eq!(asset.archive_event_id.as_deref(), Some("evt_del"));
        assert!(engine.metadata.get(id).await.unwrap().is_none());
    }
    assert!(engine.users.held_for(first).is_empty());

    // Redelivery changes nothing and still succeeds
    let archived_at = engine
        .assets
        .get(first)
        .await
        .unwrap()
        .unwrap()
        .deleted_at;
    engine.deliver(&event).await.unwrap();
    assert_eq!(
        engine.assets.get(first).await.unwrap().unwrap().deleted_at,
        archived_at
    );
}

#[tokio::test]
async fn test_restore_after_upstream_deletion_recreates_metadata() {
    let engine = setup_engine().await;
    let (id, external_id) = engine.create_active_asset(vec![]).await;
    engine
        .deliver(&json!({"id": "evt_d", "type": "asset.deleted", "data": {"id": external_id}}))
        .await
        .unwrap();
    assert!(engine.metadata.get(id).await.unwrap().is_none());

    engine
        .lifecycle
        .restore(id, helpers::admin())
        .await
        .unwrap();
    let metadata = engine.metadata.get(id).await.unwrap().unwrap();
    assert!(metadata.owners.is_empty());

    // The old deletion event arriving again leaves the restored asset alone
    engine
        .deliver(&json!({"id": "evt_d", "type": "asset.deleted", "data": {"id": external_id}}))
        .await
        .unwrap();
    let asset = engine.assets.get(id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Active);
    assert!(engine.metadata.get(id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_upstream_deletion_sends_one_batch_per_owner_type() {
    let engine = setup_engine().await;
    let (id, external_id) = engine
        .create_active_asset(vec![
            owner("users", "u1"),
            owner("users", "u2"),
            owner("groups", "g1"),
        ])
        .await;
    let event = json!({"id": "evt_multi", "type": "asset.deleted", "data": {"id": external_id}});

    engine.deliver(&event).await.unwrap();

    let count = |calls: Vec<String>, prefix: &str| {
        calls.iter().filter(|c| c.starts_with(prefix)).count()
    };
    assert_eq!(count(engine.users.calls(), "delete_batch:"), 1);
    assert!(engine.users.calls().contains(&"delete_batch:u1,u2".to_string()));
    assert_eq!(count(engine.groups.calls(), "delete_batch:"), 1);
    assert!(engine.users.held_for(id).is_empty());
    assert!(engine.groups.held_for(id).is_empty());

    let users_calls = engine.users.calls().len();
    let groups_calls = engine.groups.calls().len();
    engine.deliver(&event).await.unwrap();
    assert_eq!(engine.users.calls().len(), users_calls);
    assert_eq!(engine.groups.calls().len(), groups_calls);
}

#[tokio::test]
async fn test_errored_redelivery_makes_no_owner_calls() {
    let engine = setup_engine().await;
    let (id, external_id) = engine
        .create_active_asset(vec![owner("users", "u1")])
        .await;
    let event = json!({
        "id": "evt_err",
        "type": "asset.errored",
        "data": {"id": external_id, "errors": {"type": "invalid_input", "messages": ["bad codec"]}}
    });

    engine.deliver(&event).await.unwrap();
    let calls = engine.users.calls().len();
    let broken_at = engine.assets.get(id).await.unwrap().unwrap().updated_at;

    engine.deliver(&event).await.unwrap();

    assert_eq!(engine.users.calls().len(), calls);
    let asset = engine.assets.get(id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Broken);
    assert_eq!(asset.updated_at, broken_at);
}
