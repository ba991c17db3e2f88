//! Lifecycle orchestration over in-memory stores.
//!
//! Run with: `cargo test -p assetline-services --test lifecycle_test`

mod helpers;

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::Ordering;

use assetline_core::models::{AssetStatus, ListAssetsRequest};
use assetline_core::AppError;
use assetline_db::{AssetStore, MetadataStore};
use helpers::{admin, owner, setup_engine, upload_request};

#[tokio::test]
async fn test_begin_upload_writes_both_stores_and_announces_owners() {
    let engine = setup_engine().await;
    let response = engine
        .lifecycle
        .begin_upload(upload_request(vec![
            owner("users", "u2"),
            owner("users", "u1"),
            owner("groups", "g1"),
        ]))
        .await
        .unwrap();

    let asset = response.asset;
    assert_eq!(asset.status, AssetStatus::UploadUrlGenerated);
    assert_eq!(asset.external_upload_id.as_deref(), Some("up_1"));
    assert_eq!(asset.created_by.actor_id, "admin-1");
    assert!(response.upload_url.ends_with(&asset.id.to_string()));

    let metadata = engine.metadata.get(asset.id).await.unwrap().unwrap();
    assert_eq!(metadata.title.as_deref(), Some("Launch video"));
    assert_eq!(metadata.owners.len(), 3);

    // One batch per owner type
    assert_eq!(engine.users.calls(), vec!["add_batch:u1,u2"]);
    assert_eq!(engine.groups.calls(), vec!["add_batch:g1"]);
}

#[tokio::test]
async fn test_begin_upload_removes_row_when_metadata_write_fails() {
    let engine = setup_engine().await;
    engine.metadata.fail_create.store(true, Ordering::SeqCst);

    let result = engine
        .lifecycle
        .begin_upload(upload_request(vec![owner("users", "u1")]))
        .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert!(engine.assets.is_empty().await);
    assert!(engine.users.calls().is_empty());
}

#[tokio::test]
async fn test_illegal_transitions_are_conflicts() {
    let engine = setup_engine().await;
    let (id, _) = engine.create_active_asset(vec![]).await;

    assert!(matches!(
        engine.lifecycle.restore(id, admin()).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        engine.lifecycle.permanently_delete(id, admin()).await,
        Err(AppError::Conflict(_))
    ));

    engine.lifecycle.archive(id, admin()).await.unwrap();
    assert!(matches!(
        engine.lifecycle.mark_as_broken(id, admin()).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        engine
            .lifecycle
            .add_owner(id, owner("users", "u1"), admin())
            .await,
        Err(AppError::Conflict(_))
    ));
    // Row untouched by the rejected operations
    let asset = engine.assets.get(id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Archived);
    assert!(asset.marked_as_broken_by.is_none());
}

#[tokio::test]
async fn test_archive_requires_an_owner_less_asset() {
    let engine = setup_engine().await;
    let (id, _) = engine
        .create_active_asset(vec![owner("users", "u1")])
        .await;

    let blocked = engine.lifecycle.archive(id, admin()).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));
    assert_eq!(
        engine.assets.get(id).await.unwrap().unwrap().status,
        AssetStatus::Active
    );

    engine
        .lifecycle
        .set_owners(id, BTreeSet::new(), admin())
        .await
        .unwrap();
    let archived = engine.lifecycle.archive(id, admin()).await.unwrap();

    assert_eq!(archived.status, AssetStatus::Archived);
    assert!(archived.deleted_at.is_some());
    assert_eq!(archived.archived_by.unwrap().actor_name, "Ada Admin");
    // Teardown reaches every registered owner service
    assert!(engine
        .users
        .calls()
        .contains(&"force_delete_batch:1".to_string()));
    assert!(engine
        .groups
        .calls()
        .contains(&"force_delete_batch:1".to_string()));
}

#[tokio::test]
async fn test_set_owners_sends_only_the_difference() {
    let engine = setup_engine().await;
    let (id, _) = engine
        .create_active_asset(vec![owner("users", "u1"), owner("groups", "g1")])
        .await;
    engine.users.calls.lock().unwrap().clear();
    engine.groups.calls.lock().unwrap().clear();

    let requested: BTreeSet<_> = [owner("users", "u1"), owner("users", "u2")].into();
    let metadata = engine
        .lifecycle
        .set_owners(id, requested.clone(), admin())
        .await
        .unwrap();

    assert_eq!(metadata.owners, requested);
    assert_eq!(engine.users.calls(), vec!["add_batch:u2"]);
    assert_eq!(engine.groups.calls(), vec!["delete_batch:g1"]);

    // Same set again is a no-op
    engine
        .lifecycle
        .set_owners(id, requested, admin())
        .await
        .unwrap();
    assert_eq!(engine.users.calls().len(), 1);
}

#[tokio::test]
async fn test_single_owner_add_and_remove() {
    let engine = setup_engine().await;
    let id = engine.create_asset(vec![]).await;

    engine
        .lifecycle
        .add_owner(id, owner("users", "u9"), admin())
        .await
        .unwrap();
    assert!(matches!(
        engine
            .lifecycle
            .add_owner(id, owner("users", "u9"), admin())
            .await,
        Err(AppError::AlreadyExists(_))
    ));
    assert_eq!(engine.users.held_for(id), ["u9".to_string()].into());

    engine
        .lifecycle
        .remove_owner(id, owner("users", "u9"), admin())
        .await
        .unwrap();
    assert!(matches!(
        engine
            .lifecycle
            .remove_owner(id, owner("users", "u9"), admin())
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(engine.users.held_for(id).is_empty());
}

#[tokio::test]
async fn test_mark_as_broken_releases_owners_once() {
    let engine = setup_engine().await;
    let (id, _) = engine
        .create_active_asset(vec![owner("users", "u1"), owner("groups", "g1")])
        .await;

    let broken = engine.lifecycle.mark_as_broken(id, admin()).await.unwrap();
    assert_eq!(broken.status, AssetStatus::Broken);
    assert!(engine.users.held_for(id).is_empty());
    assert!(engine.groups.held_for(id).is_empty());
    assert!(!engine.metadata.get(id).await.unwrap().unwrap().has_owners());

    let calls_before = engine.users.calls().len() + engine.groups.calls().len();
    let released = engine.lifecycle.release_owners(&broken).await.unwrap();
    assert_eq!(released, 0);
    assert_eq!(
        engine.users.calls().len() + engine.groups.calls().len(),
        calls_before
    );
}

#[tokio::test]
async fn test_resync_reannounces_after_owner_service_outage() {
    let engine = setup_engine().await;
    let id = engine.create_asset(vec![]).await;

    engine.users.fail.store(true, Ordering::SeqCst);
    let failed = engine
        .lifecycle
        .set_owners(id, [owner("users", "u1")].into(), admin())
        .await;
    assert!(matches!(failed, Err(AppError::ExternalService { .. })));
    // The owner set is stored even though the announcement failed
    assert!(engine.metadata.get(id).await.unwrap().unwrap().has_owners());

    engine.users.fail.store(false, Ordering::SeqCst);
    let report = engine.lifecycle.resync_owners(id).await.unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(engine.users.held_for(id), ["u1".to_string()].into());
}

#[tokio::test]
async fn test_restore_clears_archive_trail() {
    let engine = setup_engine().await;
    let (id, _) = engine.create_active_asset(vec![]).await;
    engine.lifecycle.archive(id, admin()).await.unwrap();

    let restored = engine.lifecycle.restore(id, admin()).await.unwrap();
    assert_eq!(restored.status, AssetStatus::Active);
    assert!(restored.deleted_at.is_none());
    assert!(restored.archived_by.is_none());
    assert_eq!(restored.restored_by.unwrap().actor_id, "admin-1");
}

#[tokio::test]
async fn test_permanent_delete_removes_everything() {
    let engine = setup_engine().await;
    let (id, external_id) = engine.create_active_asset(vec![]).await;
    engine.lifecycle.archive(id, admin()).await.unwrap();

    engine
        .lifecycle
        .permanently_delete(id, admin())
        .await
        .unwrap();

    assert!(engine.assets.get(id).await.unwrap().is_none());
    assert!(engine.metadata.get(id).await.unwrap().is_none());
    assert_eq!(engine.platform.deleted(), vec![external_id]);
}

#[tokio::test]
async fn test_permanent_delete_surfaces_remote_failure_after_local_cleanup() {
    let engine = setup_engine().await;
    let (id, _) = engine.create_active_asset(vec![]).await;
    engine.lifecycle.archive(id, admin()).await.unwrap();
    engine.platform.fail_deletes.store(true, Ordering::SeqCst);

    let result = engine.lifecycle.permanently_delete(id, admin()).await;

    assert!(matches!(result, Err(AppError::ExternalService { .. })));
    assert!(engine.assets.get(id).await.unwrap().is_none());
    assert!(engine.metadata.get(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_title_trims_and_validates() {
    let engine = setup_engine().await;
    let id = engine.create_asset(vec![]).await;

    let metadata = engine
        .lifecycle
        .update_title(id, Some("  Trailer  ".to_string()), admin())
        .await
        .unwrap();
    assert_eq!(metadata.title.as_deref(), Some("Trailer"));

    assert!(matches!(
        engine
            .lifecycle
            .update_title(id, Some("   ".to_string()), admin())
            .await,
        Err(AppError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_pagination_visits_every_asset_once() {
    let engine = setup_engine().await;
    let mut created = HashSet::new();
    for _ in 0..5 {
        created.insert(engine.create_asset(vec![owner("users", "u1")]).await);
    }

    let mut seen = Vec::new();
    let mut token = None;
    let mut pages = 0;
    loop {
        let page = engine
            .lifecycle
            .list_assets(ListAssetsRequest {
                page_token: token.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        pages += 1;
        assert!(page.assets.len() <= 2);
        assert!(page.assets.iter().all(|v| v.metadata.is_some()));
        seen.extend(
            page.assets
                .into_iter()
                .map(|v| (v.asset.created_at, v.asset.id)),
        );
        if page.next_page_token.is_empty() {
            break;
        }
        token = Some(page.next_page_token);
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 5);
    // Newest first, across page boundaries too
    assert!(seen.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(
        seen.into_iter().map(|(_, id)| id).collect::<HashSet<_>>(),
        created
    );
}

#[tokio::test]
async fn test_tampered_page_token_is_rejected() {
    let engine = setup_engine().await;
    for _ in 0..3 {
        engine.create_asset(vec![]).await;
    }
    let page = engine
        .lifecycle
        .list_assets(ListAssetsRequest::default())
        .await
        .unwrap();
    let mut token = page.next_page_token;
    assert!(!token.is_empty());
    token.push('x');

    let result = engine
        .lifecycle
        .list_assets(ListAssetsRequest {
            page_token: Some(token),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_archive_finishes_release_left_by_failed_mark_as_broken() {
    let engine = setup_engine().await;
    let (id, _) = engine
        .create_active_asset(vec![owner("users", "u1"), owner("groups", "g1")])
        .await;

    engine.users.fail.store(true, Ordering::SeqCst);
    let result = engine.lifecycle.mark_as_broken(id, admin()).await;
    assert!(matches!(result, Err(AppError::ExternalService { .. })));
    assert_eq!(
        engine.assets.get(id).await.unwrap().unwrap().status,
        AssetStatus::Broken
    );
    assert!(engine.metadata.get(id).await.unwrap().unwrap().has_owners());

    // Still down: the archive is refused and the owners stay on record
    assert!(engine.lifecycle.archive(id, admin()).await.is_err());
    assert!(engine.metadata.get(id).await.unwrap().unwrap().has_owners());

    engine.users.fail.store(false, Ordering::SeqCst);
    let archived = engine.lifecycle.archive(id, admin()).await.unwrap();

    assert_eq!(archived.status, AssetStatus::Archived);
    assert!(engine.users.held_for(id).is_empty());
    assert!(engine.groups.held_for(id).is_empty());
    assert!(!engine.metadata.get(id).await.unwrap().unwrap().has_owners());
}

#[tokio::test]
async fn test_owners_of_unregistered_type_are_rejected_before_any_write() {
    let engine = setup_engine().await;
    let (id, _) = engine.create_active_asset(vec![]).await;

    let added = engine
        .lifecycle
        .add_owner(id, owner("lessons", "l1"), admin())
        .await;
    assert!(matches!(added, Err(AppError::InvalidArgument(_))));

    let set = engine
        .lifecycle
        .set_owners(
            id,
            BTreeSet::from([owner("users", "u1"), owner("lessons", "l1")]),
            admin(),
        )
        .await;
    assert!(matches!(set, Err(AppError::InvalidArgument(_))));

    assert!(!engine.metadata.get(id).await.unwrap().unwrap().has_owners());
    assert!(engine.users.calls().is_empty());
    engine.lifecycle.archive(id, admin()).await.unwrap();
}

#[tokio::test]
async fn test_begin_upload_with_unregistered_owner_type_creates_nothing() {
    let engine = setup_engine().await;

    let result = engine
        .lifecycle
        .begin_upload(upload_request(vec![
            owner("users", "u1"),
            owner("lessons", "l1"),
        ]))
        .await;

    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    assert_eq!(engine.assets.len().await, 0);
    assert!(engine.users.calls().is_empty());
}

#[tokio::test]
async fn test_owner_write_racing_an_archive_is_reverted() {
    let engine = setup_engine().await;
    let (id, _) = engine.create_active_asset(vec![]).await;

    // The archive commits between the status check and the owner write
    let mut archived = engine.assets.get(id).await.unwrap().unwrap();
    archived.status = AssetStatus::Archived;
    archived.deleted_at = Some(chrono::Utc::now());
    engine
        .metadata
        .archive_before_next_owner_write(engine.assets.clone(), archived);

    let result = engine
        .lifecycle
        .add_owner(id, owner("users", "u1"), admin())
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(!engine.metadata.get(id).await.unwrap().unwrap().has_owners());
    assert!(engine.users.calls().is_empty());
    assert!(engine.users.held_for(id).is_empty());
}

#[tokio::test]
async fn test_restore_keeps_archive_event_id() {
    let engine = setup_engine().await;
    let (id, external_id) = engine.create_active_asset(vec![]).await;
    engine
        .deliver(&serde_json::json!({"id": "evt_gone", "type": "asset.deleted", "data": {"id": external_id}}))
        .await
        .unwrap();

    let restored = engine.lifecycle.restore(id, admin()).await.unwrap();

    assert_eq!(restored.archive_event_id.as_deref(), Some("evt_gone"));
}
