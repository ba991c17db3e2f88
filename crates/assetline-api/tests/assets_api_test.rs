mod helpers;

use axum::body::Bytes;
use helpers::{api_path, setup_test_app, ACTOR};
use serde_json::json;

#[tokio::test]
async fn test_health_reports_in_memory_stores() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    let data: serde_json::Value = response.json();
    assert_eq!(data["status"], json!("healthy"));
    assert_eq!(data["canonical_store"], json!("in_memory"));
}

#[tokio::test]
async fn test_begin_upload_creates_asset_and_announces_owners() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post(&api_path("/assets"))
        .add_header("x-actor-id", ACTOR)
        .add_header("x-actor-name", "Grace")
        .json(&json!({
            "resource_type": "video",
            "title": "Intro",
            "owners": [{"owner_type": "users", "owner_id": "u1"}]
        }))
        .await;

    assert_eq!(response.status_code(), 201);
    let data: serde_json::Value = response.json();
    assert!(data["upload_url"].as_str().unwrap().starts_with("https://upload.test/"));
    assert_eq!(data["asset"]["status"], json!("upload_url_generated"));
    assert_eq!(data["asset"]["created_by"]["actor_name"], json!("Grace"));

    let id: uuid::Uuid = data["asset"]["id"].as_str().unwrap().parse().unwrap();
    assert!(app.users.holds(id, "u1"));

    let fetched = client.get(&api_path(&format!("/assets/{}", id))).await;
    assert_eq!(fetched.status_code(), 200);
    let view: serde_json::Value = fetched.json();
    assert_eq!(view["metadata"]["title"], json!("Intro"));
}

#[tokio::test]
async fn test_writes_without_actor_are_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/assets"))
        .json(&json!({"resource_type": "video"}))
        .await;

    assert_eq!(response.status_code(), 400);
    let data: serde_json::Value = response.json();
    assert_eq!(data["code"], json!("INVALID_ARGUMENT"));
}

#[tokio::test]
async fn test_unknown_asset_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(&api_path(&format!("/assets/{}", uuid::Uuid::now_v7())))
        .await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_list_pages_through_all_assets() {
    let app = setup_test_app().await;
    for _ in 0..3 {
        app.create_asset(json!([])).await;
    }

    let first = app.client().get(&api_path("/assets")).await;
    assert_eq!(first.status_code(), 200);
    let page: serde_json::Value = first.json();
    assert_eq!(page["assets"].as_array().unwrap().len(), 2);
    let token = page["next_page_token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    let second = app
        .client()
        .get(&api_path("/assets"))
        .add_query_param("page_token", &token)
        .await;
    let page: serde_json::Value = second.json();
    assert_eq!(page["assets"].as_array().unwrap().len(), 1);
    assert_eq!(page["next_page_token"], json!(""));
}

#[tokio::test]
async fn test_list_rejects_unknown_order_field() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(&api_path("/assets"))
        .add_query_param("order_by", "title")
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_archive_with_owners_conflicts_until_owners_removed() {
    let app = setup_test_app().await;
    let id = app
        .create_asset(json!([{"owner_type": "users", "owner_id": "u1"}]))
        .await;

    let blocked = app
        .client()
        .post(&api_path(&format!("/assets/{}/archive", id)))
        .add_header("x-actor-id", ACTOR)
        .await;
    assert_eq!(blocked.status_code(), 409);

    let removed = app
        .client()
        .delete(&api_path(&format!("/assets/{}/owners/users/u1", id)))
        .add_header("x-actor-id", ACTOR)
        .await;
    assert_eq!(removed.status_code(), 200);
    assert!(!app.users.holds(id, "u1"));

    let archived = app
        .client()
        .post(&api_path(&format!("/assets/{}/archive", id)))
        .add_header("x-actor-id", ACTOR)
        .await;
    assert_eq!(archived.status_code(), 200);
    let data: serde_json::Value = archived.json();
    assert_eq!(data["status"], json!("archived"));
    assert_eq!(data["archived_by"]["actor_id"], json!(ACTOR));
}

#[tokio::test]
async fn test_set_owners_replaces_the_set() {
    let app = setup_test_app().await;
    let id = app
        .create_asset(json!([{"owner_type": "users", "owner_id": "u1"}]))
        .await;

    let response = app
        .client()
        .put(&api_path(&format!("/assets/{}/owners", id)))
        .add_header("x-actor-id", ACTOR)
        .json(&json!({"owners": [{"owner_type": "users", "owner_id": "u2"}]}))
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(!app.users.holds(id, "u1"));
    assert!(app.users.holds(id, "u2"));
}

#[tokio::test]
async fn test_webhook_requires_valid_signature() {
    let app = setup_test_app().await;
    let (payload, _, ts) = app.sign(&json!({"id": "evt_1", "type": "asset.ready", "data": {}}));

    let response = app
        .client()
        .post(&api_path("/webhooks/platform"))
        .add_header("x-platform-signature", "v1=forged")
        .add_header("x-platform-timestamp", ts.as_str())
        .bytes(Bytes::from(payload))
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_signed_ready_webhook_activates_asset() {
    let app = setup_test_app().await;
    let id = app.create_asset(json!([])).await;
    let (payload, signature, ts) = app.sign(&json!({
        "id": "evt_ready",
        "type": "asset.ready",
        "data": {"id": "ext_1", "passthrough": id.to_string(), "status": "ready"}
    }));

    let response = app
        .client()
        .post(&api_path("/webhooks/platform"))
        .add_header("x-platform-signature", signature.as_str())
        .add_header("x-platform-timestamp", ts.as_str())
        .bytes(Bytes::from(payload))
        .await;

    assert_eq!(response.status_code(), 200);
    let ack: serde_json::Value = response.json();
    assert_eq!(ack["ignored"], json!(false));

    let view: serde_json::Value = app
        .client()
        .get(&api_path(&format!("/assets/{}", id)))
        .await
        .json();
    assert_eq!(view["status"], json!("active"));
    assert_eq!(view["external_asset_id"], json!("ext_1"));
}

#[tokio::test]
async fn test_manual_cleanup_returns_report() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/maintenance/cleanup"))
        .add_header("x-actor-id", ACTOR)
        .await;

    assert_eq!(response.status_code(), 200);
    let report: serde_json::Value = response.json();
    assert_eq!(report["broken_archived"], json!(0));
}
