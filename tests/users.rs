//! User Tests
//!
//! Covers provisioning, profile reads and profile updates.

mod common;

use axum::http::StatusCode;
use common::{app, RecordingRevalidator, TestApp, TEST_ADMIN_TOKEN};
use serde_json::json;
use std::sync::Arc;
use trellis::domain::id::ObjectId;

// ===========================================================================
// Provisioning
// ===========================================================================

#[tokio::test]
async fn create_user_with_admin_token() {
    let app = app().await;
    let id = ObjectId::generate();
    let username = format!("usr_create_{}", &id.to_hex()[16..]);

    let resp = app
        .post_admin(
            "/v1/users",
            json!({ "id": id.to_string(), "username": &username, "avatar": "a.png" }),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["username"], username);
    assert_eq!(body["avatar"], "a.png");
}

#[tokio::test]
async fn create_user_requires_admin_token() {
    let app = app().await;
    let body = json!({ "id": ObjectId::generate().to_string(), "username": "usr_noadmin" });

    let resp = app.post_admin("/v1/users", body.clone(), None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "missing admin token");

    let resp = app.post_admin("/v1/users", body, Some("wrong")).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "invalid admin token");
}

#[tokio::test]
async fn create_user_duplicate_username() {
    let app = app().await;
    let existing = app.create_user("usr_dup").await;

    let resp = app
        .post_admin(
            "/v1/users",
            json!({ "id": ObjectId::generate().to_string(), "username": existing.username }),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn create_user_invalid_id() {
    let app = app().await;

    let resp = app
        .post_admin(
            "/v1/users",
            json!({ "id": "user_abc123", "username": "usr_badid" }),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Profiles
// ===========================================================================

#[tokio::test]
async fn get_profile_by_username() {
    let app = app().await;
    let user = app.create_user("usr_profile").await;

    let resp = app.get(&format!("/v1/users/{}", user.username), None).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["display_name"], user.username);
    assert_eq!(body["followers_count"], 0);
}

#[tokio::test]
async fn get_unknown_profile() {
    let app = app().await;

    let resp = app.get("/v1/users/nobody_here", None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

#[tokio::test]
async fn profile_lookup_is_by_username_not_id() {
    let app = app().await;
    let user = app.create_user("usr_by_name").await;

    let resp = app.get(&format!("/v1/users/{}", user.id), None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

#[tokio::test]
async fn update_profile_keeps_unsent_fields() {
    let revalidator = Arc::new(RecordingRevalidator::default());
    let app = TestApp::builder().revalidator(revalidator.clone()).build();
    let user = app.create_user("usr_update").await;

    let resp = app
        .patch_json(
            "/v1/account/profile",
            json!({ "name": "Ada", "surname": "Lovelace", "city": "London" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .patch_json(
            "/v1/account/profile",
            json!({ "city": "", "work": "Analytical Engine" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["city"], "London");
    assert_eq!(body["work"], "Analytical Engine");

    let resp = app.get(&format!("/v1/users/{}", user.username), None).await;
    assert_eq!(resp.json()["display_name"], "Ada Lovelace");
    assert_eq!(
        revalidator.paths(),
        vec![format!("/profile/{}", user.id); 2]
    );
}

#[tokio::test]
async fn update_profile_rejects_bad_website() {
    let app = app().await;
    let user = app.create_user("usr_website").await;

    let resp = app
        .patch_json(
            "/v1/account/profile",
            json!({ "website": "not a url" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error_message().starts_with("invalid website"));
}

#[tokio::test]
async fn update_profile_no_auth() {
    let app = app().await;

    let resp = app
        .patch_json("/v1/account/profile", json!({ "name": "x" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;

    let resp = app.get("/health", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}
