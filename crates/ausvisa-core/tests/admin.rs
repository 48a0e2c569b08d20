mod common;

use std::sync::Arc;

use ausvisa_core::{ApiError, BackendClient, StatusFilter, TokenStore, UserFilter, UserStatus};
use reqwest::StatusCode;

use common::GOOD_TOKEN;

async fn signed_in() -> (BackendClient, common::Shared) {
    let state = common::state();
    let url = common::spawn(state.clone()).await;
    let tokens = Arc::new(TokenStore::in_memory());
    tokens.set(GOOD_TOKEN).unwrap();
    (BackendClient::new(&url, tokens), state)
}

#[tokio::test]
async fn test_authorized_calls_fail_fast_without_token() {
    let state = common::state();
    let url = common::spawn(state.clone()).await;
    let client = BackendClient::new(&url, Arc::new(TokenStore::in_memory()));

    assert!(matches!(client.admin_users().await, Err(ApiError::Unauthenticated)));
    assert!(matches!(client.admin_stats().await, Err(ApiError::Unauthenticated)));
    assert!(matches!(client.graph_stats().await, Err(ApiError::Unauthenticated)));
    assert!(matches!(client.update_user_status(7, false).await, Err(ApiError::Unauthenticated)));
    assert!(matches!(client.update_user_role(7, "editor").await, Err(ApiError::Unauthenticated)));
    assert!(matches!(client.delete_user(7).await, Err(ApiError::Unauthenticated)));
    assert!(matches!(client.current_user().await, Err(ApiError::Unauthenticated)));

    assert!(state.lock().unwrap().requests.is_empty());
}

#[tokio::test]
async fn test_toggle_status_is_visible_after_reload() {
    let (client, _state) = signed_in().await;

    let before = client.admin_users().await.unwrap();
    let lan = before.iter().find(|u| u.id == 7).unwrap();
    assert!(lan.is_active);

    let updated = client.update_user_status(7, !lan.is_active).await.unwrap();
    assert!(!updated.is_active);

    let after = client.admin_users().await.unwrap();
    let lan = after.iter().find(|u| u.id == 7).unwrap();
    assert!(!lan.is_active);
    assert_eq!(UserStatus::of(lan), UserStatus::Suspended);

    let stats = client.admin_stats().await.unwrap();
    assert_eq!(stats.total_users, 3);
    assert_eq!(stats.suspended_users, 2);
}

#[tokio::test]
async fn test_role_update_and_backend_validation_message() {
    let (client, _state) = signed_in().await;

    let user = client.update_user_role(7, "reviewer").await.unwrap();
    assert_eq!(user.role, "reviewer");

    let err = client.update_user_role(7, "overlord").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert!(err.to_string().starts_with("Invalid role"));
}

#[tokio::test]
async fn test_delete_then_reload() {
    let (client, _state) = signed_in().await;

    client.delete_user(9).await.unwrap();
    let users = client.admin_users().await.unwrap();
    assert!(users.iter().all(|u| u.id != 9));

    let err = client.delete_user(9).await.unwrap_err();
    assert_eq!(err.user_message(), "User not found");
}

#[tokio::test]
async fn test_filtering_loaded_users() {
    let (client, _state) = signed_in().await;
    let users = client.admin_users().await.unwrap();

    let filter = UserFilter {
        keyword: "EXAMPLE.COM".into(),
        status: StatusFilter::Only(UserStatus::Active),
    };
    let ids: Vec<i64> = filter.apply(&users).iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![7]);
}

#[tokio::test]
async fn test_graph_stats_totals() {
    let (client, _state) = signed_in().await;
    let stats = client.graph_stats().await.unwrap();
    assert_eq!(stats.total_nodes(), 120 + 43 + 870);
    assert_eq!(stats.total_relationships(), 870 + 240);
}

#[tokio::test]
async fn test_public_endpoints() {
    let (client, _state) = signed_in().await;
    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.neo4j, "connected");
}

#[tokio::test]
async fn test_rejected_token_is_backend_error() {
    let state = common::state();
    let url = common::spawn(state).await;
    let tokens = Arc::new(TokenStore::in_memory());
    tokens.set("stale").unwrap();
    let client = BackendClient::new(&url, tokens);

    let err = client.admin_users().await.unwrap_err();
    assert!(err.is_auth_rejection());
    assert_eq!(err.user_message(), "Not authenticated");
}
