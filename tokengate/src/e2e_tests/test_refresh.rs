//! Refresh token exchange on `/refresh`.

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_refresh_issues_non_fresh_access_token() {
    let app = TestApp::new();
    let (_, refresh) = app.login().await;

    let response = app.send(bearer_request(Method::POST, "/refresh", &refresh)).await;
    assert_eq!(response.status, StatusCode::OK);

    let access = response.string("access_token");
    let decoded = app.manager.decode_token(&access).await.expect("valid access token");
    assert_eq!(decoded.identity, "test");
    assert!(!decoded.fresh);

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let app = TestApp::new();
    let (access, _) = app.login().await;

    let response = app.send(bearer_request(Method::POST, "/refresh", &access)).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body, json!({"msg": "Only refresh tokens are allowed"}));
}
