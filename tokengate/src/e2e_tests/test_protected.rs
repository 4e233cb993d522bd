//! Access token checks on `/protected`.

use axum::http::{Method, StatusCode};
use serde_json::{Map, Value, json};

use crate::TokenType;
use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_bearer_token_with_claims_is_accepted() {
    let app = TestApp::new();
    let Value::Object(claims) = json!({"role": "admin"}) else {
        unreachable!()
    };
    let token = app
        .manager
        .encode_token(&"u1".to_string(), TokenType::Access, false, None, Some(claims))
        .await
        .expect("token issued");

    let response = app.send(bearer_request(Method::GET, "/protected", &token)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({"logged_in_as": "u1", "claims": {"role": "admin"}})
    );
}

#[tokio::test]
async fn test_login_token_reaches_protected_route() {
    let app = TestApp::new();
    let (access, _) = app.login().await;

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({"logged_in_as": "test", "claims": Value::Object(Map::new())})
    );
}

#[tokio::test]
async fn test_missing_token() {
    let app = TestApp::new();
    let response = app.send(request(Method::GET, "/protected")).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"msg": "Missing Authorization Header"}));
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = TestApp::new();
    let (_, refresh) = app.login().await;

    let response = app.send(bearer_request(Method::GET, "/protected", &refresh)).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body, json!({"msg": "Only access tokens are allowed"}));
}

#[tokio::test]
async fn test_expired_token() {
    let app = TestApp::new();
    let token = app
        .manager
        .create_access_token(&"u1".to_string(), false, Some(chrono::TimeDelta::seconds(-1)))
        .await
        .expect("token issued");

    let response = app.send(bearer_request(Method::GET, "/protected", &token)).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"msg": "Token has expired"}));
}

#[tokio::test]
async fn test_token_signed_with_another_secret() {
    let app = TestApp::new();
    let other = TestApp::with_config(crate::JwtConfig::with_secret("some-other-secret"));
    let (foreign, _) = other.login().await;

    let response = app.send(bearer_request(Method::GET, "/protected", &foreign)).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body, json!({"msg": "Signature verification failed"}));
}

#[tokio::test]
async fn test_malformed_header() {
    let app = TestApp::new();
    let mut request = request(Method::GET, "/protected");
    request
        .headers_mut()
        .insert("authorization", "Token abc".parse().expect("valid header"));

    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.body,
        json!({"msg": "Bad Authorization header. Expected value 'Bearer <JWT>'"})
    );
}
