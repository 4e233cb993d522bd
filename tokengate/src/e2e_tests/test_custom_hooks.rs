//! Hooks registered through the manager builder.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::e2e_tests::helpers::*;
use crate::{ErrorResponse, JwtConfig, JwtManager, JwtRequired};

fn role_claims(identity: &str) -> Map<String, Value> {
    let mut claims = Map::new();
    if identity == "test" {
        claims.insert("role".to_string(), json!("admin"));
    }
    claims
}

#[tokio::test]
async fn test_user_claims_hook() {
    let manager = JwtManager::builder(JwtConfig::with_secret(SECRET))
        .user_claims_loader(|identity: String| async move { role_claims(&identity) })
        .build()
        .expect("valid configuration");
    let app = TestApp::with_manager(manager);
    let (access, refresh) = app.login().await;

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;
    assert_eq!(response.body["claims"], json!({"role": "admin"}));

    let decoded = app.manager.decode_token(&refresh).await.expect("valid token");
    assert!(decoded.user_claims.is_empty());
}

#[tokio::test]
async fn test_claims_verification_hook() {
    let manager = JwtManager::builder(JwtConfig::with_secret(SECRET))
        .claims_verification_loader(|claims: Map<String, Value>| async move {
            claims.get("role") == Some(&json!("admin"))
        })
        .build()
        .expect("valid configuration");
    let app = TestApp::with_manager(manager);
    let (access, _) = app.login().await;

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"msg": "User claims verification failed"}));
}

#[tokio::test]
async fn test_user_loader_hook() {
    let manager = JwtManager::builder(JwtConfig::with_secret(SECRET))
        .user_loader_callback_loader(|identity: String| async move {
            (identity == "test").then_some(())
        })
        .build()
        .expect("valid configuration");
    let app = TestApp::with_manager(manager);
    let (access, _) = app.login().await;
    let ghost = app
        .manager
        .create_access_token(&"ghost".to_string(), false, None)
        .await
        .expect("token issued");

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.send(bearer_request(Method::GET, "/protected", &ghost)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"msg": "Error loading the user ghost"}));
}

#[tokio::test]
async fn test_response_hooks() {
    let manager = JwtManager::builder(JwtConfig::with_secret(SECRET))
        .unauthorized_loader(|reason: String| ErrorResponse {
            status: StatusCode::FORBIDDEN,
            body: json!({"error": "unauthorized", "reason": reason}),
        })
        .needs_fresh_token_loader(|| ErrorResponse {
            status: StatusCode::FORBIDDEN,
            body: json!({"error": "login again"}),
        })
        .build()
        .expect("valid configuration");
    let app = TestApp::with_manager(manager);

    let response = app.send(request(Method::GET, "/protected")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.body,
        json!({"error": "unauthorized", "reason": "Missing Authorization Header"})
    );

    let stale = app
        .manager
        .create_access_token(&"test".to_string(), false, None)
        .await
        .expect("token issued");
    let response = app.send(bearer_request(Method::POST, "/fresh", &stale)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body, json!({"error": "login again"}));
}

#[tokio::test]
async fn test_per_identity_signing_keys() {
    let manager = JwtManager::builder(JwtConfig::default())
        .encode_key_loader(|identity: String| async move {
            Some(format!("key-for-{identity}"))
        })
        .decode_key_loader(|claims: Map<String, Value>| async move {
            claims
                .get("identity")
                .and_then(Value::as_str)
                .map(|identity| format!("key-for-{identity}"))
        })
        .build()
        .expect("key hooks stand in for configured keys");
    let app = TestApp::with_manager(manager);
    let (access, _) = app.login().await;

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["logged_in_as"], json!("test"));
}

#[derive(Debug, Clone, Serialize)]
struct Account {
    username: String,
    role: String,
}

#[tokio::test]
async fn test_struct_subject_with_string_identity() {
    let manager: JwtManager<String, (), Account> =
        JwtManager::builder(JwtConfig::with_secret(SECRET))
            .user_identity_loader(|account: Account| async move { Some(account.username) })
            .user_claims_loader(|account: Account| async move {
                let mut claims = Map::new();
                claims.insert("role".to_string(), json!(account.role));
                claims
            })
            .build()
            .expect("valid configuration");
    let manager = Arc::new(manager);
    let router = Router::new()
        .route(
            "/protected",
            get(|JwtRequired(token): JwtRequired<String>| async move {
                Json(json!({"logged_in_as": token.identity(), "claims": token.user_claims()}))
            }),
        )
        .with_state(Arc::clone(&manager));

    let account = Account {
        username: "alice".to_string(),
        role: "admin".to_string(),
    };
    let access = manager
        .create_access_token(&account, true, None)
        .await
        .expect("token issued");

    let decoded = manager.decode_token(&access).await.expect("valid token");
    assert_eq!(decoded.identity, "alice");
    assert_eq!(decoded.user_claims.get("role"), Some(&json!("admin")));

    let response = send(&router, bearer_request(Method::GET, "/protected", &access)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({"logged_in_as": "alice", "claims": {"role": "admin"}})
    );
}

#[tokio::test]
async fn test_struct_subject_without_identity_loader() {
    let manager: JwtManager<String, (), Account> =
        JwtManager::new(JwtConfig::with_secret(SECRET)).expect("valid configuration");
    let account = Account {
        username: "alice".to_string(),
        role: "admin".to_string(),
    };

    let error = manager
        .create_access_token(&account, true, None)
        .await
        .expect_err("a struct is not a string identity");
    assert!(matches!(error, crate::TokenError::Identity));
}
