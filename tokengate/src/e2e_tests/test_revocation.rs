//! Token revocation through the `token_in_blacklist` predicate.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::e2e_tests::helpers::*;
use crate::{DecodedToken, JwtConfig, JwtManager, TokenType};

fn revocable_app(checks: Vec<TokenType>) -> (TestApp, Arc<RwLock<HashSet<String>>>) {
    let revoked: Arc<RwLock<HashSet<String>>> = Arc::default();
    let store = Arc::clone(&revoked);
    let manager = JwtManager::builder(JwtConfig {
        blacklist_enabled: true,
        blacklist_token_checks: checks,
        ..JwtConfig::with_secret(SECRET)
    })
    .token_in_blacklist_loader(move |token: DecodedToken<String>| {
        let store = Arc::clone(&store);
        async move { store.read().map(|set| set.contains(&token.jti)).unwrap_or(true) }
    })
    .build()
    .expect("valid configuration");
    (TestApp::with_manager(manager), revoked)
}

async fn revoke(app: &TestApp, revoked: &RwLock<HashSet<String>>, token: &str) {
    let jti = app.manager.decode_token(token).await.expect("valid token").jti;
    revoked.write().expect("lock").insert(jti);
}

#[tokio::test]
async fn test_revoked_access_token() {
    let (app, revoked) = revocable_app(vec![TokenType::Access, TokenType::Refresh]);
    let (access, _) = app.login().await;

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;
    assert_eq!(response.status, StatusCode::OK);

    revoke(&app, &revoked, &access).await;

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"msg": "Token has been revoked"}));
}

#[tokio::test]
async fn test_only_configured_types_are_checked() {
    let (app, revoked) = revocable_app(vec![TokenType::Refresh]);
    let (access, refresh) = app.login().await;
    revoke(&app, &revoked, &access).await;
    revoke(&app, &revoked, &refresh).await;

    let response = app.send(bearer_request(Method::GET, "/protected", &access)).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.send(bearer_request(Method::POST, "/refresh", &refresh)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"msg": "Token has been revoked"}));
}
