//! Request methods exempt from optional verification.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::routing::{get, options};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::e2e_tests::helpers::*;
use crate::{AuthenticatedToken, JwtConfig, JwtManager, JwtOptional, JwtRequired};

async fn preflight(token: Option<JwtRequired<String>>) -> Json<Value> {
    Json(json!({"identity": token.as_ref().map(|token| token.identity())}))
}

async fn optional(JwtOptional(token): JwtOptional<String>) -> Json<Value> {
    Json(json!({"identity": token.as_ref().map(AuthenticatedToken::identity)}))
}

fn exempt_app(config: JwtConfig) -> TestApp {
    let manager = Arc::new(JwtManager::new(config).expect("valid configuration"));
    let router = Router::new()
        .route("/preflight", options(preflight).get(preflight))
        .route("/optional", get(optional).options(optional).head(optional))
        .with_state(Arc::clone(&manager));
    TestApp { router, manager }
}

#[tokio::test]
async fn test_options_request_skips_verification() {
    let app = exempt_app(JwtConfig::with_secret(SECRET));

    let response = app.send(request(Method::OPTIONS, "/preflight")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"identity": null}));

    let response = app
        .send(bearer_request(Method::OPTIONS, "/optional", "garbage"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"identity": null}));
}

#[tokio::test]
async fn test_other_methods_still_verify() {
    let app = exempt_app(JwtConfig::with_secret(SECRET));

    let response = app.send(request(Method::GET, "/preflight")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"msg": "Missing Authorization Header"}));

    let response = app
        .send(bearer_request(Method::GET, "/optional", "garbage"))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let access = app
        .manager
        .create_access_token(&"test".to_string(), false, None)
        .await
        .expect("token issued");
    let response = app
        .send(bearer_request(Method::GET, "/preflight", &access))
        .await;
    assert_eq!(response.body, json!({"identity": "test"}));
}

#[tokio::test]
async fn test_configured_exempt_methods() {
    let app = exempt_app(JwtConfig {
        exempt_methods: vec!["HEAD".to_string()],
        ..JwtConfig::with_secret(SECRET)
    });

    let response = app
        .send(bearer_request(Method::HEAD, "/optional", "garbage"))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(bearer_request(Method::OPTIONS, "/optional", "garbage"))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}
