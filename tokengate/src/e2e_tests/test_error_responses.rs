//! Default error responses as seen by a client.

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use crate::e2e_tests::helpers::*;
use crate::{JwtConfig, TokenLocation};

#[tokio::test]
async fn test_envelope_errors() {
    let app = TestApp::new();
    let cases = [
        ("Token abc", "Bad Authorization header. Expected value 'Bearer <JWT>'"),
        ("Bearer", "Bad Authorization header. Expected value 'Bearer <JWT>'"),
        ("Bearer a b", "Bad Authorization header. Expected value 'Bearer <JWT>'"),
    ];

    for (header, message) in cases {
        let mut request = request(Method::GET, "/protected");
        request
            .headers_mut()
            .insert("authorization", header.parse().expect("valid header"));

        let response = app.send(request).await;

        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY, "{header}");
        assert_eq!(response.body, json!({"msg": message}), "{header}");
    }
}

#[tokio::test]
async fn test_undecodable_token_is_invalid() {
    let app = TestApp::new();

    let response = app.send(bearer_request(Method::GET, "/protected", "not.a.jwt")).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["msg"].is_string(), "{:?}", response.body);
}

#[tokio::test]
async fn test_token_type_and_freshness_errors() {
    let app = TestApp::new();
    let (access, refresh) = app.login().await;
    let stale = app
        .manager
        .create_access_token(&"test".to_string(), false, None)
        .await
        .expect("token issued");

    let only_access = (StatusCode::UNPROCESSABLE_ENTITY, "Only access tokens are allowed");
    let only_refresh = (StatusCode::UNPROCESSABLE_ENTITY, "Only refresh tokens are allowed");
    let not_fresh = (StatusCode::UNAUTHORIZED, "Fresh token required");
    let cases = [
        (Method::GET, "/protected", refresh.as_str(), only_access),
        (Method::POST, "/fresh", refresh.as_str(), only_access),
        (Method::POST, "/refresh", access.as_str(), only_refresh),
        (Method::POST, "/fresh", stale.as_str(), not_fresh),
        (Method::GET, "/optional", refresh.as_str(), only_access),
    ];

    for (method, uri, token, (status, message)) in cases {
        let response = app.send(bearer_request(method, uri, token)).await;

        assert_eq!(response.status, status, "{uri}");
        assert_eq!(response.body, json!({"msg": message}), "{uri}");
    }
}

#[tokio::test]
async fn test_combined_missing_message() {
    let app = TestApp::with_config(JwtConfig {
        token_location: vec![
            TokenLocation::Headers,
            TokenLocation::Cookies,
            TokenLocation::QueryString,
        ],
        ..JwtConfig::with_secret(SECRET)
    });

    let response = app.send(request(Method::GET, "/protected")).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body,
        json!({
            "msg": "Missing JWT in headers, cookies or query_string (Missing Authorization Header; \
                    Missing cookie \"access_token_cookie\"; Missing \"jwt\" query parameter)"
        })
    );
}

#[tokio::test]
async fn test_custom_message_key() {
    let app = TestApp::with_config(JwtConfig {
        error_message_key: "error".to_string(),
        ..JwtConfig::with_secret(SECRET)
    });

    let response = app.send(request(Method::GET, "/protected")).await;
    assert_eq!(response.body, json!({"error": "Missing Authorization Header"}));

    let response = app
        .send(json_request(Method::POST, "/login", &json!({"username": "test"})))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], Value::from("Missing password parameter"));
}
