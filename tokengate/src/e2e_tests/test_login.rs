//! Credential exchange on `/login`.

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::TokenType;
use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_login_issues_fresh_access_and_refresh_tokens() {
    let app = TestApp::new();
    let (access, refresh) = app.login().await;

    let access = app.manager.decode_token(&access).await.expect("valid access token");
    assert_eq!(access.identity, "test");
    assert_eq!(access.token_type, TokenType::Access);
    assert!(access.fresh);

    let refresh = app.manager.decode_token(&refresh).await.expect("valid refresh token");
    assert_eq!(refresh.identity, "test");
    assert_eq!(refresh.token_type, TokenType::Refresh);
    assert!(!refresh.fresh);
    assert!(!refresh.raw_claims.contains_key("fresh"));
}

#[tokio::test]
async fn test_login_rejects_bad_input() {
    let app = TestApp::new();

    let cases = [
        (json!({"password": "test"}), StatusCode::BAD_REQUEST, "Missing username parameter"),
        (json!({"username": "test"}), StatusCode::BAD_REQUEST, "Missing password parameter"),
        (
            json!({"username": "test", "password": "wrong"}),
            StatusCode::FORBIDDEN,
            "Bad username or password",
        ),
    ];
    for (body, status, message) in cases {
        let response = app.send(json_request(Method::POST, "/login", &body)).await;
        assert_eq!(response.status, status, "{body}");
        assert_eq!(response.body, json!({"msg": message}));
    }

    let response = app.send(request(Method::POST, "/login")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"msg": "Missing JSON in request"}));
}
