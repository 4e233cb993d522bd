//! Cookie transport with double-submit CSRF protection.

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::e2e_tests::helpers::*;
use crate::{JwtConfig, TokenLocation};

struct CookieLogin {
    access: String,
    refresh: String,
    csrf_access: String,
    csrf_refresh: String,
}

fn cookie_app() -> TestApp {
    TestApp::with_config(JwtConfig {
        token_location: vec![TokenLocation::Cookies, TokenLocation::Headers],
        ..JwtConfig::with_secret(SECRET)
    })
}

async fn cookie_login(app: &TestApp) -> CookieLogin {
    let response = app
        .send(json_request(
            Method::POST,
            "/login/cookies",
            &json!({"username": "test", "password": "test"}),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"login": true}));

    let cookies = response.set_cookies();
    assert_eq!(cookies.len(), 4, "{cookies:?}");
    assert_eq!(cookies.iter().filter(|cookie| cookie.contains("HttpOnly")).count(), 2);

    let cookie = |name: &str| response.cookie(name).expect("cookie set");
    CookieLogin {
        access: cookie("access_token_cookie"),
        refresh: cookie("refresh_token_cookie"),
        csrf_access: cookie("csrf_access_token"),
        csrf_refresh: cookie("csrf_refresh_token"),
    }
}

#[tokio::test]
async fn test_csrf_cookie_matches_token_claim() {
    let app = cookie_app();
    let login = cookie_login(&app).await;

    let access = app.manager.decode_token(&login.access).await.expect("valid token");
    assert_eq!(access.csrf.as_deref(), Some(login.csrf_access.as_str()));
    let refresh = app.manager.decode_token(&login.refresh).await.expect("valid token");
    assert_eq!(refresh.csrf.as_deref(), Some(login.csrf_refresh.as_str()));
}

#[tokio::test]
async fn test_safe_method_needs_no_csrf_header() {
    let app = cookie_app();
    let login = cookie_login(&app).await;

    let response = app
        .send(cookie_request(
            Method::GET,
            "/protected",
            &[("access_token_cookie", &login.access)],
            &[],
        ))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["logged_in_as"], json!("test"));
}

#[tokio::test]
async fn test_protected_method_requires_csrf_header() {
    let app = cookie_app();
    let login = cookie_login(&app).await;
    let cookies = [("access_token_cookie", login.access.as_str())];

    let response = app.send(cookie_request(Method::POST, "/fresh", &cookies, &[])).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"msg": "Missing CSRF token in headers"}));

    let response = app
        .send(cookie_request(Method::POST, "/fresh", &cookies, &[("X-CSRF-TOKEN", "forged")]))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"msg": "CSRF double submit tokens do not match"}));

    let response = app
        .send(cookie_request(
            Method::POST,
            "/fresh",
            &cookies,
            &[("X-CSRF-TOKEN", &login.csrf_access)],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"fresh_logged_in_as": "test"}));
}

#[tokio::test]
async fn test_refresh_cookie_uses_its_own_csrf_value() {
    let app = cookie_app();
    let login = cookie_login(&app).await;
    let cookies = [("refresh_token_cookie", login.refresh.as_str())];

    let response = app
        .send(cookie_request(
            Method::POST,
            "/refresh",
            &cookies,
            &[("X-CSRF-TOKEN", &login.csrf_access)],
        ))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .send(cookie_request(
            Method::POST,
            "/refresh",
            &cookies,
            &[("X-CSRF-TOKEN", &login.csrf_refresh)],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_header_token_skips_csrf() {
    let app = cookie_app();
    let login = cookie_login(&app).await;

    let response = app.send(bearer_request(Method::POST, "/fresh", &login.access)).await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_everywhere_message() {
    let app = cookie_app();
    let response = app.send(request(Method::GET, "/protected")).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body,
        json!({
            "msg": "Missing JWT in cookies or headers \
                    (Missing cookie \"access_token_cookie\"; Missing Authorization Header)"
        })
    );
}

#[tokio::test]
async fn test_logout_expires_cookies() {
    let app = cookie_app();
    let response = app.send(request(Method::POST, "/logout")).await;

    assert_eq!(response.status, StatusCode::OK);
    let cookies = response.set_cookies();
    assert_eq!(cookies.len(), 4);
    assert!(cookies.iter().all(|cookie| cookie.contains("Max-Age=0")));
    assert_eq!(response.cookie("access_token_cookie").as_deref(), Some(""));
}

#[tokio::test]
async fn test_cookie_login_with_header_only_locations() {
    let app = TestApp::new();
    let login = cookie_login(&app).await;

    let access = app
        .manager
        .decode_token(&login.access)
        .await
        .expect("valid token");
    assert_eq!(access.csrf.as_deref(), Some(login.csrf_access.as_str()));

    let response = app
        .send(bearer_request(Method::POST, "/fresh", &login.access))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}
