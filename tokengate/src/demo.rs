//! Demo service.
//!
//! A small axum application showing token issuance and the extractors:
//!
//! - `POST /login`: exchange `{"username", "password"}` for a fresh access
//!   token and a refresh token
//! - `POST /login/cookies`: same exchange, tokens delivered as cookies
//! - `POST /logout`: expire the token cookies
//! - `POST /refresh`: exchange a refresh token for a non-fresh access token
//! - `GET /protected`: any valid access token
//! - `POST /fresh`: fresh access tokens only
//! - `GET /optional`: works with or without a token
//!
//! # Environment Variables
//!
//! - `TOKENGATE_LISTEN_PORT`: Port to listen on (default: `3000`)
//! - `JWT_*`: token settings, see [`JwtConfig::from_env`](crate::JwtConfig::from_env)

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::callbacks::ErrorResponse;
use crate::extract::{FreshJwtRequired, JwtOptional, JwtRequired, JwtState, RefreshJwtRequired};
use crate::pipeline::{AuthenticatedToken, JwtManager};
use crate::token::TokenError;

/// Settings for the demo binary itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Port the demo listens on.
    pub listen_port: u16,
}

/// Error returned when loading the demo settings fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DemoConfigError {
    /// A variable is set to an unusable value.
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

impl DemoConfig {
    /// Port used when `TOKENGATE_LISTEN_PORT` is unset.
    pub const DEFAULT_PORT: u16 = 3000;

    /// Load the settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`DemoConfigError::InvalidValue`] for an unusable port.
    pub fn from_env() -> Result<Self, DemoConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`DemoConfigError::InvalidValue`] for an unusable port.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DemoConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_port = match lookup("TOKENGATE_LISTEN_PORT") {
            Some(value) => value
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| DemoConfigError::InvalidValue {
                    name: "TOKENGATE_LISTEN_PORT".to_string(),
                    message: format!("'{value}' is not a valid port number (must be 1-65535)"),
                })?,
            None => Self::DEFAULT_PORT,
        };
        Ok(Self { listen_port })
    }
}

/// Router state of the demo service.
#[derive(Clone)]
pub struct DemoState {
    manager: Arc<JwtManager<String>>,
}

impl JwtState for DemoState {
    type Identity = String;
    type User = ();
    type Subject = String;

    fn jwt_manager(&self) -> &JwtManager<String> {
        &self.manager
    }
}

/// Routes of the demo service.
pub fn router(manager: Arc<JwtManager<String>>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/login/cookies", post(login_with_cookies))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/protected", get(protected))
        .route("/fresh", post(fresh))
        .route("/optional", get(optional))
        .with_state(DemoState { manager })
}

fn message(state: &DemoState, status: StatusCode, text: &str) -> Response {
    ErrorResponse::message(status, &state.manager.config().error_message_key, text).into_response()
}

/// Checks the demo credentials and returns the username.
fn check_credentials(
    state: &DemoState,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<String, Response> {
    let Ok(Json(body)) = body else {
        return Err(message(state, StatusCode::BAD_REQUEST, "Missing JSON in request"));
    };
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    };

    let Some(username) = field("username") else {
        return Err(message(state, StatusCode::BAD_REQUEST, "Missing username parameter"));
    };
    let Some(password) = field("password") else {
        return Err(message(state, StatusCode::BAD_REQUEST, "Missing password parameter"));
    };
    if username != "test" || password != "test" {
        return Err(message(state, StatusCode::FORBIDDEN, "Bad username or password"));
    }
    Ok(username.to_string())
}

async fn issue_pair(state: &DemoState, username: &str) -> Result<(String, String), Response> {
    let manager = &state.manager;
    let identity = username.to_string();
    let tokens = async {
        let access = manager.create_access_token(&identity, true, None).await?;
        let refresh = manager.create_refresh_token(&identity, None).await?;
        Ok::<_, TokenError>((access, refresh))
    };
    tokens.await.map_err(|error| {
        tracing::error!(%error, "failed to issue tokens");
        message(state, StatusCode::INTERNAL_SERVER_ERROR, "Could not issue tokens")
    })
}

async fn login(
    State(state): State<DemoState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let username = match check_credentials(&state, body) {
        Ok(username) => username,
        Err(response) => return response,
    };
    match issue_pair(&state, &username).await {
        Ok((access_token, refresh_token)) => {
            tracing::info!(%username, "issued token pair");
            let body = json!({"access_token": access_token, "refresh_token": refresh_token});
            Json(body).into_response()
        }
        Err(response) => response,
    }
}

async fn login_with_cookies(
    State(state): State<DemoState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let username = match check_credentials(&state, body) {
        Ok(username) => username,
        Err(response) => return response,
    };
    let (access_token, refresh_token) = match issue_pair(&state, &username).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let mut headers = HeaderMap::new();
    let cookies = state
        .manager
        .set_access_cookies(&mut headers, &access_token, None)
        .and_then(|()| state.manager.set_refresh_cookies(&mut headers, &refresh_token, None));
    if let Err(error) = cookies {
        tracing::error!(%error, "failed to set token cookies");
        return message(&state, StatusCode::INTERNAL_SERVER_ERROR, "Could not set cookies");
    }
    tracing::info!(%username, "issued token cookies");
    (headers, Json(json!({"login": true}))).into_response()
}

async fn logout(State(state): State<DemoState>) -> Response {
    let mut headers = HeaderMap::new();
    if let Err(error) = state.manager.unset_jwt_cookies(&mut headers) {
        tracing::error!(%error, "failed to unset token cookies");
        return message(&state, StatusCode::INTERNAL_SERVER_ERROR, "Could not unset cookies");
    }
    (headers, Json(json!({"logout": true}))).into_response()
}

async fn refresh(
    State(state): State<DemoState>,
    RefreshJwtRequired(token): RefreshJwtRequired<String>,
) -> Response {
    let access_token = state
        .manager
        .create_access_token(token.identity(), false, None)
        .await;
    match access_token {
        Ok(access_token) => Json(json!({"access_token": access_token})).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to refresh access token");
            message(&state, StatusCode::INTERNAL_SERVER_ERROR, "Could not issue tokens")
        }
    }
}

async fn protected(JwtRequired(token): JwtRequired<String>) -> Json<Value> {
    Json(json!({"logged_in_as": token.identity(), "claims": token.user_claims()}))
}

async fn fresh(FreshJwtRequired(token): FreshJwtRequired<String>) -> Json<Value> {
    Json(json!({"fresh_logged_in_as": token.identity()}))
}

async fn optional(JwtOptional(token): JwtOptional<String>) -> Json<Value> {
    Json(json!({"logged_in_as": token.as_ref().map(AuthenticatedToken::identity)}))
}
