//! axum extractors.
//!
//! Each extractor runs the pipeline with its own [`Requirement`] and rejects
//! with the response produced by the manager's hooks. The manager is taken
//! from the router state through [`JwtState`], which `Arc<JwtManager<I, U, S>>`
//! implements directly.
//!
//! ```rust,ignore
//! async fn protected(JwtRequired(token): JwtRequired<String>) -> Json<Value> {
//!     Json(json!({ "logged_in_as": token.identity() }))
//! }
//! ```
//!
//! Requests whose method is listed in `exempt_methods` skip verification in
//! [`JwtOptional`] and in `Option<JwtRequired<_>>` (and the other required
//! extractors wrapped in `Option`), which then yield no token. The plain
//! required extractors always verify.
//!
//! The extractors consume the request body only when the JSON location is
//! enabled and the request is `application/json`. They must then be the last
//! handler argument.

use std::ops::Deref;
use std::sync::Arc;

use axum::extract::{FromRequest, OptionalFromRequest, Request};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::callbacks::ErrorResponse;
use crate::config::TokenLocation;
use crate::error::AuthError;
use crate::pipeline::{AuthenticatedToken, Identity, JwtManager, Requirement, Subject};
use crate::request::AuthRequest;

/// Largest JSON body buffered while looking for a token.
const JSON_BODY_LIMIT: usize = 64 * 1024;

/// Router state that holds a [`JwtManager`].
pub trait JwtState: Send + Sync {
    /// Identity carried by the tokens.
    type Identity: Identity;
    /// User loaded by the user loader hook.
    type User: Send + 'static;
    /// Subject tokens are issued for.
    type Subject: Subject;

    /// The manager used by the extractors.
    fn jwt_manager(&self) -> &JwtManager<Self::Identity, Self::User, Self::Subject>;
}

impl<I, U, S> JwtState for Arc<JwtManager<I, U, S>>
where
    I: Identity,
    U: Send + 'static,
    S: Subject,
{
    type Identity = I;
    type User = U;
    type Subject = S;

    fn jwt_manager(&self) -> &JwtManager<I, U, S> {
        self
    }
}

/// Rejection carrying the classified error and its rendered response.
#[derive(Debug)]
pub struct JwtRejection {
    error: AuthError,
    response: ErrorResponse,
}

impl JwtRejection {
    fn new<I, U, S>(manager: &JwtManager<I, U, S>, error: AuthError) -> Self
    where
        I: Identity,
        U: Send + 'static,
        S: Subject,
    {
        Self {
            response: manager.error_response(&error),
            error,
        }
    }

    /// The classified failure.
    #[must_use]
    pub const fn error(&self) -> &AuthError {
        &self.error
    }

    /// The response sent to the client.
    #[must_use]
    pub const fn response(&self) -> &ErrorResponse {
        &self.response
    }
}

impl IntoResponse for JwtRejection {
    fn into_response(self) -> Response {
        self.response.into_response()
    }
}

async fn auth_request<I, U, S>(manager: &JwtManager<I, U, S>, request: Request) -> AuthRequest
where
    I: Identity,
    U: Send + 'static,
    S: Subject,
{
    let (parts, body) = request.into_parts();
    let auth_request = AuthRequest::from_parts(&parts);

    let json_enabled = manager.config().token_location.contains(&TokenLocation::Json);
    if !json_enabled || !auth_request.is_json() {
        return auth_request;
    }

    let json = match axum::body::to_bytes(body, JSON_BODY_LIMIT).await {
        Ok(bytes) => serde_json::from_slice::<Value>(&bytes).ok(),
        Err(error) => {
            tracing::debug!(%error, "failed to buffer json body");
            None
        }
    };
    match json {
        Some(json) => auth_request.with_json(json),
        None => auth_request,
    }
}

async fn authenticate<St: JwtState>(
    request: Request,
    state: &St,
    requirement: Requirement,
) -> Result<AuthenticatedToken<St::Identity, St::User>, JwtRejection> {
    let manager = state.jwt_manager();
    let request = auth_request(manager, request).await;
    manager
        .verify(&request, requirement)
        .await
        .into_result()
        .map_err(|error| JwtRejection::new(manager, error))
}

/// Requires a valid access token.
#[derive(Debug, Clone)]
pub struct JwtRequired<I, U = ()>(pub AuthenticatedToken<I, U>);

/// Requires a fresh access token.
#[derive(Debug, Clone)]
pub struct FreshJwtRequired<I, U = ()>(pub AuthenticatedToken<I, U>);

/// Requires a valid refresh token.
#[derive(Debug, Clone)]
pub struct RefreshJwtRequired<I, U = ()>(pub AuthenticatedToken<I, U>);

/// Accepts requests without a token; an offered token must still be valid.
#[derive(Debug, Clone)]
pub struct JwtOptional<I, U = ()>(pub Option<AuthenticatedToken<I, U>>);

macro_rules! required_extractor {
    ($extractor:ident, $requirement:expr) => {
        impl<St, I, U> FromRequest<St> for $extractor<I, U>
        where
            St: JwtState<Identity = I, User = U>,
            I: Identity,
            U: Send + 'static,
        {
            type Rejection = JwtRejection;

            async fn from_request(request: Request, state: &St) -> Result<Self, Self::Rejection> {
                authenticate(request, state, $requirement).await.map(Self)
            }
        }

        impl<St, I, U> OptionalFromRequest<St> for $extractor<I, U>
        where
            St: JwtState<Identity = I, User = U>,
            I: Identity,
            U: Send + 'static,
        {
            type Rejection = JwtRejection;

            async fn from_request(
                request: Request,
                state: &St,
            ) -> Result<Option<Self>, Self::Rejection> {
                if state.jwt_manager().is_exempt(request.method()) {
                    return Ok(None);
                }
                authenticate(request, state, $requirement).await.map(|token| Some(Self(token)))
            }
        }

        impl<I, U> Deref for $extractor<I, U> {
            type Target = AuthenticatedToken<I, U>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

required_extractor!(JwtRequired, Requirement::Access);
required_extractor!(FreshJwtRequired, Requirement::FreshAccess);
required_extractor!(RefreshJwtRequired, Requirement::Refresh);

impl<St, I, U> FromRequest<St> for JwtOptional<I, U>
where
    St: JwtState<Identity = I, User = U>,
    I: Identity,
    U: Send + 'static,
{
    type Rejection = JwtRejection;

    async fn from_request(request: Request, state: &St) -> Result<Self, Self::Rejection> {
        let manager = state.jwt_manager();
        let request = auth_request(manager, request).await;
        manager
            .verify_optional(&request)
            .await
            .map(Self)
            .map_err(|error| JwtRejection::new(manager, error))
    }
}
