//! Policy hooks.
//!
//! The registry holds exactly one implementation per hook. Construction seeds
//! every hook with its default, and each setter replaces the current
//! implementation (last registration wins). Once handed to a
//! [`JwtManager`](crate::JwtManager) the registry is never modified again.
//!
//! Decision hooks are async because they may do I/O (key lookup, revocation
//! store, user database). Response hooks are plain functions that turn a
//! rejection into an [`ErrorResponse`].

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::JwtConfig;
use crate::error::{AuthError, display_identity};
use crate::token::DecodedToken;

/// An async hook taking `A` and resolving to `R`.
pub type AsyncHook<A, R> = Arc<dyn Fn(A) -> BoxFuture<'static, R> + Send + Sync>;

/// A hook producing the response for one class of rejection.
pub type ResponseHook<A> = Arc<dyn Fn(A) -> ErrorResponse + Send + Sync>;

/// Transport-level failure: status code plus JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Response status.
    pub status: StatusCode,
    /// JSON response body.
    pub body: Value,
}

impl ErrorResponse {
    /// `{<message_key>: <message>}` with `status`.
    #[must_use]
    pub fn message(status: StatusCode, message_key: &str, message: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert(message_key.to_string(), Value::String(message.into()));
        Self {
            status,
            body: Value::Object(body),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn boxed<A, R, F, Fut>(hook: F) -> AsyncHook<A, R>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    Arc::new(move |arg| hook(arg).boxed())
}

/// Every overridable hook, seeded with defaults.
///
/// `I` is the identity type written into tokens, `U` the type produced by the
/// optional user loader and `S` the subject tokens are issued for.
pub struct CallbackRegistry<I, U, S = I> {
    pub(crate) user_identity: AsyncHook<S, Option<I>>,
    pub(crate) user_claims: AsyncHook<S, Map<String, Value>>,
    pub(crate) encode_key: AsyncHook<S, Option<String>>,
    pub(crate) decode_key: AsyncHook<Map<String, Value>, Option<String>>,
    pub(crate) token_in_blacklist: Option<AsyncHook<DecodedToken<I>, bool>>,
    pub(crate) claims_verification: AsyncHook<Map<String, Value>, bool>,
    pub(crate) user_loader: Option<AsyncHook<I, Option<U>>>,

    pub(crate) expired_token: ResponseHook<()>,
    pub(crate) invalid_token: ResponseHook<String>,
    pub(crate) unauthorized: ResponseHook<String>,
    pub(crate) needs_fresh_token: ResponseHook<()>,
    pub(crate) revoked_token: ResponseHook<()>,
    pub(crate) user_loader_error: ResponseHook<Value>,
    pub(crate) claims_verification_failed: ResponseHook<()>,

    custom_encode_key: bool,
    custom_decode_key: bool,
}

impl<I, U, S> CallbackRegistry<I, U, S>
where
    I: DeserializeOwned + Send + 'static,
    U: Send + 'static,
    S: Serialize + Send + 'static,
{
    /// A registry holding the default implementation of every hook.
    ///
    /// Default key hooks hand out the key material from `config`; default
    /// response hooks answer with `{<error_message_key>: <message>}`.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let encode_key = config.encode_key().map(ToString::to_string);
        let decode_key = config.decode_key().map(ToString::to_string);
        let key = config.error_message_key.clone();

        Self {
            user_identity: boxed(|subject: S| async move {
                serde_json::to_value(&subject)
                    .and_then(serde_json::from_value)
                    .ok()
            }),
            user_claims: boxed(|_subject: S| async { Map::new() }),
            encode_key: boxed(move |_subject: S| {
                let key = encode_key.clone();
                async move { key }
            }),
            decode_key: boxed(move |_claims: Map<String, Value>| {
                let key = decode_key.clone();
                async move { key }
            }),
            token_in_blacklist: None,
            claims_verification: boxed(|_claims: Map<String, Value>| async { true }),
            user_loader: None,

            expired_token: {
                let key = key.clone();
                Arc::new(move |()| {
                    ErrorResponse::message(StatusCode::UNAUTHORIZED, &key, "Token has expired")
                })
            },
            invalid_token: {
                let key = key.clone();
                Arc::new(move |reason: String| {
                    ErrorResponse::message(StatusCode::UNPROCESSABLE_ENTITY, &key, reason)
                })
            },
            unauthorized: {
                let key = key.clone();
                Arc::new(move |reason: String| {
                    ErrorResponse::message(StatusCode::UNAUTHORIZED, &key, reason)
                })
            },
            needs_fresh_token: {
                let key = key.clone();
                Arc::new(move |()| {
                    ErrorResponse::message(StatusCode::UNAUTHORIZED, &key, "Fresh token required")
                })
            },
            revoked_token: {
                let key = key.clone();
                Arc::new(move |()| {
                    ErrorResponse::message(StatusCode::UNAUTHORIZED, &key, "Token has been revoked")
                })
            },
            user_loader_error: {
                let key = key.clone();
                Arc::new(move |identity: Value| {
                    ErrorResponse::message(
                        StatusCode::UNAUTHORIZED,
                        &key,
                        format!("Error loading the user {}", display_identity(&identity)),
                    )
                })
            },
            claims_verification_failed: Arc::new(move |()| {
                ErrorResponse::message(
                    StatusCode::BAD_REQUEST,
                    &key,
                    "User claims verification failed",
                )
            }),

            custom_encode_key: false,
            custom_decode_key: false,
        }
    }

    /// Maps the subject passed to token creation onto the identity written
    /// into the token. `None` fails issuance.
    ///
    /// Default: the subject's serde form read back as `I`, which is the
    /// subject itself when `S` and `I` are the same type.
    pub fn set_user_identity<F, Fut>(&mut self, hook: F)
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<I>> + Send + 'static,
    {
        self.user_identity = boxed(hook);
    }

    /// Custom claims added to access tokens (and refresh tokens when
    /// configured). Default: none.
    pub fn set_user_claims<F, Fut>(&mut self, hook: F)
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Map<String, Value>> + Send + 'static,
    {
        self.user_claims = boxed(hook);
    }

    /// Signing key for a subject. `None` fails issuance.
    pub fn set_encode_key<F, Fut>(&mut self, hook: F)
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.encode_key = boxed(hook);
        self.custom_encode_key = true;
    }

    /// Verification key chosen from a token's unverified claims. `None`
    /// rejects the token.
    pub fn set_decode_key<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.decode_key = boxed(hook);
        self.custom_decode_key = true;
    }

    /// Revocation predicate. Only consulted when revocation is enabled.
    pub fn set_token_in_blacklist<F, Fut>(&mut self, hook: F)
    where
        F: Fn(DecodedToken<I>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.token_in_blacklist = Some(boxed(hook));
    }

    /// Predicate over custom claims. Default: always valid.
    pub fn set_claims_verification<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.claims_verification = boxed(hook);
    }

    /// Resolves an identity to a richer user object after verification.
    pub fn set_user_loader<F, Fut>(&mut self, hook: F)
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<U>> + Send + 'static,
    {
        self.user_loader = Some(boxed(hook));
    }

    /// Response for a token whose `exp` has passed. Default: 401.
    pub fn set_expired_token<F>(&mut self, hook: F)
    where
        F: Fn() -> ErrorResponse + Send + Sync + 'static,
    {
        self.expired_token = Arc::new(move |()| hook());
    }

    /// Response for a malformed or badly signed token, a malformed
    /// `Authorization` header, or a token of the wrong type. Receives the
    /// reason. Default: 422.
    pub fn set_invalid_token<F>(&mut self, hook: F)
    where
        F: Fn(String) -> ErrorResponse + Send + Sync + 'static,
    {
        self.invalid_token = Arc::new(hook);
    }

    /// Response when no token was found or the CSRF check failed. Receives
    /// the reason. Default: 401.
    pub fn set_unauthorized<F>(&mut self, hook: F)
    where
        F: Fn(String) -> ErrorResponse + Send + Sync + 'static,
    {
        self.unauthorized = Arc::new(hook);
    }

    /// Response for a non-fresh token where a fresh one is required.
    /// Default: 401.
    pub fn set_needs_fresh_token<F>(&mut self, hook: F)
    where
        F: Fn() -> ErrorResponse + Send + Sync + 'static,
    {
        self.needs_fresh_token = Arc::new(move |()| hook());
    }

    /// Response for a token the revocation predicate flagged. Default: 401.
    pub fn set_revoked_token<F>(&mut self, hook: F)
    where
        F: Fn() -> ErrorResponse + Send + Sync + 'static,
    {
        self.revoked_token = Arc::new(move |()| hook());
    }

    /// Receives the identity (as JSON) that failed to load.
    pub fn set_user_loader_error<F>(&mut self, hook: F)
    where
        F: Fn(Value) -> ErrorResponse + Send + Sync + 'static,
    {
        self.user_loader_error = Arc::new(hook);
    }

    /// Response when the claims verification hook rejects a token.
    /// Default: 400.
    pub fn set_claims_verification_failed<F>(&mut self, hook: F)
    where
        F: Fn() -> ErrorResponse + Send + Sync + 'static,
    {
        self.claims_verification_failed = Arc::new(move |()| hook());
    }

    /// Whether `encode_key` was replaced, lifting the need for configured
    /// signing key material.
    #[must_use]
    pub const fn has_custom_encode_key(&self) -> bool {
        self.custom_encode_key
    }

    /// Whether `decode_key` was replaced, lifting the need for configured
    /// verification key material.
    #[must_use]
    pub const fn has_custom_decode_key(&self) -> bool {
        self.custom_decode_key
    }

    /// Whether verified requests go through a user loader.
    #[must_use]
    pub const fn has_user_loader(&self) -> bool {
        self.user_loader.is_some()
    }

    /// Produce the response for `error` through its hook.
    ///
    /// Each error kind is routed to exactly one hook.
    #[must_use]
    pub fn error_response(&self, error: &AuthError) -> ErrorResponse {
        match error {
            AuthError::NoAuthorization(reason) | AuthError::Csrf(reason) => {
                (self.unauthorized)(reason.clone())
            }
            AuthError::InvalidHeader(reason) | AuthError::InvalidToken(reason) => {
                (self.invalid_token)(reason.clone())
            }
            AuthError::WrongToken { .. } => (self.invalid_token)(error.detail()),
            AuthError::Expired => (self.expired_token)(()),
            AuthError::FreshTokenRequired => (self.needs_fresh_token)(()),
            AuthError::Revoked => (self.revoked_token)(()),
            AuthError::UserClaimsVerification => (self.claims_verification_failed)(()),
            AuthError::UserLoad { identity } => (self.user_loader_error)(identity.clone()),
        }
    }
}
