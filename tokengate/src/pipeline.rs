//! Token issuance and the verification pipeline.
//!
//! [`JwtManager`] owns the configuration, the codec and the frozen
//! [`CallbackRegistry`]. It is built once through [`JwtManagerBuilder`] and
//! then shared as `Arc<JwtManager<I, U, S>>`.
//!
//! Tokens are issued for a subject `S` (by default the identity type itself).
//! The `user_identity` hook maps the subject onto the identity `I` written
//! into the token, while `user_claims` and `encode_key` see the whole subject.
//!
//! Verification runs these stages in order and stops at the first failure:
//!
//! 1. locate the token in the request
//! 2. decode it (key chosen by the `decode_key` hook)
//! 3. check the token type
//! 4. check freshness, when required
//! 5. ask the revocation predicate
//! 6. verify custom claims
//! 7. check the CSRF double-submit value for cookie transport
//! 8. load the user, when a loader is registered

use axum::http::Method;
use chrono::TimeDelta;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::callbacks::{CallbackRegistry, ErrorResponse};
use crate::claims::verify_user_claims;
use crate::codec::{NewToken, TokenCodec, unverified_claims};
use crate::config::{ConfigError, JwtConfig, TokenLocation};
use crate::csrf::verify_csrf;
use crate::error::AuthError;
use crate::location::extract_token;
use crate::request::AuthRequest;
use crate::revocation::is_revoked;
use crate::token::{DecodedToken, TokenError, TokenType};

/// Types usable as a token identity.
///
/// The serde representation is what gets written into the identity claim.
pub trait Identity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Identity for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Types tokens can be issued for.
pub trait Subject: Serialize + Clone + Send + Sync + 'static {}

impl<T> Subject for T where T: Serialize + Clone + Send + Sync + 'static {}

/// What a protected endpoint demands of the presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any valid access token.
    Access,
    /// An access token issued directly from a credential exchange.
    FreshAccess,
    /// A refresh token.
    Refresh,
}

impl Requirement {
    /// The token type this requirement accepts.
    #[must_use]
    pub const fn token_type(self) -> TokenType {
        match self {
            Self::Access | Self::FreshAccess => TokenType::Access,
            Self::Refresh => TokenType::Refresh,
        }
    }
}

/// A request that passed every verification stage.
#[derive(Debug, Clone)]
pub struct AuthenticatedToken<I, U = ()> {
    /// The verified claims.
    pub token: DecodedToken<I>,
    /// Where the token was found.
    pub location: TokenLocation,
    /// Set only when a user loader is registered.
    pub user: Option<U>,
}

impl<I, U> AuthenticatedToken<I, U> {
    /// The identity read from the identity claim.
    #[must_use]
    pub const fn identity(&self) -> &I {
        &self.token.identity
    }

    /// Custom claims, empty when the token carries none.
    #[must_use]
    pub const fn user_claims(&self) -> &Map<String, Value> {
        &self.token.user_claims
    }

    /// Access or refresh.
    #[must_use]
    pub const fn token_type(&self) -> TokenType {
        self.token.token_type
    }

    /// Whether the token came straight from a credential exchange.
    #[must_use]
    pub const fn fresh(&self) -> bool {
        self.token.fresh
    }

    /// Unique token identifier.
    #[must_use]
    pub fn jti(&self) -> &str {
        &self.token.jti
    }

    /// The complete verified payload.
    #[must_use]
    pub const fn raw_claims(&self) -> &Map<String, Value> {
        &self.token.raw_claims
    }

    /// The loaded user, when a user loader is registered.
    #[must_use]
    pub const fn user(&self) -> Option<&U> {
        self.user.as_ref()
    }
}

/// Terminal result of one verification.
#[derive(Debug, Clone)]
pub enum VerificationOutcome<I, U = ()> {
    /// Every stage passed.
    Authenticated(AuthenticatedToken<I, U>),
    /// A stage failed.
    Rejected(AuthError),
}

impl<I, U> VerificationOutcome<I, U> {
    /// Whether every stage passed.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The authenticated token, or the error that rejected the request.
    pub fn into_result(self) -> Result<AuthenticatedToken<I, U>, AuthError> {
        match self {
            Self::Authenticated(token) => Ok(token),
            Self::Rejected(error) => Err(error),
        }
    }
}

impl<I, U> From<Result<AuthenticatedToken<I, U>, AuthError>> for VerificationOutcome<I, U> {
    fn from(result: Result<AuthenticatedToken<I, U>, AuthError>) -> Self {
        match result {
            Ok(token) => Self::Authenticated(token),
            Err(error) => Self::Rejected(error),
        }
    }
}

/// Issues and verifies tokens under one configuration and one set of hooks.
pub struct JwtManager<I, U = (), S = I> {
    config: JwtConfig,
    codec: TokenCodec,
    callbacks: CallbackRegistry<I, U, S>,
}

impl<I, U, S> std::fmt::Debug for JwtManager<I, U, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl<I: Identity, U: Send + 'static, S: Subject> JwtManager<I, U, S> {
    /// Start configuring a manager. Every hook begins at its default.
    #[must_use]
    pub fn builder(config: JwtConfig) -> JwtManagerBuilder<I, U, S> {
        JwtManagerBuilder {
            callbacks: CallbackRegistry::new(&config),
            config,
        }
    }

    /// A manager with every hook at its default.
    pub fn new(config: JwtConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// The configuration the manager was built with.
    #[must_use]
    pub const fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Sign a token for `subject`.
    ///
    /// The identity claim comes from the `user_identity` hook and the key from
    /// the `encode_key` hook. `expires_delta` defaults to the configured
    /// lifetime for `token_type`.
    ///
    /// # Errors
    ///
    /// [`TokenError::Identity`] when the subject maps to no identity,
    /// [`TokenError::MissingKey`] when no signing key is available, and any
    /// codec failure.
    pub async fn encode_token(
        &self,
        subject: &S,
        token_type: TokenType,
        fresh: bool,
        expires_delta: Option<TimeDelta>,
        user_claims: Option<Map<String, Value>>,
    ) -> Result<String, TokenError> {
        let expires_delta = expires_delta.unwrap_or(match token_type {
            TokenType::Access => self.config.access_token_expires,
            TokenType::Refresh => self.config.refresh_token_expires,
        });

        let Some(identity) = (self.callbacks.user_identity)(subject.clone()).await else {
            tracing::warn!(%token_type, "user_identity hook returned no identity");
            return Err(TokenError::Identity);
        };
        let Some(key) = (self.callbacks.encode_key)(subject.clone()).await else {
            tracing::warn!(%token_type, "encode_key hook returned no key");
            return Err(TokenError::MissingKey("signing key"));
        };

        let new = NewToken {
            identity: &identity,
            token_type,
            fresh,
            expires_delta,
            user_claims,
        };
        self.codec.encode(&new, &key)
    }

    /// Issue an access token carrying the claims from the `user_claims` hook.
    ///
    /// # Arguments
    ///
    /// * `subject` - Who the token is for
    /// * `fresh` - Whether the token comes straight from a credential exchange
    /// * `expires_delta` - Lifetime override, `None` for the configured one
    pub async fn create_access_token(
        &self,
        subject: &S,
        fresh: bool,
        expires_delta: Option<TimeDelta>,
    ) -> Result<String, TokenError> {
        let claims = (self.callbacks.user_claims)(subject.clone()).await;
        self.encode_token(subject, TokenType::Access, fresh, expires_delta, Some(claims))
            .await
    }

    /// Issue a refresh token. Custom claims are included only when
    /// `user_claims_in_refresh_token` is set.
    pub async fn create_refresh_token(
        &self,
        subject: &S,
        expires_delta: Option<TimeDelta>,
    ) -> Result<String, TokenError> {
        let claims = if self.config.user_claims_in_refresh_token {
            Some((self.callbacks.user_claims)(subject.clone()).await)
        } else {
            None
        };
        self.encode_token(subject, TokenType::Refresh, false, expires_delta, claims)
            .await
    }

    /// Verify `token` and read its claims.
    ///
    /// Only the signature and time claims are checked; type, freshness,
    /// revocation and the remaining stages belong to [`Self::verify`].
    pub async fn decode_token(&self, token: &str) -> Result<DecodedToken<I>, TokenError> {
        let claims = unverified_claims(token)?;
        let Some(key) = (self.callbacks.decode_key)(claims).await else {
            tracing::warn!("decode_key hook returned no key");
            return Err(TokenError::MissingKey("verification key"));
        };
        self.codec.decode(token, &key)
    }

    /// Whether requests with `method` skip verification in
    /// [`Self::verify_optional`] and the `Option<...>` extractors.
    #[must_use]
    pub fn is_exempt(&self, method: &Method) -> bool {
        self.config.is_exempt_method(method.as_str())
    }

    /// Run the full pipeline for `request`.
    ///
    /// Always verifies, whatever the request method.
    pub async fn verify(
        &self,
        request: &AuthRequest,
        requirement: Requirement,
    ) -> VerificationOutcome<I, U> {
        let result = self.run(request, requirement).await;
        if let Err(error) = &result {
            tracing::debug!(kind = ?error.kind(), ?requirement, "token rejected");
        }
        result.into()
    }

    /// Verify an access token if one is offered.
    ///
    /// A missing token (or an unusable `Authorization` header) yields
    /// `Ok(None)`, as does an exempt request method; any other failure still
    /// rejects.
    pub async fn verify_optional(
        &self,
        request: &AuthRequest,
    ) -> Result<Option<AuthenticatedToken<I, U>>, AuthError> {
        if self.is_exempt(request.method()) {
            return Ok(None);
        }
        match self.verify(request, Requirement::Access).await.into_result() {
            Ok(token) => Ok(Some(token)),
            Err(error) if error.is_missing_token() => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// The response the registered hooks produce for `error`.
    #[must_use]
    pub fn error_response(&self, error: &AuthError) -> ErrorResponse {
        self.callbacks.error_response(error)
    }

    async fn run(
        &self,
        request: &AuthRequest,
        requirement: Requirement,
    ) -> Result<AuthenticatedToken<I, U>, AuthError> {
        let expected = requirement.token_type();
        let located = extract_token(&self.config, request, expected)?;

        let token = self.decode_token(&located.token).await?;

        if token.token_type != expected {
            return Err(AuthError::WrongToken {
                expected,
                actual: token.token_type,
            });
        }

        if requirement == Requirement::FreshAccess && !token.fresh {
            return Err(AuthError::FreshTokenRequired);
        }

        if is_revoked(&self.config, self.callbacks.token_in_blacklist.as_ref(), &token).await {
            tracing::warn!(
                jti = %token.jti,
                token_type = %token.token_type,
                "revoked token presented"
            );
            return Err(AuthError::Revoked);
        }

        if self.checks_user_claims(token.token_type)
            && !verify_user_claims(&self.callbacks.claims_verification, &token.user_claims).await
        {
            return Err(AuthError::UserClaimsVerification);
        }

        verify_csrf(&self.config, request, located.location, &token)?;

        let user = self.load_user(&token.identity).await?;

        Ok(AuthenticatedToken {
            token,
            location: located.location,
            user,
        })
    }

    fn checks_user_claims(&self, token_type: TokenType) -> bool {
        match token_type {
            TokenType::Access => true,
            TokenType::Refresh => self.config.user_claims_in_refresh_token,
        }
    }

    async fn load_user(&self, identity: &I) -> Result<Option<U>, AuthError> {
        let Some(loader) = &self.callbacks.user_loader else {
            return Ok(None);
        };
        match loader(identity.clone()).await {
            Some(user) => Ok(Some(user)),
            None => Err(AuthError::UserLoad {
                identity: serde_json::to_value(identity).unwrap_or(Value::Null),
            }),
        }
    }
}

/// Collects hook overrides before freezing them into a [`JwtManager`].
///
/// Each method replaces the current implementation of one hook; calling the
/// same method twice keeps the last one.
pub struct JwtManagerBuilder<I, U = (), S = I> {
    config: JwtConfig,
    callbacks: CallbackRegistry<I, U, S>,
}

impl<I: Identity, U: Send + 'static, S: Subject> JwtManagerBuilder<I, U, S> {
    /// See [`CallbackRegistry::set_user_identity`].
    #[must_use]
    pub fn user_identity_loader<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<I>> + Send + 'static,
    {
        self.callbacks.set_user_identity(hook);
        self
    }

    /// See [`CallbackRegistry::set_user_claims`].
    #[must_use]
    pub fn user_claims_loader<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Map<String, Value>> + Send + 'static,
    {
        self.callbacks.set_user_claims(hook);
        self
    }

    /// See [`CallbackRegistry::set_encode_key`].
    #[must_use]
    pub fn encode_key_loader<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.callbacks.set_encode_key(hook);
        self
    }

    /// See [`CallbackRegistry::set_decode_key`].
    #[must_use]
    pub fn decode_key_loader<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.callbacks.set_decode_key(hook);
        self
    }

    /// See [`CallbackRegistry::set_token_in_blacklist`].
    #[must_use]
    pub fn token_in_blacklist_loader<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(DecodedToken<I>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.callbacks.set_token_in_blacklist(hook);
        self
    }

    /// See [`CallbackRegistry::set_claims_verification`].
    #[must_use]
    pub fn claims_verification_loader<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.callbacks.set_claims_verification(hook);
        self
    }

    /// See [`CallbackRegistry::set_user_loader`].
    #[must_use]
    pub fn user_loader_callback_loader<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<U>> + Send + 'static,
    {
        self.callbacks.set_user_loader(hook);
        self
    }

    /// See [`CallbackRegistry::set_expired_token`].
    #[must_use]
    pub fn expired_token_loader<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> ErrorResponse + Send + Sync + 'static,
    {
        self.callbacks.set_expired_token(hook);
        self
    }

    /// See [`CallbackRegistry::set_invalid_token`].
    #[must_use]
    pub fn invalid_token_loader<F>(mut self, hook: F) -> Self
    where
        F: Fn(String) -> ErrorResponse + Send + Sync + 'static,
    {
        self.callbacks.set_invalid_token(hook);
        self
    }

    /// See [`CallbackRegistry::set_unauthorized`].
    #[must_use]
    pub fn unauthorized_loader<F>(mut self, hook: F) -> Self
    where
        F: Fn(String) -> ErrorResponse + Send + Sync + 'static,
    {
        self.callbacks.set_unauthorized(hook);
        self
    }

    /// See [`CallbackRegistry::set_needs_fresh_token`].
    #[must_use]
    pub fn needs_fresh_token_loader<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> ErrorResponse + Send + Sync + 'static,
    {
        self.callbacks.set_needs_fresh_token(hook);
        self
    }

    /// See [`CallbackRegistry::set_revoked_token`].
    #[must_use]
    pub fn revoked_token_loader<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> ErrorResponse + Send + Sync + 'static,
    {
        self.callbacks.set_revoked_token(hook);
        self
    }

    /// See [`CallbackRegistry::set_user_loader_error`].
    #[must_use]
    pub fn user_loader_error_loader<F>(mut self, hook: F) -> Self
    where
        F: Fn(Value) -> ErrorResponse + Send + Sync + 'static,
    {
        self.callbacks.set_user_loader_error(hook);
        self
    }

    /// See [`CallbackRegistry::set_claims_verification_failed`].
    #[must_use]
    pub fn claims_verification_failed_loader<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> ErrorResponse + Send + Sync + 'static,
    {
        self.callbacks.set_claims_verification_failed(hook);
        self
    }

    /// Validate the configuration and freeze the hooks.
    ///
    /// Fails when a default key hook would have no key material to hand out.
    pub fn build(self) -> Result<JwtManager<I, U, S>, ConfigError> {
        let config = self.config;
        config.validate()?;

        let has_key = |key: Option<&str>| key.is_some_and(|key| !key.is_empty());
        if !self.callbacks.has_custom_encode_key() && !has_key(config.encode_key()) {
            return Err(ConfigError::MissingKey {
                name: config.encode_key_name(),
                algorithm: config.algorithm,
            });
        }
        if !self.callbacks.has_custom_decode_key() && !has_key(config.decode_key()) {
            return Err(ConfigError::MissingKey {
                name: config.decode_key_name(),
                algorithm: config.algorithm,
            });
        }

        tracing::debug!(
            algorithm = ?config.algorithm,
            locations = ?config.token_location,
            blacklist_enabled = config.blacklist_enabled,
            "jwt manager configured"
        );

        Ok(JwtManager {
            codec: TokenCodec::new(&config),
            config,
            callbacks: self.callbacks,
        })
    }
}
