//! Signed bearer tokens for axum services.
//!
//! Issues access and refresh tokens, finds them again in incoming requests
//! (headers, cookies, query string or JSON body), and runs a fixed-order
//! verification pipeline whose policy points are caller supplied hooks:
//! key resolution, custom claims, revocation, claims verification, user
//! loading and the response produced for every kind of rejection.
//!
//! Life of a verification:
//! 1. Locate the token in the configured locations, in order
//! 2. Decode it with the key chosen by the `decode_key` hook
//! 3. Check its type and, when required, its freshness
//! 4. Ask the revocation predicate, then verify custom claims
//! 5. Check the CSRF double-submit value for cookie transport
//! 6. Load the user, when a loader is registered
//!
//! Any failure is classified as an [`AuthError`] and rendered by exactly one
//! response hook.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod callbacks;
pub mod claims;
pub mod codec;
pub mod config;
pub mod cookies;
pub mod csrf;
pub mod demo;
pub mod error;
pub mod extract;
pub mod location;
pub mod pipeline;
pub mod request;
pub mod revocation;
pub mod token;


pub use callbacks::{AsyncHook, CallbackRegistry, ErrorResponse, ResponseHook};
pub use config::{ConfigError, JwtConfig, SameSite, TokenLocation};
pub use cookies::CookieError;
pub use error::{AuthError, ErrorKind};
pub use extract::{
    FreshJwtRequired, JwtOptional, JwtRejection, JwtRequired, JwtState, RefreshJwtRequired,
};
pub use pipeline::{
    AuthenticatedToken, Identity, JwtManager, JwtManagerBuilder, Requirement, Subject,
    VerificationOutcome,
};
pub use request::AuthRequest;
pub use token::{DecodedToken, TokenError, TokenType};
