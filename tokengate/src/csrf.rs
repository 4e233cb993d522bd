//! Double-submit CSRF protection for cookie transported tokens.
//!
//! When a token travels in a cookie the browser attaches it to cross-site
//! requests too. A random value is therefore embedded in the token at issuance
//! and must be echoed back in a request header, which a cross-site form cannot
//! set. Header transported tokens are never checked.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::codec::unverified_claims;
use crate::config::{JwtConfig, TokenLocation};
use crate::error::AuthError;
use crate::request::AuthRequest;
use crate::token::{DecodedToken, TokenError, TokenType};

/// Number of random bytes in a double-submit value.
const CSRF_VALUE_BYTES: usize = 32;

/// A fresh random double-submit value.
#[must_use]
pub fn generate_csrf_value() -> String {
    let bytes: [u8; CSRF_VALUE_BYTES] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The double-submit value embedded in `token`, if any.
///
/// Reads the payload without verifying it, so only call this on a token this
/// process just minted.
pub fn csrf_value_of(token: &str) -> Result<Option<String>, TokenError> {
    Ok(unverified_claims(token)?
        .get("csrf")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string))
}

/// Whether a token found at `location` must pass the double-submit check for
/// this request.
#[must_use]
pub fn csrf_check_applies(
    config: &JwtConfig,
    request: &AuthRequest,
    location: TokenLocation,
) -> bool {
    config.csrf_protect
        && location == TokenLocation::Cookies
        && config.is_csrf_method(request.method().as_str())
}

/// Header that carries the companion value for `token_type`.
#[must_use]
pub fn csrf_header_name(config: &JwtConfig, token_type: TokenType) -> &str {
    match token_type {
        TokenType::Access => &config.access_csrf_header_name,
        TokenType::Refresh => &config.refresh_csrf_header_name,
    }
}

/// Compare the value embedded in `token` against the request's CSRF header.
pub fn verify_csrf<I>(
    config: &JwtConfig,
    request: &AuthRequest,
    location: TokenLocation,
    token: &DecodedToken<I>,
) -> Result<(), AuthError> {
    if !csrf_check_applies(config, request, location) {
        return Ok(());
    }

    let presented = request
        .header(csrf_header_name(config, token.token_type))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthError::Csrf("Missing CSRF token in headers".to_string()))?;

    let Some(embedded) = token.csrf.as_deref() else {
        return Err(AuthError::InvalidToken("Missing claim: csrf".to_string()));
    };

    if bool::from(embedded.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(AuthError::Csrf(
            "CSRF double submit tokens do not match".to_string(),
        ))
    }
}
