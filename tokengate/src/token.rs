//! Token data model.
//!
//! A [`DecodedToken`] only ever comes out of the codec's decode step, after the
//! signature and time claims have been verified. It is never mutated; a new
//! token is issued instead.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The two kinds of token the codec issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived credential for protected resources.
    Access,
    /// Long-lived credential that can only mint new access tokens.
    Refresh,
}

impl TokenType {
    /// Value of the `type` claim.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(format!("unknown token type '{other}'")),
        }
    }
}

/// A verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken<I> {
    /// Value of the identity claim.
    pub identity: I,
    /// Value of the `type` claim.
    pub token_type: TokenType,
    /// Always `false` for refresh tokens. A timestamp `fresh` claim is
    /// compared against the clock when the token is decoded.
    pub fresh: bool,
    /// Unique token identifier, the natural key for revocation lookups.
    pub jti: String,
    /// `iat`, seconds since the epoch.
    pub issued_at: i64,
    /// `exp`, seconds since the epoch.
    pub expires_at: i64,
    /// `nbf`, seconds since the epoch.
    pub not_before: Option<i64>,
    /// Double-submit value embedded when CSRF protection was active at issuance.
    pub csrf: Option<String>,
    /// Custom claims, empty when the token carries none.
    pub user_claims: Map<String, Value>,
    /// The complete verified payload.
    pub raw_claims: Map<String, Value>,
}

/// Error returned by the token codec.
///
/// Display strings are short fixed phrases that are safe to hand back to
/// clients; they never contain key material or primitive error text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Signature is valid but `exp` lies in the past.
    #[error("Token has expired")]
    Expired,
    /// The signature does not match the key.
    #[error("Signature verification failed")]
    InvalidSignature,
    /// The token could not be parsed or is missing a required claim.
    #[error("{0}")]
    Malformed(String),
    /// No key material was available for signing or verification.
    #[error("no {0} is available")]
    MissingKey(&'static str),
    /// Key material exists but does not fit the configured algorithm.
    #[error("invalid key material for the configured algorithm")]
    InvalidKey,
    /// The subject maps to no identity, or the identity cannot be written
    /// into the payload.
    #[error("no usable identity for the token subject")]
    Identity,
    /// Signing failed.
    #[error("failed to sign token")]
    Encoding,
}

impl TokenError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}
