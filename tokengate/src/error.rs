//! Verification failures.
//!
//! Every rejection is classified where it is detected and carries just enough
//! context for its response hook: a fixed reason string, or the identity that
//! failed to load.

use serde_json::Value;

use crate::token::{TokenError, TokenType};

/// Classification of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No token anywhere.
    NoAuthorization,
    /// Unusable `Authorization` header.
    InvalidHeader,
    /// Past `exp`.
    Expired,
    /// Malformed payload or bad signature.
    InvalidToken,
    /// Access token where a refresh token was required, or the reverse.
    WrongToken,
    /// Non-fresh access token on a fresh-only route.
    FreshTokenRequired,
    /// Rejected by the revocation predicate.
    Revoked,
    /// Failed double-submit check.
    Csrf,
    /// Rejected by the claims verification hook.
    UserClaimsVerification,
    /// The user loader found nobody.
    UserLoad,
}

/// A rejected verification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// No candidate token was found in any configured location.
    #[error("{0}")]
    NoAuthorization(String),
    /// A token envelope was present but malformed.
    #[error("{0}")]
    InvalidHeader(String),
    /// The token's `exp` lies in the past.
    #[error("Token has expired")]
    Expired,
    /// The token failed to decode or verify.
    #[error("{0}")]
    InvalidToken(String),
    /// The token has the other type.
    #[error("Only {} tokens are allowed", .expected)]
    WrongToken {
        /// Type the route requires.
        expected: TokenType,
        /// Type of the presented token.
        actual: TokenType,
    },
    /// The route needs a fresh access token.
    #[error("Fresh token required")]
    FreshTokenRequired,
    /// The revocation predicate matched the token.
    #[error("Token has been revoked")]
    Revoked,
    /// The double-submit value is missing or does not match.
    #[error("{0}")]
    Csrf(String),
    /// The claims verification hook returned `false`.
    #[error("User claims verification failed")]
    UserClaimsVerification,
    /// The user loader returned nothing for an otherwise valid token.
    #[error("Error loading the user {}", display_identity(.identity))]
    UserLoad {
        /// The identity claim of the token.
        identity: Value,
    },
}

impl AuthError {
    /// The class of this failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoAuthorization(_) => ErrorKind::NoAuthorization,
            Self::InvalidHeader(_) => ErrorKind::InvalidHeader,
            Self::Expired => ErrorKind::Expired,
            Self::InvalidToken(_) => ErrorKind::InvalidToken,
            Self::WrongToken { .. } => ErrorKind::WrongToken,
            Self::FreshTokenRequired => ErrorKind::FreshTokenRequired,
            Self::Revoked => ErrorKind::Revoked,
            Self::Csrf(_) => ErrorKind::Csrf,
            Self::UserClaimsVerification => ErrorKind::UserClaimsVerification,
            Self::UserLoad { .. } => ErrorKind::UserLoad,
        }
    }

    /// Human readable reason handed to the response hook.
    #[must_use]
    pub fn detail(&self) -> String {
        self.to_string()
    }

    /// Whether the failure means "no token was offered" rather than "a bad
    /// token was offered".
    #[must_use]
    pub const fn is_missing_token(&self) -> bool {
        matches!(self, Self::NoAuthorization(_) | Self::InvalidHeader(_))
    }
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => Self::Expired,
            TokenError::InvalidSignature | TokenError::Malformed(_) => {
                Self::InvalidToken(error.to_string())
            }
            TokenError::MissingKey(_)
            | TokenError::InvalidKey
            | TokenError::Identity
            | TokenError::Encoding => {
                Self::InvalidToken(TokenError::InvalidSignature.to_string())
            }
        }
    }
}

/// Renders string identities without JSON quotes.
pub(crate) fn display_identity(identity: &Value) -> String {
    match identity {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}
