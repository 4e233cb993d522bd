//! Token codec.
//!
//! Builds the claim payload for a new token, signs it with the configured
//! algorithm, and turns a signed token string back into a [`DecodedToken`].
//! The signature primitive itself is `jsonwebtoken`; this module only decides
//! what goes into the payload and how failures are classified.
//!
//! # Pre-conditions
//! - HS* algorithms take the raw shared secret as key text.
//! - RS*, PS*, ES* and `EdDSA` take PEM encoded key text.
//!
//! # Post-conditions
//! - `decode` succeeds only for tokens whose signature, `exp` and `nbf` all
//!   verify with zero leeway under the configured algorithm.
//! - An expired but otherwise valid token fails with [`TokenError::Expired`],
//!   never with [`TokenError::Malformed`] or [`TokenError::InvalidSignature`].
//!
//! # Invariants
//! - Refresh tokens never carry a `fresh` claim.
//! - Encoding and decoding are stateless.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::JwtConfig;
use crate::csrf::generate_csrf_value;
use crate::token::{DecodedToken, TokenError, TokenType};

/// Everything the codec needs to mint one token.
#[derive(Debug, Clone)]
pub struct NewToken<'a, I> {
    /// Value of the identity claim.
    pub identity: &'a I,
    /// Access or refresh.
    pub token_type: TokenType,
    /// Ignored for refresh tokens.
    pub fresh: bool,
    /// May be negative, which yields an already expired token.
    pub expires_delta: TimeDelta,
    /// Custom claims; an empty map adds no claim.
    pub user_claims: Option<Map<String, Value>>,
}

/// Claim layout and algorithm, captured from [`JwtConfig`] at start-up.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    identity_claim_key: String,
    user_claims_key: String,
    embed_csrf: bool,
}

impl TokenCodec {
    /// Capture the claim layout of `config`.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            algorithm: config.algorithm,
            identity_claim_key: config.identity_claim_key.clone(),
            user_claims_key: config.user_claims_key.clone(),
            embed_csrf: config.csrf_in_tokens(),
        }
    }

    /// Algorithm tokens are signed and verified with.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Build the payload for `new` and sign it with `key`.
    pub fn encode<I: Serialize>(
        &self,
        new: &NewToken<'_, I>,
        key: &str,
    ) -> Result<String, TokenError> {
        let payload = self.payload(new)?;
        let encoding_key = self.encoding_key(key)?;
        jsonwebtoken::encode(&Header::new(self.algorithm), &payload, &encoding_key)
            .map_err(|_| TokenError::Encoding)
    }

    fn payload<I: Serialize>(
        &self,
        new: &NewToken<'_, I>,
    ) -> Result<Map<String, Value>, TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(new.expires_delta)
            .ok_or(TokenError::Encoding)?;
        let identity = serde_json::to_value(new.identity).map_err(|_| TokenError::Identity)?;

        let mut payload = Map::new();
        payload.insert("iat".to_string(), now.timestamp().into());
        payload.insert("nbf".to_string(), now.timestamp().into());
        payload.insert("jti".to_string(), uuid::Uuid::new_v4().to_string().into());
        payload.insert("exp".to_string(), expires_at.timestamp().into());
        payload.insert(self.identity_claim_key.clone(), identity);
        payload.insert("type".to_string(), new.token_type.as_str().into());
        if new.token_type == TokenType::Access {
            payload.insert("fresh".to_string(), new.fresh.into());
        }
        if let Some(claims) = new.user_claims.as_ref().filter(|claims| !claims.is_empty()) {
            payload.insert(self.user_claims_key.clone(), Value::Object(claims.clone()));
        }
        if self.embed_csrf {
            payload.insert("csrf".to_string(), generate_csrf_value().into());
        }
        Ok(payload)
    }

    /// Verify `token` with `key` and read the claims this crate relies on.
    pub fn decode<I: DeserializeOwned>(
        &self,
        token: &str,
        key: &str,
    ) -> Result<DecodedToken<I>, TokenError> {
        let decoding_key = self.decoding_key(key)?;

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &decoding_key, &validation)
            .map_err(map_jwt_error)?;
        self.read_claims(data.claims)
    }

    fn read_claims<I: DeserializeOwned>(
        &self,
        claims: Map<String, Value>,
    ) -> Result<DecodedToken<I>, TokenError> {
        let identity_key = &self.identity_claim_key;
        let identity = claims
            .get(identity_key)
            .cloned()
            .ok_or_else(|| TokenError::malformed(format!("Missing claim: {identity_key}")))?;
        let identity = serde_json::from_value(identity)
            .map_err(|_| TokenError::malformed(format!("Invalid claim: {identity_key}")))?;

        let token_type = claims
            .get("type")
            .and_then(Value::as_str)
            .and_then(|value| value.parse::<TokenType>().ok())
            .ok_or_else(|| TokenError::malformed("Missing or invalid claim: type"))?;

        // `fresh` is either a flag or a timestamp the token stays fresh until.
        let fresh = match (token_type, claims.get("fresh")) {
            (TokenType::Refresh, _) => false,
            (TokenType::Access, Some(Value::Bool(fresh))) => *fresh,
            (TokenType::Access, Some(Value::Number(until))) => until
                .as_i64()
                .is_some_and(|until| until >= Utc::now().timestamp()),
            (TokenType::Access, _) => {
                return Err(TokenError::malformed("Missing claim: fresh"));
            }
        };

        let jti = claims
            .get("jti")
            .and_then(Value::as_str)
            .ok_or_else(|| TokenError::malformed("Missing claim: jti"))?
            .to_string();
        let issued_at = claims
            .get("iat")
            .and_then(Value::as_i64)
            .ok_or_else(|| TokenError::malformed("Missing claim: iat"))?;
        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| TokenError::malformed("Missing claim: exp"))?;
        let not_before = claims.get("nbf").and_then(Value::as_i64);
        let csrf = claims
            .get("csrf")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        let user_claims = match claims.get(&self.user_claims_key) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(TokenError::malformed(format!(
                    "Invalid claim: {}",
                    self.user_claims_key
                )));
            }
        };

        Ok(DecodedToken {
            identity,
            token_type,
            fresh,
            jti,
            issued_at,
            expires_at,
            not_before,
            csrf,
            user_claims,
            raw_claims: claims,
        })
    }

    fn encoding_key(&self, key: &str) -> Result<EncodingKey, TokenError> {
        if key.is_empty() {
            return Err(TokenError::MissingKey("signing key"));
        }
        let pem = key.as_bytes();
        match self.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                Ok(EncodingKey::from_secret(pem))
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => {
                EncodingKey::from_rsa_pem(pem).map_err(|_| TokenError::InvalidKey)
            }
            Algorithm::ES256 | Algorithm::ES384 => {
                EncodingKey::from_ec_pem(pem).map_err(|_| TokenError::InvalidKey)
            }
            Algorithm::EdDSA => EncodingKey::from_ed_pem(pem).map_err(|_| TokenError::InvalidKey),
        }
    }

    fn decoding_key(&self, key: &str) -> Result<DecodingKey, TokenError> {
        if key.is_empty() {
            return Err(TokenError::MissingKey("verification key"));
        }
        let pem = key.as_bytes();
        match self.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                Ok(DecodingKey::from_secret(pem))
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => {
                DecodingKey::from_rsa_pem(pem).map_err(|_| TokenError::InvalidKey)
            }
            Algorithm::ES256 | Algorithm::ES384 => {
                DecodingKey::from_ec_pem(pem).map_err(|_| TokenError::InvalidKey)
            }
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem).map_err(|_| TokenError::InvalidKey),
        }
    }
}

/// Read the payload of `token` without verifying anything.
///
/// Only for choosing a verification key or reading back a value from a token
/// this process just minted. Never trust the result for authentication.
pub fn unverified_claims(token: &str) -> Result<Map<String, Value>, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::malformed("Not enough segments"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::malformed("Invalid payload padding"))?;
    serde_json::from_slice::<Map<String, Value>>(&bytes)
        .map_err(|_| TokenError::malformed("Invalid payload string"))
}

/// Maps jsonwebtoken errors onto the codec's fixed error phrases.
fn map_jwt_error(error: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match error.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ImmatureSignature => TokenError::malformed("The token is not yet valid (nbf)"),
        ErrorKind::InvalidAlgorithm => {
            TokenError::malformed("The specified alg value is not allowed")
        }
        ErrorKind::MissingRequiredClaim(_) => TokenError::malformed("Missing claim: exp"),
        ErrorKind::InvalidKeyFormat => TokenError::InvalidKey,
        ErrorKind::InvalidToken => TokenError::malformed("Not enough segments"),
        ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            TokenError::malformed("Invalid token encoding")
        }
        _ => TokenError::malformed("Invalid token"),
    }
}
