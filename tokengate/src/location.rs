//! Token location extraction.
//!
//! Looks for a candidate token in each configured location, in configured
//! order. A location that finds nothing reports `NoAuthorization` and the next
//! one is tried; any other failure (a malformed `Authorization` header, for
//! example) stops the search immediately.

use crate::config::{JwtConfig, TokenLocation};
use crate::error::AuthError;
use crate::request::AuthRequest;
use crate::token::TokenType;

/// A token string together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedToken {
    /// The raw token.
    pub token: String,
    /// Where it was found.
    pub location: TokenLocation,
}

/// Find the token for `token_type` in `request`.
pub fn extract_token(
    config: &JwtConfig,
    request: &AuthRequest,
    token_type: TokenType,
) -> Result<LocatedToken, AuthError> {
    let mut reasons = Vec::with_capacity(config.token_location.len());

    for &location in &config.token_location {
        let found = match location {
            TokenLocation::Headers => from_headers(config, request),
            TokenLocation::Cookies => from_cookies(config, request, token_type),
            TokenLocation::QueryString => from_query_string(config, request),
            TokenLocation::Json => from_json(config, request, token_type),
        };
        match found {
            Ok(token) => return Ok(LocatedToken { token, location }),
            Err(AuthError::NoAuthorization(reason)) => reasons.push(reason),
            Err(other) => return Err(other),
        }
    }

    Err(AuthError::NoAuthorization(missing_message(
        &config.token_location,
        reasons,
    )))
}

fn missing_message(locations: &[TokenLocation], mut reasons: Vec<String>) -> String {
    match locations {
        [] => "Missing JWT".to_string(),
        [_] => reasons.pop().unwrap_or_else(|| "Missing JWT".to_string()),
        [head @ .., last] => {
            let head: Vec<&str> = head.iter().map(|location| location.as_str()).collect();
            format!(
                "Missing JWT in {} or {} ({})",
                head.join(", "),
                last.as_str(),
                reasons.join("; ")
            )
        }
    }
}

fn from_headers(config: &JwtConfig, request: &AuthRequest) -> Result<String, AuthError> {
    let header_name = &config.header_name;
    let header_type = &config.header_type;

    let value = request.header(header_name).unwrap_or_default();
    if value.trim().is_empty() {
        return Err(AuthError::NoAuthorization(format!("Missing {header_name} Header")));
    }

    // <HeaderName>: <HeaderType(optional)> <JWT>
    let parts: Vec<&str> = value.split_whitespace().collect();
    if header_type.is_empty() {
        match parts.as_slice() {
            [token] => Ok((*token).to_string()),
            _ => Err(AuthError::InvalidHeader(format!(
                "Bad {header_name} header. Expected value '<JWT>'"
            ))),
        }
    } else {
        match parts.as_slice() {
            [scheme, token] if scheme == header_type => Ok((*token).to_string()),
            _ => Err(AuthError::InvalidHeader(format!(
                "Bad {header_name} header. Expected value '{header_type} <JWT>'"
            ))),
        }
    }
}

fn from_cookies(
    config: &JwtConfig,
    request: &AuthRequest,
    token_type: TokenType,
) -> Result<String, AuthError> {
    let cookie_name = match token_type {
        TokenType::Access => &config.access_cookie_name,
        TokenType::Refresh => &config.refresh_cookie_name,
    };
    request
        .cookie(cookie_name)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| AuthError::NoAuthorization(format!("Missing cookie \"{cookie_name}\"")))
}

fn from_query_string(config: &JwtConfig, request: &AuthRequest) -> Result<String, AuthError> {
    let name = &config.query_string_name;
    request
        .query_param(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthError::NoAuthorization(format!("Missing \"{name}\" query parameter")))
}

fn from_json(
    config: &JwtConfig,
    request: &AuthRequest,
    token_type: TokenType,
) -> Result<String, AuthError> {
    if !request.is_json() {
        return Err(AuthError::NoAuthorization(
            "Invalid content-type. Must be application/json.".to_string(),
        ));
    }
    let key = match token_type {
        TokenType::Access => &config.json_key,
        TokenType::Refresh => &config.refresh_json_key,
    };
    request
        .json_field(key)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| AuthError::NoAuthorization(format!("Missing \"{key}\" key in json data.")))
}
