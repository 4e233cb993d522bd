//! Token configuration.
//!
//! `JwtConfig` holds every option that governs issuance, transport and
//! verification. It is built once (from defaults, the environment, or by hand),
//! validated by [`JwtConfig::validate`], and then shared read-only.
//!
//! # Environment Variables
//!
//! [`JwtConfig::from_env`] starts from the defaults and overrides any option
//! whose `JWT_*` variable is set, for example:
//!
//! - `JWT_TOKEN_LOCATION`: comma separated list of `headers`, `cookies`,
//!   `query_string`, `json` (default: `headers`)
//! - `JWT_EXEMPT_METHODS`: comma separated request methods that skip optional
//!   verification (default: `OPTIONS`)
//! - `JWT_ALGORITHM`: signing algorithm name (default: `HS256`)
//! - `JWT_SECRET_KEY`, `JWT_PRIVATE_KEY`, `JWT_PUBLIC_KEY`: key material
//! - `JWT_ACCESS_TOKEN_EXPIRES`, `JWT_REFRESH_TOKEN_EXPIRES`: lifetimes in seconds
//!
//! # Invariants
//!
//! - `token_location` is never empty after validation.
//! - The identity and user-claims keys never collide with each other or with
//!   the reserved claims written by the codec.

use std::str::FromStr;

use chrono::TimeDelta;
use jsonwebtoken::Algorithm;

use crate::token::TokenType;

/// Claim names the codec always writes itself.
pub const RESERVED_CLAIMS: [&str; 7] = ["iat", "nbf", "jti", "exp", "type", "fresh", "csrf"];

/// Where a token may be carried on an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenLocation {
    /// A request header such as `Authorization: Bearer <token>`.
    Headers,
    /// The access or refresh cookie.
    Cookies,
    /// A query string parameter.
    QueryString,
    /// A key in a JSON request body.
    Json,
}

impl TokenLocation {
    /// Name used in configuration and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Headers => "headers",
            Self::Cookies => "cookies",
            Self::QueryString => "query_string",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for TokenLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "headers" => Ok(Self::Headers),
            "cookies" => Ok(Self::Cookies),
            "query_string" => Ok(Self::QueryString),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown token location '{other}'")),
        }
    }
}

/// `SameSite` attribute for cookies written by the cookie helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=Lax`
    Lax,
    /// `SameSite=None`
    None,
}

impl SameSite {
    /// Attribute value as written in `Set-Cookie`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(format!("unknown SameSite policy '{other}'")),
        }
    }
}

/// Error returned when loading or validating configuration fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An option has an invalid value.
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    /// The signing algorithm needs key material that is not configured and no
    /// key-resolution hook was registered to supply it.
    #[error("{name} must be set when using the {algorithm:?} algorithm")]
    MissingKey {
        name: &'static str,
        algorithm: Algorithm,
    },
}

impl ConfigError {
    fn invalid(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Every option governing token issuance, transport and verification.
#[derive(Clone)]
pub struct JwtConfig {
    /// Ordered list of locations to look for a token in.
    pub token_location: Vec<TokenLocation>,

    /// Request methods that skip optional verification (for example CORS
    /// preflight).
    pub exempt_methods: Vec<String>,

    /// Header carrying the token.
    pub header_name: String,
    /// Scheme prefix expected before the token. Empty means the header value
    /// is the bare token.
    pub header_type: String,

    /// Query parameter carrying the token.
    pub query_string_name: String,

    /// Cookie carrying the access token.
    pub access_cookie_name: String,
    /// Cookie carrying the refresh token.
    pub refresh_cookie_name: String,
    /// `Path` of the access token cookie.
    pub access_cookie_path: String,
    /// `Path` of the refresh token cookie.
    pub refresh_cookie_path: String,
    /// Mark cookies `Secure`.
    pub cookie_secure: bool,
    /// `Domain` attribute of every cookie.
    pub cookie_domain: Option<String>,
    /// Cookies without an explicit max age are deleted when the browser closes.
    pub session_cookie: bool,
    /// `SameSite` attribute of every cookie.
    pub cookie_samesite: Option<SameSite>,

    /// JSON body key carrying an access token.
    pub json_key: String,
    /// JSON body key carrying a refresh token.
    pub refresh_json_key: String,

    /// Embed a double-submit value in tokens and check it for cookie transport.
    pub csrf_protect: bool,
    /// Request methods the double-submit check applies to.
    pub csrf_methods: Vec<String>,
    /// Header echoing the CSRF value of an access token.
    pub access_csrf_header_name: String,
    /// Header echoing the CSRF value of a refresh token.
    pub refresh_csrf_header_name: String,
    /// Also write the double-submit value into a JavaScript readable cookie.
    pub csrf_in_cookies: bool,
    /// Cookie exposing the CSRF value of the access token.
    pub access_csrf_cookie_name: String,
    /// Cookie exposing the CSRF value of the refresh token.
    pub refresh_csrf_cookie_name: String,
    /// `Path` of the access CSRF cookie.
    pub access_csrf_cookie_path: String,
    /// `Path` of the refresh CSRF cookie.
    pub refresh_csrf_cookie_path: String,

    /// Default access token lifetime.
    pub access_token_expires: TimeDelta,
    /// Default refresh token lifetime.
    pub refresh_token_expires: TimeDelta,

    /// Signing algorithm.
    pub algorithm: Algorithm,
    /// Shared secret for the HS* algorithms.
    pub secret_key: Option<String>,
    /// PEM private key for asymmetric algorithms.
    pub private_key: Option<String>,
    /// PEM public key for asymmetric algorithms.
    pub public_key: Option<String>,

    /// Ask the `token_in_blacklist` hook about presented tokens.
    pub blacklist_enabled: bool,
    /// Token types the revocation check applies to.
    pub blacklist_token_checks: Vec<TokenType>,

    /// Claim holding the identity.
    pub identity_claim_key: String,
    /// Claim holding the custom claims object.
    pub user_claims_key: String,
    /// Also put custom claims in refresh tokens.
    pub user_claims_in_refresh_token: bool,

    /// Body key of the default error messages.
    pub error_message_key: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            token_location: vec![TokenLocation::Headers],
            exempt_methods: vec!["OPTIONS".to_string()],
            header_name: "Authorization".to_string(),
            header_type: "Bearer".to_string(),
            query_string_name: "jwt".to_string(),
            access_cookie_name: "access_token_cookie".to_string(),
            refresh_cookie_name: "refresh_token_cookie".to_string(),
            access_cookie_path: "/".to_string(),
            refresh_cookie_path: "/".to_string(),
            cookie_secure: false,
            cookie_domain: None,
            session_cookie: true,
            cookie_samesite: None,
            json_key: "access_token".to_string(),
            refresh_json_key: "refresh_token".to_string(),
            csrf_protect: true,
            csrf_methods: ["POST", "PUT", "PATCH", "DELETE"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            access_csrf_header_name: "X-CSRF-TOKEN".to_string(),
            refresh_csrf_header_name: "X-CSRF-TOKEN".to_string(),
            csrf_in_cookies: true,
            access_csrf_cookie_name: "csrf_access_token".to_string(),
            refresh_csrf_cookie_name: "csrf_refresh_token".to_string(),
            access_csrf_cookie_path: "/".to_string(),
            refresh_csrf_cookie_path: "/".to_string(),
            access_token_expires: TimeDelta::minutes(15),
            refresh_token_expires: TimeDelta::days(30),
            algorithm: Algorithm::HS256,
            secret_key: None,
            private_key: None,
            public_key: None,
            blacklist_enabled: false,
            blacklist_token_checks: vec![TokenType::Access, TokenType::Refresh],
            identity_claim_key: "identity".to_string(),
            user_claims_key: "user_claims".to_string(),
            user_claims_in_refresh_token: false,
            error_message_key: "msg".to_string(),
        }
    }
}

// Key material stays out of logs.
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const fn redact(key: Option<&String>) -> &'static str {
            if key.is_some() { "<redacted>" } else { "<unset>" }
        }

        f.debug_struct("JwtConfig")
            .field("token_location", &self.token_location)
            .field("exempt_methods", &self.exempt_methods)
            .field("header_name", &self.header_name)
            .field("header_type", &self.header_type)
            .field("csrf_protect", &self.csrf_protect)
            .field("access_token_expires", &self.access_token_expires)
            .field("refresh_token_expires", &self.refresh_token_expires)
            .field("algorithm", &self.algorithm)
            .field("secret_key", &redact(self.secret_key.as_ref()))
            .field("private_key", &redact(self.private_key.as_ref()))
            .field("public_key", &redact(self.public_key.as_ref()))
            .field("blacklist_enabled", &self.blacklist_enabled)
            .field("identity_claim_key", &self.identity_claim_key)
            .field("user_claims_key", &self.user_claims_key)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    /// Configuration for a symmetric algorithm with the given shared secret.
    #[must_use]
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret_key: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Load configuration from `JWT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup, starting from
    /// the defaults. Unset variables keep their default.
    #[allow(clippy::too_many_lines)]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let string = |name: &str, target: &mut String| {
            if let Some(value) = lookup(name) {
                *target = value;
            }
        };

        if let Some(value) = lookup("JWT_TOKEN_LOCATION") {
            config.token_location = parse_list("JWT_TOKEN_LOCATION", &value)?;
        }
        if let Some(value) = lookup("JWT_EXEMPT_METHODS") {
            config.exempt_methods = parse_methods(&value);
        }
        string("JWT_HEADER_NAME", &mut config.header_name);
        string("JWT_HEADER_TYPE", &mut config.header_type);
        string("JWT_QUERY_STRING_NAME", &mut config.query_string_name);
        string("JWT_ACCESS_COOKIE_NAME", &mut config.access_cookie_name);
        string("JWT_REFRESH_COOKIE_NAME", &mut config.refresh_cookie_name);
        string("JWT_ACCESS_COOKIE_PATH", &mut config.access_cookie_path);
        string("JWT_REFRESH_COOKIE_PATH", &mut config.refresh_cookie_path);
        if let Some(value) = lookup("JWT_COOKIE_SECURE") {
            config.cookie_secure = parse_bool("JWT_COOKIE_SECURE", &value)?;
        }
        if let Some(value) = lookup("JWT_COOKIE_DOMAIN") {
            config.cookie_domain = Some(value);
        }
        if let Some(value) = lookup("JWT_SESSION_COOKIE") {
            config.session_cookie = parse_bool("JWT_SESSION_COOKIE", &value)?;
        }
        if let Some(value) = lookup("JWT_COOKIE_SAMESITE") {
            config.cookie_samesite = Some(
                value
                    .parse()
                    .map_err(|e: String| ConfigError::invalid("JWT_COOKIE_SAMESITE", e))?,
            );
        }
        string("JWT_JSON_KEY", &mut config.json_key);
        string("JWT_REFRESH_JSON_KEY", &mut config.refresh_json_key);

        if let Some(value) = lookup("JWT_COOKIE_CSRF_PROTECT") {
            config.csrf_protect = parse_bool("JWT_COOKIE_CSRF_PROTECT", &value)?;
        }
        if let Some(value) = lookup("JWT_CSRF_METHODS") {
            config.csrf_methods = parse_methods(&value);
        }
        string("JWT_ACCESS_CSRF_HEADER_NAME", &mut config.access_csrf_header_name);
        string("JWT_REFRESH_CSRF_HEADER_NAME", &mut config.refresh_csrf_header_name);
        if let Some(value) = lookup("JWT_CSRF_IN_COOKIES") {
            config.csrf_in_cookies = parse_bool("JWT_CSRF_IN_COOKIES", &value)?;
        }
        string("JWT_ACCESS_CSRF_COOKIE_NAME", &mut config.access_csrf_cookie_name);
        string("JWT_REFRESH_CSRF_COOKIE_NAME", &mut config.refresh_csrf_cookie_name);
        string("JWT_ACCESS_CSRF_COOKIE_PATH", &mut config.access_csrf_cookie_path);
        string("JWT_REFRESH_CSRF_COOKIE_PATH", &mut config.refresh_csrf_cookie_path);

        if let Some(value) = lookup("JWT_ACCESS_TOKEN_EXPIRES") {
            config.access_token_expires = parse_seconds("JWT_ACCESS_TOKEN_EXPIRES", &value)?;
        }
        if let Some(value) = lookup("JWT_REFRESH_TOKEN_EXPIRES") {
            config.refresh_token_expires = parse_seconds("JWT_REFRESH_TOKEN_EXPIRES", &value)?;
        }

        if let Some(value) = lookup("JWT_ALGORITHM") {
            config.algorithm = Algorithm::from_str(value.trim()).map_err(|_| {
                let message = format!("'{value}' is not a supported algorithm");
                ConfigError::invalid("JWT_ALGORITHM", message)
            })?;
        }
        config.secret_key = lookup("JWT_SECRET_KEY").or(config.secret_key);
        config.private_key = lookup("JWT_PRIVATE_KEY").or(config.private_key);
        config.public_key = lookup("JWT_PUBLIC_KEY").or(config.public_key);

        if let Some(value) = lookup("JWT_BLACKLIST_ENABLED") {
            config.blacklist_enabled = parse_bool("JWT_BLACKLIST_ENABLED", &value)?;
        }
        if let Some(value) = lookup("JWT_BLACKLIST_TOKEN_CHECKS") {
            config.blacklist_token_checks = parse_list("JWT_BLACKLIST_TOKEN_CHECKS", &value)?;
        }

        string("JWT_IDENTITY_CLAIM", &mut config.identity_claim_key);
        string("JWT_USER_CLAIMS", &mut config.user_claims_key);
        if let Some(value) = lookup("JWT_CLAIMS_IN_REFRESH_TOKEN") {
            config.user_claims_in_refresh_token =
                parse_bool("JWT_CLAIMS_IN_REFRESH_TOKEN", &value)?;
        }
        string("JWT_ERROR_MESSAGE_KEY", &mut config.error_message_key);

        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency of the options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_location.is_empty() {
            return Err(ConfigError::invalid(
                "JWT_TOKEN_LOCATION",
                "at least one token location is required",
            ));
        }
        if self.header_name.trim().is_empty() {
            return Err(ConfigError::invalid("JWT_HEADER_NAME", "must not be empty"));
        }
        if self.header_type.contains(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "JWT_HEADER_TYPE",
                "must not contain whitespace",
            ));
        }
        for (name, key) in [
            ("JWT_IDENTITY_CLAIM", &self.identity_claim_key),
            ("JWT_USER_CLAIMS", &self.user_claims_key),
        ] {
            if key.is_empty() {
                return Err(ConfigError::invalid(name, "must not be empty"));
            }
            if RESERVED_CLAIMS.contains(&key.as_str()) {
                return Err(ConfigError::invalid(
                    name,
                    format!("'{key}' is a reserved claim"),
                ));
            }
        }
        if self.identity_claim_key == self.user_claims_key {
            return Err(ConfigError::invalid(
                "JWT_USER_CLAIMS",
                "must differ from JWT_IDENTITY_CLAIM",
            ));
        }
        if self.error_message_key.is_empty() {
            return Err(ConfigError::invalid("JWT_ERROR_MESSAGE_KEY", "must not be empty"));
        }
        Ok(())
    }

    /// Whether tokens issued under this configuration embed a CSRF value.
    ///
    /// Independent of `token_location`: any token may later be handed out as a
    /// cookie through the cookie helpers.
    #[must_use]
    pub const fn csrf_in_tokens(&self) -> bool {
        self.csrf_protect
    }

    /// Whether `method` is one of the exempt methods.
    #[must_use]
    pub fn is_exempt_method(&self, method: &str) -> bool {
        self.exempt_methods
            .iter()
            .any(|exempt| exempt.eq_ignore_ascii_case(method))
    }

    /// Whether `method` is one of the CSRF protected methods.
    #[must_use]
    pub fn is_csrf_method(&self, method: &str) -> bool {
        self.csrf_methods
            .iter()
            .any(|protected| protected.eq_ignore_ascii_case(method))
    }

    /// Key material the default encode-key hook signs with.
    #[must_use]
    pub fn encode_key(&self) -> Option<&str> {
        if is_symmetric(self.algorithm) {
            self.secret_key.as_deref()
        } else {
            self.private_key.as_deref()
        }
    }

    /// Key material the default decode-key hook verifies with.
    #[must_use]
    pub fn decode_key(&self) -> Option<&str> {
        if is_symmetric(self.algorithm) {
            self.secret_key.as_deref()
        } else {
            self.public_key.as_deref()
        }
    }

    /// Name of the variable that supplies the encode key for the algorithm.
    #[must_use]
    pub const fn encode_key_name(&self) -> &'static str {
        if is_symmetric(self.algorithm) {
            "JWT_SECRET_KEY"
        } else {
            "JWT_PRIVATE_KEY"
        }
    }

    /// Name of the variable that supplies the decode key for the algorithm.
    #[must_use]
    pub const fn decode_key_name(&self) -> &'static str {
        if is_symmetric(self.algorithm) {
            "JWT_SECRET_KEY"
        } else {
            "JWT_PUBLIC_KEY"
        }
    }
}

fn parse_methods(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|method| method.trim().to_ascii_uppercase())
        .filter(|method| !method.is_empty())
        .collect()
}

/// HMAC algorithms share one key between signing and verification.
#[must_use]
pub const fn is_symmetric(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::invalid(
            name,
            format!("'{value}' is not a boolean"),
        )),
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<TimeDelta, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| ConfigError::invalid(name, format!("'{value}' is not a number of seconds")))
}

fn parse_list<T>(name: &str, value: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr<Err = String>,
{
    value
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| item.trim().parse().map_err(|e| ConfigError::invalid(name, e)))
        .collect()
}
