//! `Set-Cookie` helpers for cookie transported tokens.
//!
//! Token cookies are always `HttpOnly`. When double-submit protection is on and
//! `csrf_in_cookies` is set, a second cookie carrying the token's CSRF value is
//! written without `HttpOnly` so browser code can copy it into the CSRF header.

use axum::http::header::{InvalidHeaderValue, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use chrono::TimeDelta;

use crate::config::JwtConfig;
use crate::csrf::csrf_value_of;
use crate::pipeline::{Identity, JwtManager, Subject};
use crate::token::{TokenError, TokenType};

/// Error returned by the cookie helpers.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// The token payload could not be read.
    #[error(transparent)]
    Token(#[from] TokenError),
    /// The token was issued without a CSRF value, so no CSRF cookie can be set.
    #[error("token carries no csrf claim")]
    MissingCsrf,
    /// The rendered cookie is not a valid header value.
    #[error("cookie is not a valid header value")]
    Header(#[from] InvalidHeaderValue),
}

struct Cookie<'a> {
    name: &'a str,
    value: &'a str,
    path: &'a str,
    max_age: Option<i64>,
    http_only: bool,
}

impl Cookie<'_> {
    fn render(&self, config: &JwtConfig) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(domain) = &config.cookie_domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
            if max_age <= 0 {
                cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
            }
        }
        if config.cookie_secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if let Some(same_site) = config.cookie_samesite {
            cookie.push_str("; SameSite=");
            cookie.push_str(same_site.as_str());
        }
        cookie
    }

    fn append_to(&self, config: &JwtConfig, headers: &mut HeaderMap) -> Result<(), CookieError> {
        headers.append(SET_COOKIE, HeaderValue::from_str(&self.render(config))?);
        Ok(())
    }
}

struct CookieNames<'a> {
    token: &'a str,
    token_path: &'a str,
    csrf: &'a str,
    csrf_path: &'a str,
}

impl<'a> CookieNames<'a> {
    fn for_type(config: &'a JwtConfig, token_type: TokenType) -> Self {
        match token_type {
            TokenType::Access => Self {
                token: &config.access_cookie_name,
                token_path: &config.access_cookie_path,
                csrf: &config.access_csrf_cookie_name,
                csrf_path: &config.access_csrf_cookie_path,
            },
            TokenType::Refresh => Self {
                token: &config.refresh_cookie_name,
                token_path: &config.refresh_cookie_path,
                csrf: &config.refresh_csrf_cookie_name,
                csrf_path: &config.refresh_csrf_cookie_path,
            },
        }
    }
}

const fn writes_csrf_cookie(config: &JwtConfig) -> bool {
    config.csrf_protect && config.csrf_in_cookies
}

/// Cookie lifetime: the explicit `max_age`, else the token lifetime unless
/// cookies are session-only.
fn cookie_max_age(
    config: &JwtConfig,
    token_type: TokenType,
    max_age: Option<TimeDelta>,
) -> Option<i64> {
    max_age.map(|age| age.num_seconds()).or_else(|| {
        (!config.session_cookie).then(|| match token_type {
            TokenType::Access => config.access_token_expires.num_seconds(),
            TokenType::Refresh => config.refresh_token_expires.num_seconds(),
        })
    })
}

fn set_cookies(
    config: &JwtConfig,
    headers: &mut HeaderMap,
    token_type: TokenType,
    token: &str,
    max_age: Option<TimeDelta>,
) -> Result<(), CookieError> {
    let names = CookieNames::for_type(config, token_type);
    let max_age = cookie_max_age(config, token_type, max_age);

    Cookie {
        name: names.token,
        value: token,
        path: names.token_path,
        max_age,
        http_only: true,
    }
    .append_to(config, headers)?;

    if writes_csrf_cookie(config) {
        let csrf = csrf_value_of(token)?.ok_or(CookieError::MissingCsrf)?;
        Cookie {
            name: names.csrf,
            value: &csrf,
            path: names.csrf_path,
            max_age,
            http_only: false,
        }
        .append_to(config, headers)?;
    }
    Ok(())
}

fn unset_cookies(
    config: &JwtConfig,
    headers: &mut HeaderMap,
    token_type: TokenType,
) -> Result<(), CookieError> {
    let names = CookieNames::for_type(config, token_type);

    Cookie {
        name: names.token,
        value: "",
        path: names.token_path,
        max_age: Some(0),
        http_only: true,
    }
    .append_to(config, headers)?;

    if writes_csrf_cookie(config) {
        Cookie {
            name: names.csrf,
            value: "",
            path: names.csrf_path,
            max_age: Some(0),
            http_only: false,
        }
        .append_to(config, headers)?;
    }
    Ok(())
}

/// Append the access token cookie (and its CSRF cookie) to `headers`.
///
/// # Errors
///
/// Fails when the token payload is unreadable, when a CSRF cookie is due but
/// the token has no CSRF claim, or when the cookie is not a valid header.
pub fn set_access_cookies(
    config: &JwtConfig,
    headers: &mut HeaderMap,
    token: &str,
    max_age: Option<TimeDelta>,
) -> Result<(), CookieError> {
    set_cookies(config, headers, TokenType::Access, token, max_age)
}

/// Append the refresh token cookie (and its CSRF cookie) to `headers`.
///
/// # Errors
///
/// Same as [`set_access_cookies`].
pub fn set_refresh_cookies(
    config: &JwtConfig,
    headers: &mut HeaderMap,
    token: &str,
    max_age: Option<TimeDelta>,
) -> Result<(), CookieError> {
    set_cookies(config, headers, TokenType::Refresh, token, max_age)
}

/// Expire the access token cookie (and its CSRF cookie).
///
/// # Errors
///
/// Fails when a configured cookie name or path is not a valid header value.
pub fn unset_access_cookies(
    config: &JwtConfig,
    headers: &mut HeaderMap,
) -> Result<(), CookieError> {
    unset_cookies(config, headers, TokenType::Access)
}

/// Expire the refresh token cookie (and its CSRF cookie).
///
/// # Errors
///
/// Same as [`unset_access_cookies`].
pub fn unset_refresh_cookies(
    config: &JwtConfig,
    headers: &mut HeaderMap,
) -> Result<(), CookieError> {
    unset_cookies(config, headers, TokenType::Refresh)
}

/// Expire every token and CSRF cookie.
///
/// # Errors
///
/// Same as [`unset_access_cookies`].
pub fn unset_jwt_cookies(config: &JwtConfig, headers: &mut HeaderMap) -> Result<(), CookieError> {
    unset_access_cookies(config, headers)?;
    unset_refresh_cookies(config, headers)
}

impl<I: Identity, U: Send + 'static, S: Subject> JwtManager<I, U, S> {
    /// [`set_access_cookies`] with this manager's configuration.
    ///
    /// # Errors
    ///
    /// Same as [`set_access_cookies`].
    pub fn set_access_cookies(
        &self,
        headers: &mut HeaderMap,
        token: &str,
        max_age: Option<TimeDelta>,
    ) -> Result<(), CookieError> {
        set_access_cookies(self.config(), headers, token, max_age)
    }

    /// [`set_refresh_cookies`] with this manager's configuration.
    ///
    /// # Errors
    ///
    /// Same as [`set_access_cookies`].
    pub fn set_refresh_cookies(
        &self,
        headers: &mut HeaderMap,
        token: &str,
        max_age: Option<TimeDelta>,
    ) -> Result<(), CookieError> {
        set_refresh_cookies(self.config(), headers, token, max_age)
    }

    /// [`unset_jwt_cookies`] with this manager's configuration.
    ///
    /// # Errors
    ///
    /// Same as [`unset_access_cookies`].
    pub fn unset_jwt_cookies(&self, headers: &mut HeaderMap) -> Result<(), CookieError> {
        unset_jwt_cookies(self.config(), headers)
    }
}
