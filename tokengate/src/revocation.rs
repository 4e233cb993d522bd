//! Revocation checks.
//!
//! Whether a token is revoked is decided entirely by the registered
//! `token_in_blacklist` predicate. This module only decides whether to ask.
//! It does no caching or storage of its own.

use crate::callbacks::AsyncHook;
use crate::config::JwtConfig;
use crate::token::DecodedToken;

/// Ask `predicate` whether `token` is revoked.
///
/// Returns `false` without calling the predicate when revocation is disabled,
/// when the token's type is not covered by `blacklist_token_checks`, or when
/// no predicate is registered.
pub async fn is_revoked<I: Clone>(
    config: &JwtConfig,
    predicate: Option<&AsyncHook<DecodedToken<I>, bool>>,
    token: &DecodedToken<I>,
) -> bool {
    if !config.blacklist_enabled || !config.blacklist_token_checks.contains(&token.token_type) {
        return false;
    }
    let Some(predicate) = predicate else {
        tracing::debug!("revocation enabled but no token_in_blacklist predicate registered");
        return false;
    };
    predicate(token.clone()).await
}
