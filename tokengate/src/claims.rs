//! Custom claims verification.

use serde_json::{Map, Value};

use crate::callbacks::AsyncHook;

/// Run the `claims_verification` hook over a token's custom claims.
pub async fn verify_user_claims(
    hook: &AsyncHook<Map<String, Value>, bool>,
    user_claims: &Map<String, Value>,
) -> bool {
    hook(user_claims.clone()).await
}
