use tracing::{debug, warn};

use crate::auth::{errors::AuthError, jwt::JwtKeys, repo::UserStore, repo_types::User};

/// Resolve a bearer token to the user it was issued for.
///
/// The username claim is the lookup key; `user_id` must be present but is not
/// consulted. Email verification is not required to authenticate.
pub async fn authenticate(
    keys: &JwtKeys,
    store: &dyn UserStore,
    token: &str,
) -> Result<User, AuthError> {
    let decoded = keys.parse_access(token).map_err(|e| {
        debug!(error = %e, "access token rejected");
        AuthError::Unauthorized
    })?;

    let user = store
        .find_by_username(&decoded.claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(username = %decoded.claims.sub, "access token for unknown user");
            AuthError::Unauthorized
        })?;

    debug!(user_id = %user.id, expires_at = %decoded.expires_at, "access token accepted");
    Ok(user)
}
