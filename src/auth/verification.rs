//! Email verification lifecycle.
//!
//! A user moves `Unverified{no token}` → `Unverified{token, expiry}` →
//! `Verified`, and `Verified` is sticky. A verification token is honoured only
//! when the codec accepts it (signature, expiry, kind tag) *and* it is still the
//! token stored on the user row. Issuing a new token overwrites the stored copy,
//! which revokes every earlier link even before its embedded expiry.

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{
    errors::AuthError,
    jwt::{JwtKeys, Signed},
    repo::UserStore,
    repo_types::User,
};
use crate::mail::Mailer;

const MAX_ISSUE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Verified,
    /// The account was verified earlier; the call is a no-op.
    AlreadyVerified,
}

/// Mint a verification token for `user`, store it and mail it.
///
/// Delivery failure is logged and swallowed; the stored token stays valid.
pub async fn issue(
    store: &dyn UserStore,
    mailer: &dyn Mailer,
    keys: &JwtKeys,
    user: &User,
) -> Result<String, AuthError> {
    let mut current = user.clone();
    let mut attempt = 0;
    let token = loop {
        if current.email_verified {
            return Err(AuthError::AlreadyVerified);
        }
        let signed = mint(keys, &current.email, current.id)?;
        let next = current.with_pending_verification(signed.token.clone(), signed.expires_at);
        if store.compare_and_set(&current, &next).await? {
            break signed.token;
        }

        attempt += 1;
        if attempt >= MAX_ISSUE_ATTEMPTS {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "verification state kept changing while issuing token"
            )));
        }
        debug!(user_id = %current.id, attempt, "verification state changed concurrently; reloading");
        current = store
            .find_by_id(current.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
    };

    deliver(mailer, &current, &token).await;
    info!(user_id = %current.id, "verification token issued");
    Ok(token)
}

/// Sign a verification token for the account `user_id` at `email`.
pub fn mint(keys: &JwtKeys, email: &str, user_id: Uuid) -> Result<Signed, AuthError> {
    keys.sign_verification(email, user_id)
        .map_err(|e| AuthError::Internal(e.into()))
}

/// Mail the link for `token`. Failure is logged and swallowed.
pub async fn deliver(mailer: &dyn Mailer, user: &User, token: &str) {
    if let Err(e) = mailer
        .send_verification_link(&user.email, &user.username, token)
        .await
    {
        warn!(error = %e, user_id = %user.id, "failed to send verification email");
    }
}

/// Redeem a verification token.
pub async fn consume(
    store: &dyn UserStore,
    keys: &JwtKeys,
    token: &str,
) -> Result<ConsumeOutcome, AuthError> {
    let decoded = keys.parse_verification(token).map_err(|e| {
        warn!(error = %e, "verification token rejected by codec");
        AuthError::InvalidToken(e)
    })?;
    let claims = decoded.claims;

    let user = store.find_by_id(claims.user_id).await?.ok_or_else(|| {
        warn!(user_id = %claims.user_id, "verification for unknown user");
        AuthError::UserNotFound
    })?;

    if user.email != claims.sub {
        warn!(user_id = %user.id, "verification token email does not match account");
        return Err(AuthError::TokenMismatch);
    }

    if user.email_verified {
        debug!(user_id = %user.id, "email already verified");
        return Ok(ConsumeOutcome::AlreadyVerified);
    }

    if user.verification_token.as_deref() != Some(token) {
        warn!(user_id = %user.id, "verification token superseded or revoked");
        return Err(AuthError::TokenMismatch);
    }

    match user.verification_token_expires {
        Some(expires) if expires > OffsetDateTime::now_utc() => {}
        _ => {
            warn!(user_id = %user.id, "stored verification token expired");
            return Err(AuthError::TokenExpired);
        }
    }

    if store.compare_and_set(&user, &user.verified()).await? {
        info!(user_id = %user.id, "email verified");
        return Ok(ConsumeOutcome::Verified);
    }

    // Lost a race: either a concurrent consume won or the token was reissued.
    match store.find_by_id(user.id).await? {
        Some(u) if u.email_verified => Ok(ConsumeOutcome::AlreadyVerified),
        Some(_) => Err(AuthError::TokenMismatch),
        None => Err(AuthError::UserNotFound),
    }
}
