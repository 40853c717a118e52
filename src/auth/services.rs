use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::{
    errors::AuthError,
    jwt::JwtKeys,
    password::{hash_password, verify_against_dummy, verify_password},
    repo_types::{InsertOutcome, NewUser, User},
    verification,
};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(email: &str, username: &str, password: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(AuthError::Validation(
            "Username must be between 3 and 50 characters".into(),
        ));
    }
    if password.chars().count() < 8 {
        return Err(AuthError::Validation("Password too short".into()));
    }
    Ok(())
}

/// Create an account and send its first verification link.
pub async fn register(
    state: &AppState,
    email: &str,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let email = normalize_email(email);
    let username = username.trim();
    validate_registration(&email, username, password)?;

    // Cheap pre-check so we do not hash for an obviously taken name.
    if state.users.find_by_username(username).await?.is_some() {
        warn!(%username, "username already registered");
        return Err(AuthError::DuplicateUser);
    }
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AuthError::DuplicateUser);
    }

    let hashed_password = hash_password(password)?;

    // The row is created already holding its first verification token.
    let keys = JwtKeys::from_ref(state);
    let new_user = NewUser::new(&email, username, &hashed_password);
    let signed = verification::mint(&keys, &email, new_user.id)?;
    let new_user = new_user.with_verification(&signed.token, signed.expires_at);

    let user = match state.users.insert(new_user).await? {
        InsertOutcome::Created(u) => u,
        InsertOutcome::Conflict => {
            warn!(%username, %email, "registration lost uniqueness race");
            return Err(AuthError::DuplicateUser);
        }
    };
    info!(user_id = %user.id, username = %user.username, "user registered");

    verification::deliver(state.mailer.as_ref(), &user, &signed.token).await;
    Ok(user)
}

/// Exchange username and password for an access token.
pub async fn login(state: &AppState, username: &str, password: &str) -> Result<String, AuthError> {
    let username = username.trim();
    let Some(user) = state.users.find_by_username(username).await? else {
        verify_against_dummy(password);
        warn!(%username, "login unknown username");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &user.hashed_password) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(state);
    let signed = keys
        .sign_access(&user.username, user.id)
        .map_err(|e| AuthError::Internal(e.into()))?;
    info!(user_id = %user.id, "user logged in");
    Ok(signed.token)
}

/// Reissue a verification link. Unknown addresses succeed silently.
pub async fn resend_verification(state: &AppState, email: &str) -> Result<(), AuthError> {
    let email = normalize_email(email);
    let Some(user) = state.users.find_by_email(&email).await? else {
        info!("resend requested for unknown email");
        return Ok(());
    };
    let keys = JwtKeys::from_ref(state);
    verification::issue(state.users.as_ref(), state.mailer.as_ref(), &keys, &user).await?;
    Ok(())
}
