use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{errors::AuthError, gate::authenticate, jwt::JwtKeys, repo_types::User};
use crate::state::AppState;

/// The user behind a valid `Authorization: Bearer <token>` header.
pub struct AuthUser(pub User);

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            warn!("missing or malformed Authorization header");
            AuthError::Unauthorized
        })?;

        let keys = JwtKeys::from_ref(state);
        let user = authenticate(&keys, state.users.as_ref(), token).await?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;

    use super::*;
    use crate::auth::{
        memory::MemoryUserStore,
        repo::UserStore,
        repo_types::{InsertOutcome, NewUser},
    };
    use crate::mail::testing::RecordingMailer;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/auth/me");
        if let Some(h) = header {
            req = req.header(axum::http::header::AUTHORIZATION, h);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[tokio::test]
    async fn extracts_user_from_header() {
        let store = Arc::new(MemoryUserStore::default());
        let InsertOutcome::Created(alice) = store
            .insert(NewUser::new("alice@x.com", "alice", "hash"))
            .await
            .unwrap()
        else {
            panic!("insert failed");
        };
        let state = AppState::fake(store, Arc::new(RecordingMailer::default()));
        let token = JwtKeys::from_ref(&state)
            .sign_access("alice", alice.id)
            .unwrap()
            .token;

        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let AuthUser(user) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(user.username, "alice");

        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Unauthorized));
    }
}
