use axum::{
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::jwt::TokenError;

/// Outcomes of the auth core a caller has to branch on.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(#[source] TokenError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("user not found")]
    UserNotFound,

    #[error("verification token does not match")]
    TokenMismatch,

    #[error("verification token expired")]
    TokenExpired,

    #[error("username or email already registered")]
    DuplicateUser,

    #[error("email already verified")]
    AlreadyVerified,

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidToken(_)
            | Self::UserNotFound
            | Self::TokenMismatch
            | Self::TokenExpired
            | Self::AlreadyVerified => StatusCode::BAD_REQUEST,

            Self::DuplicateUser => StatusCode::CONFLICT,

            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,

            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthorized => "unauthorized",
            Self::InvalidToken(_)
            | Self::UserNotFound
            | Self::TokenMismatch
            | Self::TokenExpired => "invalid_verification_token",
            Self::DuplicateUser => "duplicate_user",
            Self::AlreadyVerified => "already_verified",
            Self::Validation(_) => "validation_error",
            Self::Internal(_) => "server_error",
        }
    }

    /// Message shown to clients. Verification failures share one message so a
    /// caller cannot tell which check rejected the link.
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidCredentials => "Incorrect username or password".into(),
            Self::Unauthorized => "Could not validate credentials".into(),
            Self::InvalidToken(_)
            | Self::UserNotFound
            | Self::TokenMismatch
            | Self::TokenExpired => "Invalid or expired verification token".into(),
            Self::DuplicateUser => "Username or email already registered".into(),
            Self::AlreadyVerified => "Email is already verified".into(),
            Self::Validation(msg) => msg.clone(),
            Self::Internal(_) => "Internal server error".into(),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        AuthError::InvalidToken(e)
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection, "rejected json body");
        AuthError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for AuthError {
    fn from(rejection: FormRejection) -> Self {
        warn!(error = %rejection, "rejected form body");
        AuthError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AuthError {
    fn from(rejection: QueryRejection) -> Self {
        warn!(error = %rejection, "rejected query string");
        AuthError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Internal(ref e) = self {
            error!(error = ?e, "internal error");
        }
        let body = Json(json!({
            "detail": self.detail(),
            "error_code": self.error_code(),
        }));
        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_rejections_share_public_message() {
        let msgs: Vec<String> = [
            AuthError::UserNotFound,
            AuthError::TokenMismatch,
            AuthError::TokenExpired,
            AuthError::InvalidToken(TokenError::Expired),
        ]
        .iter()
        .map(AuthError::detail)
        .collect();
        assert!(msgs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(
            AuthError::TokenMismatch.error_code(),
            AuthError::TokenExpired.error_code()
        );
        // Internally the variants stay distinct.
        assert_ne!(
            AuthError::TokenMismatch.to_string(),
            AuthError::TokenExpired.to_string()
        );
    }

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let res = AuthError::Unauthorized.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::DuplicateUser.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Internal(anyhow::anyhow!("db down")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
