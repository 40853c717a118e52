use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::claims::{AccessClaims, Envelope, TokenKind, VerificationClaims},
    config::JwtConfig,
    state::AppState,
};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token is malformed")]
    Malformed,
    #[error("token kind mismatch")]
    WrongKind,
    #[error("token encoding failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// A freshly signed token and the instant its `exp` claim points at.
#[derive(Debug, Clone)]
pub struct Signed {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct Decoded<C> {
    pub claims: C,
    pub expires_at: OffsetDateTime,
}

/// HS256 signing material shared by every token kind.
///
/// All kinds use the same secret, so the `type` claim is what keeps an access
/// token from being accepted as a verification token and the reverse.
/// Changing `JWT_SECRET` invalidates every outstanding token.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub access_ttl: Duration,
    pub verification_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            access_ttl: Duration::minutes(cfg.access_ttl_minutes),
            verification_ttl: Duration::hours(cfg.verification_ttl_hours),
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation
    }

    /// Sign `claims` tagged as `kind`, expiring `ttl` from now.
    pub fn sign<C: Serialize>(
        &self,
        claims: &C,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<Signed, TokenError> {
        let exp = (OffsetDateTime::now_utc() + ttl).unix_timestamp();
        let envelope = Envelope {
            claims,
            kind: kind.tag().map(str::to_string),
            exp,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &envelope, &self.encoding)
            .map_err(TokenError::Encode)?;
        let expires_at =
            OffsetDateTime::from_unix_timestamp(exp).map_err(|_| TokenError::Malformed)?;
        debug!(kind = ?kind, exp, "jwt signed");
        Ok(Signed { token, expires_at })
    }

    /// Verify signature, expiry and kind tag, then hand back the claims.
    pub fn parse<C: DeserializeOwned>(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Decoded<C>, TokenError> {
        let data = decode::<Envelope<C>>(token, &self.decoding, &Self::validation())?;
        let envelope = data.claims;
        if envelope.kind.as_deref() != kind.tag() {
            debug!(expected = ?kind, found = ?envelope.kind, "jwt kind mismatch");
            return Err(TokenError::WrongKind);
        }
        let expires_at =
            OffsetDateTime::from_unix_timestamp(envelope.exp).map_err(|_| TokenError::Malformed)?;
        Ok(Decoded {
            claims: envelope.claims,
            expires_at,
        })
    }

    pub fn sign_access(&self, username: &str, user_id: Uuid) -> Result<Signed, TokenError> {
        let claims = AccessClaims {
            sub: username.to_string(),
            user_id,
        };
        self.sign(&claims, TokenKind::Access, self.access_ttl)
    }

    pub fn parse_access(&self, token: &str) -> Result<Decoded<AccessClaims>, TokenError> {
        self.parse(token, TokenKind::Access)
    }

    pub fn sign_verification(&self, email: &str, user_id: Uuid) -> Result<Signed, TokenError> {
        let claims = VerificationClaims {
            sub: email.to_string(),
            user_id,
        };
        self.sign(&claims, TokenKind::EmailVerification, self.verification_ttl)
    }

    pub fn parse_verification(
        &self,
        token: &str,
    ) -> Result<Decoded<VerificationClaims>, TokenError> {
        self.parse(token, TokenKind::EmailVerification)
    }
}

#[cfg(test)]
pub(crate) fn test_keys(secret: &str) -> JwtKeys {
    JwtKeys::from_config(&JwtConfig {
        secret: secret.into(),
        access_ttl_minutes: 30,
        verification_ttl_hours: 24,
    })
}
