use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose a token was minted for. Carried as the `type` claim; access tokens omit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    EmailVerification,
}

impl TokenKind {
    pub fn tag(self) -> Option<&'static str> {
        match self {
            TokenKind::Access => None,
            TokenKind::EmailVerification => Some("email_verification"),
        }
    }
}

/// Bearer credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // username
    pub user_id: Uuid,
}

/// Email verification payload, mirrored in `users.verification_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationClaims {
    pub sub: String, // email
    pub user_id: Uuid,
}

/// Wire shape of every token we sign: the claims plus kind tag and expiry.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope<C> {
    #[serde(flatten)]
    pub claims: C,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub exp: i64,
    /// Random per token, so two tokens minted in the same second still differ.
    pub jti: Uuid,
}
