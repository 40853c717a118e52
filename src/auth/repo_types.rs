use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,    // unique
    pub username: String, // unique
    #[serde(skip_serializing)]
    pub hashed_password: String, // Argon2 PHC string
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub verification_token_expires: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Copy with a pending verification link; replaces any earlier one.
    pub fn with_pending_verification(&self, token: String, expires: OffsetDateTime) -> User {
        User {
            verification_token: Some(token),
            verification_token_expires: Some(expires),
            ..self.clone()
        }
    }

    /// Copy in the terminal verified state.
    pub fn verified(&self) -> User {
        User {
            email_verified: true,
            verification_token: None,
            verification_token_expires: None,
            ..self.clone()
        }
    }
}

/// Fields needed to insert a user; the store assigns the timestamp.
///
/// The id is chosen up front so a verification token naming it can be signed
/// before the row exists and written in the same insert.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub username: &'a str,
    pub hashed_password: &'a str,
    pub verification: Option<(&'a str, OffsetDateTime)>,
}

impl<'a> NewUser<'a> {
    pub fn new(email: &'a str, username: &'a str, hashed_password: &'a str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            hashed_password,
            verification: None,
        }
    }

    /// Create the row already holding a pending verification link.
    pub fn with_verification(self, token: &'a str, expires: OffsetDateTime) -> Self {
        Self {
            verification: Some((token, expires)),
            ..self
        }
    }
}

#[derive(Debug)]
pub enum InsertOutcome {
    Created(User),
    /// A unique constraint on username or email rejected the row.
    Conflict,
}
