use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{InsertOutcome, NewUser, User};
use crate::db::is_unique_violation;

/// Persistence the auth core depends on.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Insert a user, including any pending verification link, as one write.
    /// Uniqueness of username and email is enforced here, not by any earlier
    /// lookup.
    async fn insert(&self, user: NewUser<'_>) -> anyhow::Result<InsertOutcome>;

    /// Write the verification fields of `next` only if the stored row still has
    /// the verification state observed in `current`. Returns whether it applied.
    async fn compare_and_set(&self, current: &User, next: &User) -> anyhow::Result<bool>;

    /// Unverified users whose stored verification link expired before `now`.
    async fn count_expired_verifications(&self, now: OffsetDateTime) -> anyhow::Result<i64>;
}

const USER_COLUMNS: &str = "id, email, username, hashed_password, email_verified, \
     verification_token, verification_token_expires, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser<'_>) -> anyhow::Result<InsertOutcome> {
        let sql = format!(
            "INSERT INTO users (id, email, username, hashed_password, \
                                verification_token, verification_token_expires) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        );
        let (token, expires) = user.verification.unzip();
        let res = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(user.email)
            .bind(user.username)
            .bind(user.hashed_password)
            .bind(token)
            .bind(expires)
            .fetch_one(&self.db)
            .await;
        match res {
            Ok(created) => Ok(InsertOutcome::Created(created)),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
            Err(e) => Err(e).context("insert user"),
        }
    }

    async fn compare_and_set(&self, current: &User, next: &User) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET email_verified = $1,
                   verification_token = $2,
                   verification_token_expires = $3
             WHERE id = $4
               AND email_verified = $5
               AND verification_token IS NOT DISTINCT FROM $6
            "#,
        )
        .bind(next.email_verified)
        .bind(next.verification_token.as_deref())
        .bind(next.verification_token_expires)
        .bind(current.id)
        .bind(current.email_verified)
        .bind(current.verification_token.as_deref())
        .execute(&self.db)
        .await
        .context("compare-and-set user verification state")?;
        Ok(res.rows_affected() == 1)
    }

    async fn count_expired_verifications(&self, now: OffsetDateTime) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
              FROM users
             WHERE email_verified = FALSE
               AND verification_token_expires < $1
            "#,
        )
        .bind(now)
        .fetch_one(&self.db)
        .await
        .context("count expired verifications")?;
        Ok(count)
    }
}
