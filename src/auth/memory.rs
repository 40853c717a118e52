use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::{InsertOutcome, NewUser, User};

/// `UserStore` over a mutex-guarded vector, with the same uniqueness and
/// compare-and-set semantics as the Postgres store.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .lock()
            .expect("user store poisoned")
            .iter()
            .find(|u| pred(u))
            .cloned()
    }

    /// Overwrite a row unconditionally, for arranging test fixtures.
    pub fn put(&self, user: User) {
        let mut users = self.users.lock().expect("user store poisoned");
        users.retain(|u| u.id != user.id);
        users.push(user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.username == username))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.email == email))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.id == id))
    }

    async fn insert(&self, new: NewUser<'_>) -> anyhow::Result<InsertOutcome> {
        let mut users = self.users.lock().expect("user store poisoned");
        if users
            .iter()
            .any(|u| u.id == new.id || u.username == new.username || u.email == new.email)
        {
            return Ok(InsertOutcome::Conflict);
        }
        let (token, expires) = new.verification.unzip();
        let user = User {
            id: new.id,
            email: new.email.to_string(),
            username: new.username.to_string(),
            hashed_password: new.hashed_password.to_string(),
            email_verified: false,
            verification_token: token.map(str::to_string),
            verification_token_expires: expires,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(InsertOutcome::Created(user))
    }

    async fn compare_and_set(&self, current: &User, next: &User) -> anyhow::Result<bool> {
        let mut users = self.users.lock().expect("user store poisoned");
        let Some(row) = users.iter_mut().find(|u| u.id == current.id) else {
            return Ok(false);
        };
        if row.email_verified != current.email_verified
            || row.verification_token != current.verification_token
        {
            return Ok(false);
        }
        row.email_verified = next.email_verified;
        row.verification_token = next.verification_token.clone();
        row.verification_token_expires = next.verification_token_expires;
        Ok(true)
    }

    async fn count_expired_verifications(&self, now: OffsetDateTime) -> anyhow::Result<i64> {
        let users = self.users.lock().expect("user store poisoned");
        let n = users
            .iter()
            .filter(|u| !u.email_verified)
            .filter(|u| u.verification_token_expires.is_some_and(|t| t < now))
            .count();
        Ok(n as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(email: &'a str, username: &'a str) -> NewUser<'a> {
        NewUser::new(email, username, "hash")
    }

    #[tokio::test]
    async fn insert_enforces_uniqueness() {
        let store = MemoryUserStore::default();
        assert!(matches!(
            store.insert(new_user("a@x.com", "alice")).await.unwrap(),
            InsertOutcome::Created(_)
        ));
        assert!(matches!(
            store.insert(new_user("a@x.com", "other")).await.unwrap(),
            InsertOutcome::Conflict
        ));
        assert!(matches!(
            store.insert(new_user("b@x.com", "alice")).await.unwrap(),
            InsertOutcome::Conflict
        ));
    }

    #[tokio::test]
    async fn compare_and_set_rejects_stale_state() {
        let store = MemoryUserStore::default();
        let InsertOutcome::Created(user) = store.insert(new_user("a@x.com", "alice")).await.unwrap()
        else {
            panic!("insert failed");
        };
        let expires = OffsetDateTime::now_utc();
        let first = user.with_pending_verification("t1".into(), expires);
        assert!(store.compare_and_set(&user, &first).await.unwrap());
        // `user` no longer reflects the stored token.
        assert!(!store.compare_and_set(&user, &user.verified()).await.unwrap());
        assert!(store.compare_and_set(&first, &first.verified()).await.unwrap());
    }
}
