use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

/// SQLSTATE 23505, raised by the users unique constraints.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    /// Driver error carrying only a SQLSTATE.
    #[derive(Debug, thiserror::Error)]
    #[error("database error {code}")]
    struct StateError {
        code: &'static str,
    }

    impl DatabaseError for StateError {
        fn message(&self) -> &str {
            "database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23505" => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(StateError { code }))
    }

    #[test]
    fn duplicate_key_is_a_unique_violation() {
        assert!(is_unique_violation(&db_error("23505")));
    }

    #[test]
    fn other_database_errors_are_not_unique_violations() {
        // 23503: foreign key violation
        assert!(!is_unique_violation(&db_error("23503")));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
