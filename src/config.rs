use std::str::FromStr;

use anyhow::{bail, Context};
use serde::Deserialize;

/// One week.
const MAX_ACCESS_TTL_MINUTES: i64 = 7 * 24 * 60;
/// Thirty days.
const MAX_VERIFICATION_TTL_HOURS: i64 = 30 * 24;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub verification_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    /// Base URL the verification link points at.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub enable_cron_jobs: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            access_ttl_minutes: ttl_from_env(
                "ACCESS_TOKEN_TTL_MINUTES",
                30,
                MAX_ACCESS_TTL_MINUTES,
            )?,
            verification_ttl_hours: ttl_from_env(
                "VERIFICATION_TOKEN_TTL_HOURS",
                24,
                MAX_VERIFICATION_TTL_HOURS,
            )?,
        };
        let mail = MailConfig {
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@bonsai.app".into()),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
        };
        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:3001".into()),
        );
        Ok(Self {
            database_url,
            jwt,
            mail,
            enable_cron_jobs: env_or("ENABLE_CRON_JOBS", true),
            cors_origins,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Token lifetime from `key`, falling back to `default` when unset. Values
/// that do not parse or fall outside `1..=max` are a startup error.
fn ttl_from_env(key: &str, default: i64, max: i64) -> anyhow::Result<i64> {
    match std::env::var(key) {
        Ok(raw) => parse_ttl(key, &raw, max),
        Err(_) => Ok(default),
    }
}

fn parse_ttl(key: &str, raw: &str, max: i64) -> anyhow::Result<i64> {
    let ttl: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be an integer, got {raw:?}"))?;
    if !(1..=max).contains(&ttl) {
        bail!("{key} must be between 1 and {max}, got {ttl}");
    }
    Ok(ttl)
}

pub(crate) fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_trims_and_skips_empty() {
        let origins = parse_origins(" http://a.test/ ,, http://b.test");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn ttl_must_be_positive_and_bounded() {
        assert_eq!(parse_ttl("ACCESS_TOKEN_TTL_MINUTES", " 45 ", 60).unwrap(), 45);
        assert_eq!(parse_ttl("ACCESS_TOKEN_TTL_MINUTES", "60", 60).unwrap(), 60);
        for raw in ["0", "-5", "61", "9223372036854775807", "soon"] {
            let err = parse_ttl("ACCESS_TOKEN_TTL_MINUTES", raw, 60).unwrap_err();
            assert!(err.to_string().contains("ACCESS_TOKEN_TTL_MINUTES"), "{raw}");
        }
    }

    #[test]
    fn unset_ttl_uses_default() {
        assert_eq!(
            ttl_from_env("BONSAI_TEST_UNSET_TTL", 24, MAX_VERIFICATION_TTL_HOURS).unwrap(),
            24
        );
    }

    #[test]
    fn env_or_falls_back_on_missing_or_garbage() {
        assert_eq!(env_or("BONSAI_TEST_UNSET_VARIABLE", 30i64), 30);
        std::env::set_var("BONSAI_TEST_GARBAGE_TTL", "soon");
        assert_eq!(env_or("BONSAI_TEST_GARBAGE_TTL", 24i64), 24);
    }
}
