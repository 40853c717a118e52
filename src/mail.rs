use async_trait::async_trait;
use tracing::info;

use crate::config::MailConfig;

/// Outbound mail used by the verification flow. Callers treat delivery as best effort.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_link(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> anyhow::Result<()>;
}

pub fn verification_url(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/verify-email?token={}",
        frontend_url.trim_end_matches('/'),
        token
    )
}

/// Logs the verification link instead of delivering it.
#[derive(Clone)]
pub struct LogMailer {
    from: String,
    frontend_url: String,
}

impl LogMailer {
    pub fn new(cfg: &MailConfig) -> Self {
        Self {
            from: cfg.from.clone(),
            frontend_url: cfg.frontend_url.clone(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_link(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> anyhow::Result<()> {
        let url = verification_url(&self.frontend_url, token);
        info!(from = %self.from, to = %email, %username, %url, "verification email (not delivered)");
        Ok(())
    }
}
