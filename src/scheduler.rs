//! Periodic background jobs.
//!
//! The scheduler is an ordinary value built by `main`: jobs are registered on
//! it, then it is started, and it is stopped during shutdown.

use std::{future::Future, sync::Arc};

use anyhow::Context;
use time::OffsetDateTime;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::auth::repo::UserStore;

pub struct Scheduler {
    inner: JobScheduler,
    running: bool,
}

impl Scheduler {
    pub async fn new() -> anyhow::Result<Self> {
        let inner = JobScheduler::new().await.context("create job scheduler")?;
        Ok(Self {
            inner,
            running: false,
        })
    }

    /// Register `job` on a six-field cron schedule (seconds first).
    pub async fn add_job<F, Fut>(
        &self,
        name: &'static str,
        schedule: &str,
        job: F,
    ) -> anyhow::Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let job = Arc::new(job);
        let cron_job = Job::new_async(schedule, move |_uuid, _lock| {
            let job = job.clone();
            Box::pin(async move {
                info!(job = name, "cron job started");
                match job().await {
                    Ok(()) => info!(job = name, "cron job finished"),
                    Err(e) => error!(job = name, error = %e, "cron job failed"),
                }
            })
        })
        .with_context(|| format!("invalid schedule {schedule:?} for job {name}"))?;

        self.inner
            .add(cron_job)
            .await
            .with_context(|| format!("register job {name}"))?;
        info!(job = name, %schedule, "cron job registered");
        Ok(())
    }

    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.running {
            return Ok(());
        }
        self.inner.start().await.context("start job scheduler")?;
        self.running = true;
        info!("cron jobs started");
        Ok(())
    }

    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if !self.running {
            return Ok(());
        }
        self.inner
            .shutdown()
            .await
            .context("shut down job scheduler")?;
        self.running = false;
        info!("scheduler shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Daily sweep reporting accounts whose verification link lapsed unused.
pub async fn register_default_jobs(
    scheduler: &Scheduler,
    users: Arc<dyn UserStore>,
) -> anyhow::Result<()> {
    scheduler
        .add_job("daily_cleanup", "0 0 0 * * *", move || {
            let users = users.clone();
            async move { report_expired_verifications(users.as_ref()).await.map(|_| ()) }
        })
        .await
}

async fn report_expired_verifications(users: &dyn UserStore) -> anyhow::Result<i64> {
    let expired = users
        .count_expired_verifications(OffsetDateTime::now_utc())
        .await?;
    info!(expired, "unverified accounts with lapsed verification links");
    Ok(expired)
}
