mod app;
mod auth;
mod config;
mod db;
mod mail;
mod scheduler;
mod state;

use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "bonsai=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;
    tracing::info!("database migrations applied");

    let mut scheduler = if app_state.config.enable_cron_jobs {
        let mut scheduler = Scheduler::new().await?;
        scheduler::register_default_jobs(&scheduler, app_state.users.clone()).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("cron jobs disabled");
        None
    };

    let result = app::serve(app::build_app(app_state)).await;

    if let Some(scheduler) = scheduler.as_mut().filter(|s| s.is_running()) {
        if let Err(e) = scheduler.stop().await {
            tracing::warn!(error = %e, "scheduler did not stop cleanly");
        }
    }

    result
}
