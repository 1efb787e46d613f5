//! # TaskFlow Worker
//!
//! Sends scheduled task notifications by email:
//! - hourly reminders for tasks due within 24 hours
//! - overdue notices every 6 hours
//! - a daily digest at 08:00
//!
//! The worker does nothing unless `NOTIFICATIONS_ENABLED` is set.
//!
//! ## Usage
//!
//! ```bash
//! NOTIFICATIONS_ENABLED=true cargo run -p taskflow-worker
//! ```

use std::sync::Arc;
use taskflow_shared::db::pool::{close_pool, create_pool};
use taskflow_shared::notify::{build_mailer, templates::Templates};
use taskflow_worker::config::WorkerConfig;
use taskflow_worker::jobs::NotificationJobs;
use taskflow_worker::scheduler::NotificationScheduler;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskflow_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TaskFlow Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;
    if !config.notifications_enabled {
        tracing::info!("Notifications are disabled (NOTIFICATIONS_ENABLED is not set), exiting");
        return Ok(());
    }

    let pool = create_pool(config.database.clone()).await?;
    tracing::info!("Database pool created");

    let mailer = build_mailer(&config.email)?;
    let templates = Templates::new(config.email.frontend_url.clone());
    let jobs = Arc::new(NotificationJobs::new(pool.clone(), mailer, templates));

    let mut scheduler = NotificationScheduler::new(jobs).await?;
    scheduler.register_all().await?;
    scheduler.start().await?;

    tracing::info!("Worker ready, waiting for scheduled jobs");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping scheduler...");

    scheduler.shutdown().await?;
    close_pool(pool).await;

    tracing::info!("Worker stopped");
    Ok(())
}
