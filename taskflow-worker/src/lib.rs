//! # TaskFlow Worker Library
//!
//! Scheduled email notifications for TaskFlow.
//!
//! ## Modules
//!
//! - `config`: environment configuration and the `NOTIFICATIONS_ENABLED` gate
//! - `jobs`: due-soon reminders, overdue notices and the daily digest
//! - `scheduler`: cron registration for the jobs
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskflow_shared::notify::{templates::Templates, LogMailer};
//! use taskflow_worker::{jobs::NotificationJobs, scheduler::NotificationScheduler};
//!
//! # async fn example(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! let jobs = NotificationJobs::new(
//!     pool,
//!     Arc::new(LogMailer::new("noreply@taskflow.com")),
//!     Templates::new("http://localhost:3000"),
//! );
//!
//! let scheduler = NotificationScheduler::new(Arc::new(jobs)).await?;
//! scheduler.register_all().await?;
//! scheduler.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod jobs;
pub mod scheduler;
