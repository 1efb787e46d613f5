/// Cron scheduler for the notification jobs
///
/// | Job          | Schedule          | When                 |
/// |--------------|-------------------|----------------------|
/// | due soon     | `0 0 * * * *`     | top of every hour    |
/// | overdue      | `0 0 */6 * * *`   | every 6 hours        |
/// | daily digest | `0 0 8 * * *`     | 08:00 UTC every day  |
///
/// Expressions have a leading seconds field and are evaluated in UTC. A
/// failed run is logged and the next tick runs normally.

use crate::jobs::NotificationJobs;
use chrono::Utc;
use std::sync::Arc;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler, JobSchedulerError};

pub const DUE_SOON_SCHEDULE: &str = "0 0 * * * *";
pub const OVERDUE_SCHEDULE: &str = "0 0 */6 * * *";
pub const DAILY_DIGEST_SCHEDULE: &str = "0 0 8 * * *";

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Failed to create {job} schedule: {source}")]
    Create {
        job: &'static str,
        #[source]
        source: JobSchedulerError,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

/// Which job a schedule runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    DueSoon,
    Overdue,
    DailyDigest,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::DueSoon, JobKind::Overdue, JobKind::DailyDigest];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::DueSoon => "due_soon",
            JobKind::Overdue => "overdue",
            JobKind::DailyDigest => "daily_digest",
        }
    }

    pub fn schedule(&self) -> &'static str {
        match self {
            JobKind::DueSoon => DUE_SOON_SCHEDULE,
            JobKind::Overdue => OVERDUE_SCHEDULE,
            JobKind::DailyDigest => DAILY_DIGEST_SCHEDULE,
        }
    }

    async fn run(&self, jobs: &NotificationJobs) {
        let now = Utc::now();
        let result = match self {
            JobKind::DueSoon => jobs.run_due_soon(now).await,
            JobKind::Overdue => jobs.run_overdue(now).await,
            JobKind::DailyDigest => jobs.run_daily_digest(now).await,
        };

        if let Err(e) = result {
            tracing::error!(job = self.name(), error = %e, "Notification job failed");
        }
    }
}

/// Owns the cron scheduler and the registered notification jobs
pub struct NotificationScheduler {
    scheduler: JobScheduler,
    jobs: Arc<NotificationJobs>,
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler").finish()
    }
}

impl NotificationScheduler {
    pub async fn new(jobs: Arc<NotificationJobs>) -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self { scheduler, jobs })
    }

    /// Registers every notification job
    pub async fn register_all(&self) -> Result<(), SchedulerError> {
        for kind in JobKind::ALL {
            self.register(kind).await?;
        }

        tracing::info!("All notification jobs registered");
        Ok(())
    }

    async fn register(&self, kind: JobKind) -> Result<(), SchedulerError> {
        let jobs = Arc::clone(&self.jobs);
        let job = CronJob::new_async(kind.schedule(), move |_uuid, _lock| {
            let jobs = Arc::clone(&jobs);
            Box::pin(async move {
                tracing::debug!(job = kind.name(), "Running scheduled job");
                kind.run(&jobs).await;
            })
        })
        .map_err(|source| SchedulerError::Create {
            job: kind.name(),
            source,
        })?;

        self.scheduler.add(job).await?;

        tracing::info!(job = kind.name(), schedule = kind.schedule(), "Registered notification job");
        Ok(())
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler.start().await?;
        tracing::info!("Notification scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        self.scheduler.shutdown().await?;
        tracing::info!("Notification scheduler shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kinds_have_distinct_schedules() {
        let schedules: Vec<&str> = JobKind::ALL.iter().map(|k| k.schedule()).collect();
        assert_eq!(schedules, vec!["0 0 * * * *", "0 0 */6 * * *", "0 0 8 * * *"]);

        let names: Vec<&str> = JobKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["due_soon", "overdue", "daily_digest"]);
    }

    #[tokio::test]
    async fn test_schedules_parse() {
        for kind in JobKind::ALL {
            let job = CronJob::new_async(kind.schedule(), |_uuid, _lock| Box::pin(async {}));
            assert!(job.is_ok(), "{} schedule should parse", kind.name());
        }
    }
}
