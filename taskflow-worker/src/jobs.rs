/// Notification jobs
///
/// Each job queries the tasks that need a notice, sends one email per task
/// (or per user for the digest) and records what happened in a [`JobReport`].
///
/// Reminder flags (`due_soon_sent`, `overdue_sent`) are set only after the
/// mailer accepted the message. A failed send leaves the flag clear and the
/// next run tries again. A database error on one task or user is logged and
/// counted as failed; the rest of the batch still runs. Only the candidate
/// query itself fails the whole run.
///
/// # Example
///
/// ```no_run
/// use taskflow_worker::jobs::NotificationJobs;
/// use taskflow_shared::notify::{LogMailer, templates::Templates};
/// use std::sync::Arc;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), sqlx::Error> {
/// let jobs = NotificationJobs::new(
///     pool,
///     Arc::new(LogMailer::new("noreply@taskflow.com")),
///     Templates::new("http://localhost:3000"),
/// );
///
/// let report = jobs.run_due_soon(chrono::Utc::now()).await?;
/// println!("sent {} reminders", report.sent);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use taskflow_shared::models::task::{ReminderCandidate, Task};
use taskflow_shared::models::user::User;
use taskflow_shared::notify::templates::{TaskEmail, Templates};
use taskflow_shared::notify::{EmailMessage, Mailer};

/// Outcome of one job run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Rows the job looked at
    pub candidates: usize,

    /// Emails accepted by the mailer
    pub sent: usize,

    /// Emails the mailer rejected, or per-item database errors
    pub failed: usize,

    /// Candidates that needed no email
    pub skipped: usize,
}

/// Runs the scheduled notification jobs
pub struct NotificationJobs {
    db: PgPool,
    mailer: Arc<dyn Mailer>,
    templates: Templates,
}

impl NotificationJobs {
    pub fn new(db: PgPool, mailer: Arc<dyn Mailer>, templates: Templates) -> Self {
        NotificationJobs { db, mailer, templates }
    }

    /// Reminds assignees of tasks due within the next 24 hours
    pub async fn run_due_soon(&self, now: DateTime<Utc>) -> Result<JobReport, sqlx::Error> {
        let candidates = Task::due_soon_candidates(&self.db, now).await?;
        let mut report = JobReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for candidate in &candidates {
            let hours = hours_left(candidate.due_date, now);
            if !should_remind(hours) {
                report.skipped += 1;
                continue;
            }

            let message = self.templates.task_due_soon(
                &candidate.assignee_email,
                &candidate.assignee_first_name,
                &TaskEmail::from(candidate),
                hours,
            );

            if !self.deliver(candidate, message, "due_soon").await {
                report.failed += 1;
                continue;
            }

            match Task::mark_due_soon_sent(&self.db, candidate.task_id).await {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    tracing::error!(task_id = %candidate.task_id, error = %e, "Failed to record due-soon reminder");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            candidates = report.candidates,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "Due-soon reminders processed"
        );

        Ok(report)
    }

    /// Notifies assignees of tasks past their due date
    pub async fn run_overdue(&self, now: DateTime<Utc>) -> Result<JobReport, sqlx::Error> {
        let candidates = Task::overdue_candidates(&self.db, now).await?;
        let mut report = JobReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for candidate in &candidates {
            let message = self.templates.task_overdue(
                &candidate.assignee_email,
                &candidate.assignee_first_name,
                &TaskEmail::from(candidate),
            );

            if !self.deliver(candidate, message, "overdue").await {
                report.failed += 1;
                continue;
            }

            match Task::mark_overdue_sent(&self.db, candidate.task_id).await {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    tracing::error!(task_id = %candidate.task_id, error = %e, "Failed to record overdue notice");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            candidates = report.candidates,
            sent = report.sent,
            failed = report.failed,
            "Overdue notices processed"
        );

        Ok(report)
    }

    /// Sends each active user a summary of the tasks assigned to them
    ///
    /// Users with no assigned tasks get nothing.
    pub async fn run_daily_digest(&self, now: DateTime<Utc>) -> Result<JobReport, sqlx::Error> {
        let users = User::list_active(&self.db).await?;
        let (day_start, day_end) = day_bounds(now);
        let mut report = JobReport {
            candidates: users.len(),
            ..Default::default()
        };

        for user in &users {
            let counts = match Task::digest_counts(&self.db, user.id, now, day_start, day_end).await {
                Ok(counts) => counts,
                Err(e) => {
                    tracing::error!(user_id = %user.id, error = %e, "Failed to count digest tasks");
                    report.failed += 1;
                    continue;
                }
            };
            if counts.total == 0 {
                report.skipped += 1;
                continue;
            }

            let message = self.templates.daily_digest(&user.email, &user.first_name, &counts);
            match self.mailer.send(message).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    tracing::error!(user_id = %user.id, error = %e, "Failed to send daily digest");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            users = report.candidates,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "Daily digests processed"
        );

        Ok(report)
    }

    async fn deliver(&self, candidate: &ReminderCandidate, message: EmailMessage, kind: &str) -> bool {
        match self.mailer.send(message).await {
            Ok(()) => {
                tracing::debug!(task_id = %candidate.task_id, kind, "Notification sent");
                true
            }
            Err(e) => {
                tracing::error!(
                    task_id = %candidate.task_id,
                    assignee_id = %candidate.assignee_id,
                    kind,
                    error = %e,
                    "Failed to send notification"
                );
                false
            }
        }
    }
}

/// Whole hours until `due`, rounded to the nearest hour
pub fn hours_left(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (due - now).num_seconds() as f64;
    (seconds / 3600.0).round() as i64
}

/// A due-soon reminder goes out for 1 to 24 hours left
pub fn should_remind(hours_left: i64) -> bool {
    hours_left > 0 && hours_left <= 24
}

/// Start of the UTC day containing `now` and the start of the next one
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}
