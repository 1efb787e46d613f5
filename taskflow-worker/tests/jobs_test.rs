/// Notification job tests against a real database
///
/// Run with `DATABASE_URL` pointing at a disposable database:
/// `cargo test -p taskflow-worker -- --ignored`

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use taskflow_shared::models::task::{CreateTask, Task, TaskPriority, TaskStatus};
use taskflow_shared::models::user::{CreateUser, Department, Role, User};
use taskflow_shared::notify::templates::Templates;
use taskflow_shared::notify::{EmailMessage, MailError, Mailer};
use taskflow_worker::jobs::NotificationJobs;
use uuid::Uuid;

/// Records messages addressed to the test users; fails on demand
struct RecordingMailer {
    recipients: Vec<String>,
    fail: bool,
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    fn new(recipients: Vec<String>, fail: bool) -> Self {
        Self {
            recipients,
            fail,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.subject.clone()).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        // Other rows in a shared database are not ours to judge
        if !self.recipients.contains(&message.to) {
            return Ok(());
        }
        if self.fail {
            return Err(MailError::Config("mailer offline".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Delivers to `recipient`, then closes the job's pool so later writes fail
struct PoolClosingMailer {
    recipient: String,
    pool: PgPool,
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Mailer for PoolClosingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if message.to == self.recipient {
            self.sent.lock().unwrap().push(message.subject);
            self.pool.close().await;
        }
        Ok(())
    }
}

struct Fixture {
    db: PgPool,
    creator: User,
    assignee: User,
}

impl Fixture {
    async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let db = PgPool::connect(&std::env::var("DATABASE_URL")?).await?;
        taskflow_shared::db::migrations::run_migrations(&db).await?;

        let creator = seed_user(&db, "Creator").await?;
        let assignee = seed_user(&db, "Assignee").await?;
        Ok(Self { db, creator, assignee })
    }

    async fn task(&self, title: &str, due_in: Duration, status: TaskStatus) -> Task {
        Task::create(
            &self.db,
            CreateTask {
                title: title.to_string(),
                description: "Worker test".to_string(),
                status,
                priority: TaskPriority::High,
                due_date: Utc::now() + due_in,
                created_by: self.creator.id,
                assigned_to: Some(self.assignee.id),
                tags: vec![],
            },
        )
        .await
        .expect("create task")
    }

    fn jobs(&self, mailer: Arc<RecordingMailer>) -> NotificationJobs {
        NotificationJobs::new(self.db.clone(), mailer, Templates::new("http://localhost:3000"))
    }

    fn mailer(&self, fail: bool) -> Arc<RecordingMailer> {
        Arc::new(RecordingMailer::new(vec![self.assignee.email.clone()], fail))
    }

    async fn cleanup(&self) {
        let ids = vec![self.creator.id, self.assignee.id];
        sqlx::query("DELETE FROM tasks WHERE created_by = ANY($1)")
            .bind(&ids)
            .execute(&self.db)
            .await
            .expect("delete tasks");
        sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.db)
            .await
            .expect("delete users");
    }
}

async fn seed_user(db: &PgPool, last_name: &str) -> anyhow::Result<User> {
    Ok(User::create(
        db,
        CreateUser {
            email: format!("worker-{}@example.com", Uuid::new_v4()),
            password_hash: "not-a-real-hash".to_string(),
            first_name: "Worker".to_string(),
            last_name: last_name.to_string(),
            role: Role::User,
            department: Department::Operations,
            job_title: None,
        },
    )
    .await?)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_due_soon_sends_once_and_sets_flag() {
    let fx = Fixture::new().await.expect("fixture");
    let soon = fx.task("Soon", Duration::hours(5), TaskStatus::Todo).await;
    let later = fx.task("Later", Duration::days(3), TaskStatus::Todo).await;
    let done = fx.task("Done", Duration::hours(5), TaskStatus::Done).await;

    let mailer = fx.mailer(false);
    let jobs = fx.jobs(mailer.clone());

    jobs.run_due_soon(Utc::now()).await.expect("run");
    assert_eq!(mailer.subjects(), vec!["⏰ Task Due Soon: Soon".to_string()]);

    assert!(Task::find_by_id(&fx.db, soon.id).await.unwrap().unwrap().due_soon_sent);
    assert!(!Task::find_by_id(&fx.db, later.id).await.unwrap().unwrap().due_soon_sent);
    assert!(!Task::find_by_id(&fx.db, done.id).await.unwrap().unwrap().due_soon_sent);

    // Second run finds nothing new
    jobs.run_due_soon(Utc::now()).await.expect("rerun");
    assert_eq!(mailer.subjects().len(), 1);

    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_failed_send_leaves_flag_clear() {
    let fx = Fixture::new().await.expect("fixture");
    let overdue = fx.task("Late", Duration::hours(-2), TaskStatus::InProgress).await;

    let report = fx.jobs(fx.mailer(true)).run_overdue(Utc::now()).await.expect("run");
    assert!(report.failed >= 1);
    assert!(!Task::find_by_id(&fx.db, overdue.id).await.unwrap().unwrap().overdue_sent);

    // Retried on the next run once delivery works
    let mailer = fx.mailer(false);
    fx.jobs(mailer.clone()).run_overdue(Utc::now()).await.expect("retry");
    assert_eq!(mailer.subjects(), vec!["🚨 Task Overdue: Late".to_string()]);
    assert!(Task::find_by_id(&fx.db, overdue.id).await.unwrap().unwrap().overdue_sent);

    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_daily_digest_only_for_users_with_tasks() {
    let fx = Fixture::new().await.expect("fixture");
    fx.task("Open", Duration::days(2), TaskStatus::Todo).await;
    fx.task("Finished", Duration::days(1), TaskStatus::Done).await;

    let mailer = Arc::new(RecordingMailer::new(
        vec![fx.assignee.email.clone(), fx.creator.email.clone()],
        false,
    ));
    fx.jobs(mailer.clone()).run_daily_digest(Utc::now()).await.expect("run");

    let sent = mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1, "creator has no assigned tasks");
    assert_eq!(sent[0].to, fx.assignee.email);
    assert_eq!(sent[0].subject, "📊 Your Daily Task Digest");

    let counts = Task::digest_counts(
        &fx.db,
        fx.assignee.id,
        Utc::now(),
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::hours(1),
    )
    .await
    .unwrap();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.completed, 1);

    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_database_error_does_not_stop_batch() {
    let fx = Fixture::new().await.expect("fixture");
    let first = fx.task("First", Duration::hours(-4), TaskStatus::Todo).await;
    let second = fx.task("Second", Duration::hours(-2), TaskStatus::Todo).await;

    let job_pool = PgPool::connect(&std::env::var("DATABASE_URL").unwrap()).await.unwrap();
    let mailer = Arc::new(PoolClosingMailer {
        recipient: fx.assignee.email.clone(),
        pool: job_pool.clone(),
        sent: Mutex::new(Vec::new()),
    });
    let jobs = NotificationJobs::new(job_pool, mailer.clone(), Templates::new("http://localhost:3000"));

    let report = jobs.run_overdue(Utc::now()).await.expect("run completes");
    assert!(report.failed >= 2);
    assert_eq!(
        mailer.sent.lock().unwrap().clone(),
        vec!["🚨 Task Overdue: First".to_string(), "🚨 Task Overdue: Second".to_string()]
    );

    // Neither flag could be written, so both are retried next time
    assert!(!Task::find_by_id(&fx.db, first.id).await.unwrap().unwrap().overdue_sent);
    assert!(!Task::find_by_id(&fx.db, second.id).await.unwrap().unwrap().overdue_sent);

    fx.cleanup().await;
}
