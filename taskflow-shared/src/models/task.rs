/// Task model and database operations
///
/// Tasks are soft-deleted: `is_deleted` is set and the row stays. Every read in
/// this module filters deleted rows out, so a deleted task is indistinguishable
/// from a missing one.
///
/// Status transitions are unconstrained. Moving to `DONE` stamps
/// `completed_at`; moving anywhere else clears it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('TODO', 'IN_PROGRESS', 'REVIEW', 'DONE');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'urgent');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     title VARCHAR(200) NOT NULL,
///     description VARCHAR(2000) NOT NULL,
///     status task_status NOT NULL DEFAULT 'TODO',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ NOT NULL,
///     created_by UUID NOT NULL REFERENCES users(id),
///     assigned_to UUID REFERENCES users(id),
///     tags TEXT[] NOT NULL DEFAULT '{}',
///     is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
///     deleted_at TIMESTAMPTZ,
///     completed_at TIMESTAMPTZ,
///     due_soon_sent BOOLEAN NOT NULL DEFAULT FALSE,
///     overdue_sent BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::models::task::{CreateTask, Task, TaskPriority, TaskStatus};
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, creator: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, CreateTask {
///     title: "Quarterly report".to_string(),
///     description: "Draft the Q3 numbers".to_string(),
///     status: TaskStatus::Todo,
///     priority: TaskPriority::High,
///     due_date: chrono::Utc::now() + chrono::Duration::days(3),
///     created_by: creator,
///     assigned_to: None,
///     tags: vec!["Finance ".to_string()],
/// }).await?;
///
/// assert_eq!(task.tags, vec!["finance"]);
/// Task::update_status(&pool, task.id, TaskStatus::Done).await?;
/// # Ok(())
/// # }
/// ```

use crate::models::user::UserSummary;
use crate::pagination::PageRequest;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, created_by, \
     assigned_to, tags, is_deleted, deleted_at, completed_at, due_soon_sent, overdue_sent, \
     created_at, updated_at";

const TASK_DETAILS_SELECT: &str = "SELECT t.id, t.title, t.description, t.status, t.priority, \
     t.due_date, t.created_by, t.assigned_to, t.tags, t.is_deleted, t.deleted_at, t.completed_at, \
     t.due_soon_sent, t.overdue_sent, t.created_at, t.updated_at, \
     c.first_name AS creator_first_name, c.last_name AS creator_last_name, c.email AS creator_email, \
     a.first_name AS assignee_first_name, a.last_name AS assignee_last_name, a.email AS assignee_email \
     FROM tasks t \
     LEFT JOIN users c ON c.id = t.created_by \
     LEFT JOIN users a ON a.id = t.assigned_to";

/// Workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Review => "REVIEW",
            TaskStatus::Done => "DONE",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

/// Task priority, ordered low to urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// Task row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,

    /// Trimmed, lowercased
    pub tags: Vec<String>,

    #[serde(skip_serializing)]
    pub is_deleted: bool,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Set when the task moves to DONE
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing)]
    pub due_soon_sent: bool,
    #[serde(skip_serializing)]
    pub overdue_sent: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A task is overdue once its due date has passed without reaching DONE
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Done && now > self.due_date
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.assigned_to == Some(user_id)
    }
}

/// Task joined with its creator and assignee, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,

    pub is_overdue: bool,
    pub creator: Option<UserSummary>,
    pub assignee: Option<UserSummary>,
}

#[derive(sqlx::FromRow)]
struct TaskDetailsRow {
    #[sqlx(flatten)]
    task: Task,
    creator_first_name: Option<String>,
    creator_last_name: Option<String>,
    creator_email: Option<String>,
    assignee_first_name: Option<String>,
    assignee_last_name: Option<String>,
    assignee_email: Option<String>,
}

fn summary(
    id: Option<Uuid>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
) -> Option<UserSummary> {
    Some(UserSummary {
        id: id?,
        first_name: first_name?,
        last_name: last_name?,
        email: email?,
    })
}

impl From<TaskDetailsRow> for TaskDetails {
    fn from(row: TaskDetailsRow) -> Self {
        let creator = summary(
            Some(row.task.created_by),
            row.creator_first_name,
            row.creator_last_name,
            row.creator_email,
        );
        let assignee = summary(
            row.task.assigned_to,
            row.assignee_first_name,
            row.assignee_last_name,
            row.assignee_email,
        );

        TaskDetails {
            is_overdue: row.task.is_overdue_at(Utc::now()),
            task: row.task,
            creator,
            assignee,
        }
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,

    /// Normalized with [`normalize_tags`] before insert
    pub tags: Vec<String>,
}

/// Partial task update; only `Some` fields are written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    /// `Some(None)` unassigns the task
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<Option<Uuid>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Keeps an explicit JSON `null` apart from a missing field
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`: a missing
/// field stays `None`, `null` becomes `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.assigned_to.is_none()
            && self.tags.is_none()
    }

    /// The current values of the fields this update touches
    pub fn old_values(&self, task: &Task) -> serde_json::Value {
        let mut values = serde_json::Map::new();
        if self.title.is_some() {
            values.insert("title".into(), serde_json::json!(task.title));
        }
        if self.description.is_some() {
            values.insert("description".into(), serde_json::json!(task.description));
        }
        if self.status.is_some() {
            values.insert("status".into(), serde_json::json!(task.status));
        }
        if self.priority.is_some() {
            values.insert("priority".into(), serde_json::json!(task.priority));
        }
        if self.due_date.is_some() {
            values.insert("due_date".into(), serde_json::json!(task.due_date));
        }
        if self.assigned_to.is_some() {
            values.insert("assigned_to".into(), serde_json::json!(task.assigned_to));
        }
        if self.tags.is_some() {
            values.insert("tags".into(), serde_json::json!(task.tags));
        }
        serde_json::Value::Object(values)
    }
}

/// Visibility scope for listings and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// Every non-deleted task
    All,

    /// Only tasks the user created or is assigned to
    Participant(Uuid),
}

/// Column a task listing may be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Status,
    Title,
}

impl TaskSortField {
    fn column(&self) -> &'static str {
        match self {
            TaskSortField::CreatedAt => "t.created_at",
            TaskSortField::UpdatedAt => "t.updated_at",
            TaskSortField::DueDate => "t.due_date",
            TaskSortField::Priority => "t.priority",
            TaskSortField::Status => "t.status",
            TaskSortField::Title => "t.title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters for the task listing
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,

    /// Full-text query over title and description
    pub search: Option<String>,

    /// Inclusive lower bound on `due_date`
    pub from_date: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `due_date`
    pub to_date: Option<DateTime<Utc>>,

    pub sort_by: TaskSortField,
    pub sort_order: SortOrder,
}

/// Aggregate counts for the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: i64,
    pub status_counts: BTreeMap<TaskStatus, i64>,
    pub priority_counts: BTreeMap<TaskPriority, i64>,
    pub overdue: i64,
    pub completed_this_week: i64,
}

impl TaskStats {
    /// Builds stats from grouped counts, filling absent groups with zero
    pub fn from_counts(
        status_rows: Vec<(TaskStatus, i64)>,
        priority_rows: Vec<(TaskPriority, i64)>,
        overdue: i64,
        completed_this_week: i64,
    ) -> Self {
        let mut status_counts: BTreeMap<TaskStatus, i64> =
            TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut priority_counts: BTreeMap<TaskPriority, i64> =
            TaskPriority::ALL.iter().map(|p| (*p, 0)).collect();

        let mut total = 0;
        for (status, count) in status_rows {
            total += count;
            status_counts.insert(status, count);
        }
        for (priority, count) in priority_rows {
            priority_counts.insert(priority, count);
        }

        Self {
            total,
            status_counts,
            priority_counts,
            overdue,
            completed_this_week,
        }
    }
}

/// A task due for a reminder, joined with its assignee
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReminderCandidate {
    pub task_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub assignee_id: Uuid,
    pub assignee_email: String,
    pub assignee_first_name: String,
}

/// Per-user counts for the daily digest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DigestCounts {
    pub total: i64,
    pub completed: i64,
    pub due_today: i64,
    pub overdue: i64,
}

/// Trims and lowercases tags, dropping empty and duplicate entries
///
/// # Example
///
/// ```
/// use taskflow_shared::models::task::normalize_tags;
///
/// let tags = normalize_tags(vec![" Backend".into(), "backend".into(), "".into(), "API".into()]);
/// assert_eq!(tags, vec!["backend", "api"]);
/// ```
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

fn completed_at_for(status: TaskStatus) -> Option<DateTime<Utc>> {
    (status == TaskStatus::Done).then(Utc::now)
}

fn push_scope(query: &mut QueryBuilder<'_, Postgres>, scope: TaskScope) {
    if let TaskScope::Participant(user_id) = scope {
        query
            .push(" AND (t.created_by = ")
            .push_bind(user_id)
            .push(" OR t.assigned_to = ")
            .push_bind(user_id)
            .push(")");
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    if let Some(status) = filter.status {
        query.push(" AND t.status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        query.push(" AND t.priority = ").push_bind(priority);
    }
    if let Some(assigned_to) = filter.assigned_to {
        query.push(" AND t.assigned_to = ").push_bind(assigned_to);
    }
    if let Some(created_by) = filter.created_by {
        query.push(" AND t.created_by = ").push_bind(created_by);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(" AND to_tsvector('english', t.title || ' ' || t.description) @@ plainto_tsquery('english', ")
            .push_bind(search.to_string())
            .push(")");
    }
    if let Some(from_date) = filter.from_date {
        query.push(" AND t.due_date >= ").push_bind(from_date);
    }
    if let Some(to_date) = filter.to_date {
        query.push(" AND t.due_date <= ").push_bind(to_date);
    }
}

impl Task {
    /// Creates a task
    ///
    /// # Errors
    ///
    /// Returns a database error if `created_by` or `assigned_to` reference
    /// missing users.
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, due_date,
                               created_by, assigned_to, tags, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(Uuid::new_v4())
            .bind(data.title.trim())
            .bind(data.description.trim())
            .bind(data.status)
            .bind(data.priority)
            .bind(data.due_date)
            .bind(data.created_by)
            .bind(data.assigned_to)
            .bind(normalize_tags(data.tags))
            .bind(completed_at_for(data.status))
            .fetch_one(pool)
            .await
    }

    /// Finds a non-deleted task by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND is_deleted = FALSE",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a non-deleted task with creator and assignee populated
    pub async fn find_details(pool: &PgPool, id: Uuid) -> Result<Option<TaskDetails>, sqlx::Error> {
        let sql = format!("{} WHERE t.id = $1 AND t.is_deleted = FALSE", TASK_DETAILS_SELECT);

        let row = sqlx::query_as::<_, TaskDetailsRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(TaskDetails::from))
    }

    /// Lists non-deleted tasks within `scope` matching `filter`
    ///
    /// # Returns
    ///
    /// The requested page and the total number of matching tasks
    pub async fn list(
        pool: &PgPool,
        scope: TaskScope,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<(Vec<TaskDetails>, i64), sqlx::Error> {
        let mut count_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM tasks t WHERE t.is_deleted = FALSE");
        push_scope(&mut count_query, scope);
        push_filter(&mut count_query, filter);
        let (total,) = count_query.build_query_as::<(i64,)>().fetch_one(pool).await?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(TASK_DETAILS_SELECT);
        query.push(" WHERE t.is_deleted = FALSE");
        push_scope(&mut query, scope);
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(filter.sort_by.column())
            .push(" ")
            .push(filter.sort_order.keyword())
            .push(", t.id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query.build_query_as::<TaskDetailsRow>().fetch_all(pool).await?;

        Ok((rows.into_iter().map(TaskDetails::from).collect(), total))
    }

    /// Applies a partial update to a non-deleted task
    ///
    /// Changing the status maintains `completed_at`. Changing the due date
    /// re-arms both reminder flags. `assigned_to: Some(None)` writes NULL.
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateTask) -> Result<Option<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            query.push(", title = ").push_bind(title.trim().to_string());
        }
        if let Some(description) = data.description {
            query.push(", description = ").push_bind(description.trim().to_string());
        }
        if let Some(status) = data.status {
            query
                .push(", status = ")
                .push_bind(status)
                .push(", completed_at = ")
                .push_bind(completed_at_for(status));
        }
        if let Some(priority) = data.priority {
            query.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = data.due_date {
            query
                .push(", due_date = ")
                .push_bind(due_date)
                .push(", due_soon_sent = FALSE, overdue_sent = FALSE");
        }
        if let Some(assigned_to) = data.assigned_to {
            query.push(", assigned_to = ").push_bind(assigned_to);
        }
        if let Some(tags) = data.tags {
            query.push(", tags = ").push_bind(normalize_tags(tags));
        }

        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND is_deleted = FALSE RETURNING ")
            .push(TASK_COLUMNS);

        query.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Sets the status of a non-deleted task, maintaining `completed_at`
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = $2, completed_at = $3, updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(status)
            .bind(completed_at_for(status))
            .fetch_optional(pool)
            .await
    }

    /// Marks a task deleted
    ///
    /// # Returns
    ///
    /// False if the task was missing or already deleted
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Dashboard statistics within `scope`
    pub async fn stats(pool: &PgPool, scope: TaskScope) -> Result<TaskStats, sqlx::Error> {
        let now = Utc::now();

        let mut status_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT t.status, COUNT(*) FROM tasks t WHERE t.is_deleted = FALSE");
        push_scope(&mut status_query, scope);
        status_query.push(" GROUP BY t.status");
        let status_rows = status_query
            .build_query_as::<(TaskStatus, i64)>()
            .fetch_all(pool)
            .await?;

        let mut priority_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT t.priority, COUNT(*) FROM tasks t WHERE t.is_deleted = FALSE");
        push_scope(&mut priority_query, scope);
        priority_query.push(" GROUP BY t.priority");
        let priority_rows = priority_query
            .build_query_as::<(TaskPriority, i64)>()
            .fetch_all(pool)
            .await?;

        let mut totals_query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FILTER (WHERE t.status <> 'DONE' AND t.due_date < ",
        );
        totals_query
            .push_bind(now)
            .push("), COUNT(*) FILTER (WHERE t.completed_at >= ")
            .push_bind(now - Duration::days(7))
            .push(") FROM tasks t WHERE t.is_deleted = FALSE");
        push_scope(&mut totals_query, scope);
        let (overdue, completed_this_week) = totals_query
            .build_query_as::<(i64, i64)>()
            .fetch_one(pool)
            .await?;

        Ok(TaskStats::from_counts(
            status_rows,
            priority_rows,
            overdue,
            completed_this_week,
        ))
    }

    /// Assigned, unfinished tasks due within `[now, now + 24h]` that have not
    /// had a due-soon reminder
    pub async fn due_soon_candidates(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderCandidate>, sqlx::Error> {
        sqlx::query_as::<_, ReminderCandidate>(
            r#"
            SELECT t.id AS task_id, t.title, t.description, t.priority, t.due_date,
                   u.id AS assignee_id, u.email AS assignee_email, u.first_name AS assignee_first_name
            FROM tasks t
            JOIN users u ON u.id = t.assigned_to
            WHERE t.is_deleted = FALSE
              AND t.status <> 'DONE'
              AND t.due_soon_sent = FALSE
              AND t.due_date >= $1
              AND t.due_date <= $2
              AND u.is_active = TRUE
            ORDER BY t.due_date
            "#,
        )
        .bind(now)
        .bind(now + Duration::hours(24))
        .fetch_all(pool)
        .await
    }

    /// Assigned, unfinished tasks past due that have not had an overdue notice
    pub async fn overdue_candidates(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderCandidate>, sqlx::Error> {
        sqlx::query_as::<_, ReminderCandidate>(
            r#"
            SELECT t.id AS task_id, t.title, t.description, t.priority, t.due_date,
                   u.id AS assignee_id, u.email AS assignee_email, u.first_name AS assignee_first_name
            FROM tasks t
            JOIN users u ON u.id = t.assigned_to
            WHERE t.is_deleted = FALSE
              AND t.status <> 'DONE'
              AND t.overdue_sent = FALSE
              AND t.due_date < $1
              AND u.is_active = TRUE
            ORDER BY t.due_date
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }

    pub async fn mark_due_soon_sent(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE tasks SET due_soon_sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_overdue_sent(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE tasks SET overdue_sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Digest counts over the non-deleted tasks assigned to `user_id`
    ///
    /// `day_start..day_end` bounds "due today".
    pub async fn digest_counts(
        pool: &PgPool,
        user_id: Uuid,
        now: DateTime<Utc>,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<DigestCounts, sqlx::Error> {
        sqlx::query_as::<_, DigestCounts>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'DONE') AS completed,
                   COUNT(*) FILTER (WHERE status <> 'DONE' AND due_date >= $2 AND due_date < $3) AS due_today,
                   COUNT(*) FILTER (WHERE status <> 'DONE' AND due_date < $4) AS overdue
            FROM tasks
            WHERE assigned_to = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(user_id)
        .bind(day_start)
        .bind(day_end)
        .bind(now)
        .fetch_one(pool)
        .await
    }
}
