/// Task endpoints
///
/// All endpoints require authentication. Role `user` only sees tasks they
/// created or are assigned to; admins and managers see every task.
///
/// # Endpoints
///
/// - `GET /api/v1/tasks` - List tasks (filter, search, sort, paginate)
/// - `POST /api/v1/tasks` - Create task
/// - `GET /api/v1/tasks/stats` - Dashboard statistics
/// - `GET /api/v1/tasks/:id` - Get task
/// - `PUT /api/v1/tasks/:id` - Update task
/// - `PATCH /api/v1/tasks/:id/status` - Change status
/// - `DELETE /api/v1/tasks/:id` - Soft delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath, AppQuery, RequestMeta, ValidatedJson},
    response::ApiResponse,
    routes::{page_request, require_non_blank},
};
use axum::extract::{Extension, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use taskflow_shared::{
    auth::{authorization, middleware::AuthContext},
    models::{
        audit_log::{AuditAction, AuditResource, NewAuditLog},
        task::{
            nullable, CreateTask, SortOrder, Task, TaskDetails, TaskFilter, TaskPriority,
            TaskSortField, TaskStats, TaskStatus, UpdateTask,
        },
        user::User,
    },
    notify::templates::TaskEmail,
    pagination::Pagination,
};
use uuid::Uuid;
use validator::Validate;

/// Query string for the task listing
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub search: Option<String>,
    pub sort_by: Option<TaskSortField>,
    pub sort_order: Option<SortOrder>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl TaskListQuery {
    fn filter(&self) -> ApiResult<TaskFilter> {
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err(ApiError::invalid_field(
                    "from_date",
                    "from_date must not be after to_date",
                ));
            }
        }

        Ok(TaskFilter {
            status: self.status,
            priority: self.priority,
            assigned_to: self.assigned_to,
            created_by: self.created_by,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            from_date: self.from_date,
            to_date: self.to_date,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
        })
    }
}

/// Task listing response
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskDetails>,
    pub pagination: Pagination,
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Description must be between 1 and 2000 characters"))]
    pub description: String,

    pub due_date: DateTime<Utc>,

    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<Uuid>,
    pub tags: Option<Vec<String>>,
}

/// Partial task update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 2000, message = "Description must be between 1 and 2000 characters"))]
    pub description: Option<String>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,

    /// `null` unassigns the task
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<Uuid>>,

    pub tags: Option<Vec<String>>,
}

impl From<UpdateTaskRequest> for UpdateTask {
    fn from(req: UpdateTaskRequest) -> Self {
        UpdateTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            assigned_to: req.assigned_to,
            tags: req.tags,
        }
    }
}

/// Status change request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

/// List tasks
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/tasks?page=1&limit=10&status=TODO&priority=high&search=report
///     &sort_by=due_date&sort_order=asc&from_date=2024-05-01T00:00:00Z
/// Authorization: Bearer <access_token>
/// ```
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "message": "Tasks retrieved successfully",
///   "data": {
///     "tasks": [{ "id": "uuid", "title": "...", "creator": { ... }, "assignee": null }],
///     "pagination": { "page": 1, "limit": 10, "total": 1, "pages": 1 }
///   }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Invalid filter, sort or pagination values
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<TaskListQuery>,
) -> ApiResult<ApiResponse<TaskListResponse>> {
    let page = page_request(query.page, query.limit)?;
    let filter = query.filter()?;

    let (tasks, total) =
        Task::list(&state.db, authorization::task_scope(&auth), &filter, page).await?;

    Ok(ApiResponse::ok(
        "Tasks retrieved successfully",
        TaskListResponse {
            tasks,
            pagination: Pagination::new(page, total),
        },
    ))
}

/// Create a task
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/tasks
/// Authorization: Bearer <access_token>
///
/// {
///   "title": "Quarterly report",
///   "description": "Collect numbers from finance",
///   "due_date": "2024-06-01T17:00:00Z",
///   "priority": "high",
///   "assigned_to": "uuid",
///   "tags": ["Finance", "q2"]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, due date in the past, or unknown/inactive assignee
/// - `429 Too Many Requests`: Task creation limit reached
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> ApiResult<ApiResponse<TaskDetails>> {
    require_non_blank("title", Some(&req.title), "Task title is required")?;
    require_non_blank("description", Some(&req.description), "Task description is required")?;

    if req.due_date < Utc::now() {
        return Err(ApiError::invalid_field("due_date", "Due date cannot be in the past"));
    }

    let assignee = match req.assigned_to {
        Some(id) => Some(active_assignee(&state, id).await?),
        None => None,
    };

    let task = Task::create(
        &state.db,
        CreateTask {
            title: req.title,
            description: req.description,
            status: req.status.unwrap_or_default(),
            priority: req.priority.unwrap_or_default(),
            due_date: req.due_date,
            created_by: auth.user_id,
            assigned_to: req.assigned_to,
            tags: req.tags.unwrap_or_default(),
        },
    )
    .await?;

    tracing::info!(task_id = %task.id, user_id = %auth.user_id, "Task created");

    if let Some(assignee) = assignee.filter(|a| a.id != auth.user_id) {
        send_assignment_email(&state, &task, &assignee);
    }

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::Create, AuditResource::Task)
            .resource(task.id)
            .details(json!({
                "title": task.title,
                "priority": task.priority,
                "due_date": task.due_date,
            }))
            .request(meta.ip_address, meta.user_agent),
    );

    let details = load_details(&state, task.id).await?;
    Ok(ApiResponse::created("Task created successfully", details))
}

/// Task statistics within the caller's scope
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/tasks/stats
/// Authorization: Bearer <access_token>
/// ```
///
/// # Response
///
/// ```json
/// {
///   "total": 12,
///   "status_counts": { "TODO": 4, "IN_PROGRESS": 3, "REVIEW": 1, "DONE": 4 },
///   "priority_counts": { "low": 2, "medium": 6, "high": 3, "urgent": 1 },
///   "overdue": 2,
///   "completed_this_week": 3
/// }
/// ```
pub async fn task_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<TaskStats>> {
    let stats = Task::stats(&state.db, authorization::task_scope(&auth)).await?;
    Ok(ApiResponse::ok("Task statistics retrieved successfully", stats))
}

/// Get one task
///
/// # Errors
///
/// - `403 Forbidden`: Caller is neither creator nor assignee (role `user`)
/// - `404 Not Found`: Missing or deleted
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ApiResponse<TaskDetails>> {
    let details = load_details(&state, id).await?;
    authorization::can_view_task(&auth, &details.task)?;

    Ok(ApiResponse::ok("Task retrieved successfully", details))
}

/// Update a task
///
/// Only the fields present in the body change. Reassigning emails the new
/// assignee; moving the due date re-arms the reminder emails.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, empty body, or unknown/inactive assignee
/// - `403 Forbidden`: Caller is not the creator (role `user`)
/// - `404 Not Found`: Missing or deleted
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    AppPath(id): AppPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTaskRequest>,
) -> ApiResult<ApiResponse<TaskDetails>> {
    require_non_blank("title", req.title.as_deref(), "Task title cannot be empty")?;
    require_non_blank("description", req.description.as_deref(), "Task description cannot be empty")?;

    let update = UpdateTask::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let task = find_task(&state, id).await?;
    authorization::can_edit_task(&auth, &task)?;

    let new_assignee = match update.assigned_to {
        Some(Some(assignee_id)) if task.assigned_to != Some(assignee_id) => {
            Some(active_assignee(&state, assignee_id).await?)
        }
        _ => None,
    };

    let old_values = update.old_values(&task);
    let new_values = serde_json::to_value(&update).unwrap_or(JsonValue::Null);

    let updated = Task::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    tracing::info!(task_id = %id, user_id = %auth.user_id, "Task updated");

    if let Some(assignee) = new_assignee.filter(|a| a.id != auth.user_id) {
        send_assignment_email(&state, &updated, &assignee);
    }
    if task.status != TaskStatus::Done && updated.status == TaskStatus::Done {
        send_completion_email(&state, &updated, auth.user_id);
    }

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::Update, AuditResource::Task)
            .resource(id)
            .details(json!({ "old_values": old_values, "new_values": new_values }))
            .request(meta.ip_address, meta.user_agent),
    );

    let details = load_details(&state, id).await?;
    Ok(ApiResponse::ok("Task updated successfully", details))
}

/// Change a task's status
///
/// # Endpoint
///
/// ```text
/// PATCH /api/v1/tasks/:id/status
/// Authorization: Bearer <access_token>
///
/// { "status": "DONE" }
/// ```
///
/// Moving to `DONE` stamps `completed_at` and emails the creator; any other
/// status clears `completed_at`.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown status
/// - `403 Forbidden`: Caller is neither creator nor assignee (role `user`)
/// - `404 Not Found`: Missing or deleted
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateStatusRequest>,
) -> ApiResult<ApiResponse<TaskDetails>> {
    let task = find_task(&state, id).await?;
    authorization::can_change_task_status(&auth, &task)?;

    let updated = Task::update_status(&state.db, id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    tracing::info!(task_id = %id, from = ?task.status, to = ?updated.status, "Task status changed");

    if task.status != TaskStatus::Done && updated.status == TaskStatus::Done {
        send_completion_email(&state, &updated, auth.user_id);
    }

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::StatusChange, AuditResource::Task)
            .resource(id)
            .details(json!({ "old_status": task.status, "new_status": updated.status }))
            .request(meta.ip_address, meta.user_agent),
    );

    let details = load_details(&state, id).await?;
    Ok(ApiResponse::ok("Task status updated successfully", details))
}

/// Soft-delete a task
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not the creator (role `user`)
/// - `404 Not Found`: Missing or already deleted
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    let task = find_task(&state, id).await?;
    authorization::can_delete_task(&auth, &task)?;

    if !Task::soft_delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    tracing::info!(task_id = %id, user_id = %auth.user_id, "Task deleted");

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::Delete, AuditResource::Task)
            .resource(id)
            .details(json!({ "title": task.title }))
            .request(meta.ip_address, meta.user_agent),
    );

    Ok(ApiResponse::message("Task deleted successfully"))
}

async fn find_task(state: &AppState, id: Uuid) -> ApiResult<Task> {
    Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

async fn load_details(state: &AppState, id: Uuid) -> ApiResult<TaskDetails> {
    Task::find_details(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

/// Assignees must exist and be active
async fn active_assignee(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::invalid_field("assigned_to", "Assigned user not found or inactive"))
}

fn send_assignment_email(state: &AppState, task: &Task, assignee: &User) {
    let message = state
        .templates
        .task_assigned(&assignee.email, &assignee.first_name, &TaskEmail::from(task));
    state.notify(message);
}

/// Emails the creator unless they completed the task themselves
fn send_completion_email(state: &AppState, task: &Task, completed_by: Uuid) {
    if task.created_by == completed_by {
        return;
    }

    let state = state.clone();
    let task = task.clone();
    tokio::spawn(async move {
        let creator = match User::find_by_id(&state.db, task.created_by).await {
            Ok(Some(creator)) if creator.is_active => creator,
            Ok(_) => return,
            Err(e) => {
                tracing::error!(error = %e, task_id = %task.id, "Failed to load task creator");
                return;
            }
        };

        let completer = match User::find_by_id(&state.db, completed_by).await {
            Ok(Some(user)) => user.full_name(),
            _ => "a teammate".to_string(),
        };

        let message = state.templates.task_completed(
            &creator.email,
            &creator.first_name,
            &TaskEmail::from(&task),
            &completer,
        );
        state.notify(message);
    });
}
