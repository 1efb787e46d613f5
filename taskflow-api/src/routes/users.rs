/// User endpoints
///
/// # Endpoints
///
/// - `GET /api/v1/users` - List users (admin/manager)
/// - `GET /api/v1/users/:id` - Get user (self, or admin/manager)
/// - `PUT|PATCH /api/v1/users/:id` - Update profile (self, or admin)
/// - `PATCH /api/v1/users/:id/avatar` - Upload avatar (self, or admin)
/// - `PATCH /api/v1/users/:id/role` - Change role (admin)
/// - `PATCH /api/v1/users/:id/status` - Activate/deactivate (admin)
/// - `GET /api/v1/users/:id/activity` - Audit trail (self, or admin/manager)

use crate::{
    app::{AppState, AVATAR_MAX_BYTES},
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath, AppQuery, RequestMeta, ValidatedJson},
    response::ApiResponse,
    routes::{page_request, require_non_blank},
};
use axum::extract::{multipart::MultipartRejection, Extension, Multipart, State};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use taskflow_shared::{
    auth::{authorization, middleware::AuthContext},
    models::{
        audit_log::{AuditAction, AuditLog, AuditResource, NewAuditLog},
        user::{Department, Role, UpdateProfile, User, UserFilter},
    },
    pagination::Pagination,
};
use uuid::Uuid;
use validator::Validate;

/// Public URL prefix of uploaded files
const UPLOADS_URL_PREFIX: &str = "/uploads/";

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub activities: Vec<AuditLog>,
    pub pagination: Pagination,
}

/// Profile update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be between 1 and 50 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Last name must be between 1 and 50 characters"))]
    pub last_name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,

    pub department: Option<Department>,

    #[validate(length(max = 100, message = "Job title cannot exceed 100 characters"))]
    pub job_title: Option<String>,
}

impl From<UpdateUserRequest> for UpdateProfile {
    fn from(req: UpdateUserRequest) -> Self {
        UpdateProfile {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            department: req.department,
            job_title: req.job_title,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

/// List users
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/users?page=1&limit=10&role=manager&is_active=true&search=jane
/// Authorization: Bearer <access_token>
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is a plain user
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> ApiResult<ApiResponse<UserListResponse>> {
    authorization::require_admin_or_manager(&auth)?;

    let page = page_request(query.page, query.limit)?;
    let filter = UserFilter {
        role: query.role,
        is_active: query.is_active,
        search: query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };

    let (users, total) = User::list(&state.db, &filter, page).await?;

    Ok(ApiResponse::ok(
        "Users retrieved successfully",
        UserListResponse {
            users,
            pagination: Pagination::new(page, total),
        },
    ))
}

/// Get one user
///
/// # Errors
///
/// - `403 Forbidden`: A plain user asking for someone else
/// - `404 Not Found`: No such user
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ApiResponse<User>> {
    authorization::can_view_user(&auth, id)?;
    let user = find_user(&state, id).await?;

    Ok(ApiResponse::ok("User retrieved successfully", user))
}

/// Update profile fields
///
/// # Endpoint
///
/// ```text
/// PUT /api/v1/users/:id
/// Authorization: Bearer <access_token>
///
/// { "first_name": "Jane", "job_title": "Staff Engineer" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or empty body
/// - `403 Forbidden`: Non-admin updating someone else
/// - `404 Not Found`: No such user
/// - `409 Conflict`: Email already in use
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    AppPath(id): AppPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<ApiResponse<User>> {
    authorization::can_update_user(&auth, id)?;

    require_non_blank("first_name", req.first_name.as_deref(), "First name cannot be empty")?;
    require_non_blank("last_name", req.last_name.as_deref(), "Last name cannot be empty")?;

    let update = UpdateProfile::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    find_user(&state, id).await?;

    if let Some(email) = &update.email {
        if User::email_taken(&state.db, email, Some(id)).await? {
            return Err(ApiError::Conflict("Email is already in use".to_string()));
        }
    }

    let updated_fields = update.field_names();
    let user = User::update_profile(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::Update, AuditResource::User)
            .resource(id)
            .details(json!({ "updated_fields": updated_fields }))
            .request(meta.ip_address, meta.user_agent),
    );

    Ok(ApiResponse::ok("User updated successfully", user))
}

/// Upload an avatar image
///
/// # Endpoint
///
/// ```text
/// PATCH /api/v1/users/:id/avatar
/// Authorization: Bearer <access_token>
/// Content-Type: multipart/form-data
///
/// avatar=<png|jpeg|gif|webp, at most 2 MiB>
/// ```
///
/// The file is stored under `UPLOAD_DIR` and the user's `avatar` becomes
/// `/uploads/<file>`. The previous upload, if any, is removed.
///
/// # Errors
///
/// - `400 Bad Request`: No `avatar` field or unsupported image type
/// - `403 Forbidden`: Non-admin updating someone else
/// - `404 Not Found`: No such user
/// - `413 Payload Too Large`: File over 2 MiB
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    AppPath(id): AppPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<User>> {
    authorization::can_update_user(&auth, id)?;

    let mut multipart = multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let existing = find_user(&state, id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("avatar") {
            continue;
        }

        let extension = field
            .content_type()
            .and_then(avatar_extension)
            .ok_or_else(|| {
                ApiError::invalid_field("avatar", "Avatar must be a PNG, JPEG, GIF or WebP image")
            })?;
        let bytes = field.bytes().await?;
        upload = Some((extension, bytes));
        break;
    }

    let (extension, bytes) =
        upload.ok_or_else(|| ApiError::invalid_field("avatar", "Avatar file is required"))?;

    if bytes.is_empty() {
        return Err(ApiError::invalid_field("avatar", "Avatar file is empty"));
    }
    if bytes.len() > AVATAR_MAX_BYTES {
        return Err(ApiError::PayloadTooLarge("Avatar must be at most 2 MiB".to_string()));
    }

    let upload_dir = Path::new(&state.config.api.upload_dir);
    let file_name = format!("avatar-{}-{}.{}", id, Uuid::new_v4(), extension);

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to create upload directory: {}", e)))?;
    tokio::fs::write(upload_dir.join(&file_name), &bytes)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to store avatar: {}", e)))?;

    let avatar_url = format!("{}{}", UPLOADS_URL_PREFIX, file_name);
    let user = User::update_avatar(&state.db, id, &avatar_url)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if let Some(previous) = existing
        .avatar
        .as_deref()
        .and_then(|path| path.strip_prefix(UPLOADS_URL_PREFIX))
        .filter(|name| !name.contains('/') && !name.contains(".."))
    {
        if let Err(e) = tokio::fs::remove_file(upload_dir.join(previous)).await {
            tracing::debug!(error = %e, file = previous, "Could not remove previous avatar");
        }
    }

    tracing::info!(user_id = %id, size = bytes.len(), "Avatar updated");

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::Update, AuditResource::User)
            .resource(id)
            .details(json!({ "updated_fields": ["avatar"] }))
            .request(meta.ip_address, meta.user_agent),
    );

    Ok(ApiResponse::ok("Avatar updated successfully", user))
}

/// Change a user's role
///
/// # Endpoint
///
/// ```text
/// PATCH /api/v1/users/:id/role
/// Authorization: Bearer <access_token>
///
/// { "role": "manager" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unknown role
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: No such user
pub async fn update_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateRoleRequest>,
) -> ApiResult<ApiResponse<User>> {
    authorization::require_admin(&auth)?;

    let existing = find_user(&state, id).await?;
    let user = User::update_role(&state.db, id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, from = %existing.role, to = %user.role, "User role changed");

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::Update, AuditResource::User)
            .resource(id)
            .details(json!({ "old_role": existing.role, "new_role": user.role }))
            .request(meta.ip_address, meta.user_agent),
    );

    Ok(ApiResponse::ok("User role updated successfully", user))
}

/// Activate or deactivate an account
///
/// Deactivation revokes the refresh token; the account's access token stops
/// working on its next request.
///
/// # Errors
///
/// - `400 Bad Request`: Admin deactivating their own account
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: No such user
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateStatusRequest>,
) -> ApiResult<ApiResponse<User>> {
    authorization::require_admin(&auth)?;

    if id == auth.user_id && !req.is_active {
        return Err(ApiError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let user = User::set_active(&state.db, id, req.is_active)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let action = if req.is_active { "activate" } else { "deactivate" };
    tracing::info!(user_id = %id, action, "User status changed");

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::Update, AuditResource::User)
            .resource(id)
            .details(json!({ "action": action }))
            .request(meta.ip_address, meta.user_agent),
    );

    let message = if req.is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    Ok(ApiResponse::ok(message, user))
}

/// A user's audit trail, newest first
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/users/:id/activity?page=1&limit=10
/// Authorization: Bearer <access_token>
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: A plain user asking for someone else
/// - `404 Not Found`: No such user
pub async fn user_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
    AppQuery(query): AppQuery<PageQuery>,
) -> ApiResult<ApiResponse<ActivityResponse>> {
    authorization::can_view_user(&auth, id)?;

    let page = page_request(query.page, query.limit)?;
    find_user(&state, id).await?;

    let (activities, total) = AuditLog::list_by_user(&state.db, id, page).await?;

    Ok(ApiResponse::ok(
        "User activity retrieved successfully",
        ActivityResponse {
            activities,
            pagination: Pagination::new(page, total),
        },
    ))
}

async fn find_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// File extension for an accepted avatar MIME type
fn avatar_extension(content_type: &str) -> Option<&'static str> {
    match content_type.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
