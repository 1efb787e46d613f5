/// Authentication endpoints
///
/// This module provides user authentication endpoints:
/// - Registration
/// - Login and logout
/// - Token refresh
/// - Current user and password change
///
/// # Endpoints
///
/// - `POST /api/v1/auth/register` - Register new user
/// - `POST /api/v1/auth/login` - Login and get tokens
/// - `POST /api/v1/auth/refresh` - Rotate tokens
/// - `POST /api/v1/auth/logout` - Revoke the refresh token
/// - `GET /api/v1/auth/me` - Current user
/// - `PUT /api/v1/auth/change-password` - Change password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{AppJson, RequestMeta, ValidatedJson},
    response::ApiResponse,
};
use axum::extract::{Extension, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskflow_shared::{
    auth::{
        jwt::{self, JwtError, TokenPair, TokenSubject},
        middleware::AuthContext,
        password,
    },
    models::{
        audit_log::{AuditAction, AuditResource, NewAuditLog},
        user::{CreateUser, Department, Role, User},
    },
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    /// Checked separately for strength
    pub password: String,

    #[validate(length(min = 1, max = 50, message = "First name must be between 1 and 50 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 50, message = "Last name must be between 1 and 50 characters"))]
    pub last_name: String,

    pub department: Option<Department>,

    #[validate(length(max = 100, message = "Job title cannot exceed 100 characters"))]
    pub job_title: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Change password request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    pub new_password: String,
}

/// Register and login response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Register a new user
///
/// Self-registration always creates a `user` role account.
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "jane@example.com",
///   "password": "Secret123",
///   "first_name": "Jane",
///   "last_name": "Doe",
///   "department": "Engineering"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with `{ user, access_token, refresh_token }` in `data`.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or weak password
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid_field("password", message))?;

    if User::email_taken(&state.db, &req.email, None).await? {
        return Err(ApiError::Conflict("User with this email already exists".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            role: Role::User,
            department: req.department.unwrap_or_default(),
            job_title: req.job_title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        },
    )
    .await?;

    let tokens = start_session(&state, &user).await?;

    tracing::info!(user_id = %user.id, "User registered");

    state.audit(
        NewAuditLog::new(user.id, AuditAction::Create, AuditResource::User)
            .resource(user.id)
            .details(json!({ "email": user.email, "role": user.role }))
            .request(meta.ip_address, meta.user_agent),
    );

    Ok(ApiResponse::created(
        "User registered successfully",
        AuthResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
    ))
}

/// Login with email and password
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "jane@example.com",
///   "password": "Secret123"
/// }
/// ```
///
/// # Response
///
/// `200 OK` with `{ user, access_token, refresh_token }` in `data`.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Invalid credentials or deactivated account
pub async fn login(
    State(state): State<AppState>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let mut user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized("Invalid email or password".to_string()));
    }

    // Account status is only revealed to callers with the right password
    if !user.is_active {
        return Err(ApiError::Unauthorized(
            "Account is deactivated. Please contact an administrator".to_string(),
        ));
    }

    User::update_last_login(&state.db, user.id).await?;
    user.last_login = Some(Utc::now());

    let tokens = start_session(&state, &user).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    state.audit(
        NewAuditLog::new(user.id, AuditAction::Login, AuditResource::Auth)
            .details(json!({ "email": user.email }))
            .request(meta.ip_address, meta.user_agent),
    );

    Ok(ApiResponse::ok(
        "Login successful",
        AuthResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
    ))
}

/// Revoke the current refresh token
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/auth/logout
/// Authorization: Bearer <access_token>
/// ```
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
) -> ApiResult<ApiResponse<()>> {
    User::set_refresh_token(&state.db, auth.user_id, None).await?;

    state.audit(
        NewAuditLog::new(auth.user_id, AuditAction::Logout, AuditResource::Auth)
            .request(meta.ip_address, meta.user_agent),
    );

    Ok(ApiResponse::message("Logout successful"))
}

/// Current user
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/auth/me
/// Authorization: Bearer <access_token>
/// ```
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok("User retrieved successfully", user))
}

/// Change the caller's password
///
/// Revokes the stored refresh token, so other sessions end once their
/// access token expires.
///
/// # Endpoint
///
/// ```text
/// PUT /api/v1/auth/change-password
/// Authorization: Bearer <access_token>
///
/// {
///   "current_password": "Secret123",
///   "new_password": "Better456"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Weak new password
/// - `401 Unauthorized`: Current password is wrong
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    password::validate_password_strength(&req.new_password)
        .map_err(|message| ApiError::invalid_field("new_password", message))?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }

    let password_hash = password::hash_password(&req.new_password)?;
    User::update_password(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");

    state.audit(
        NewAuditLog::new(user.id, AuditAction::Update, AuditResource::Auth)
            .resource(user.id)
            .details(json!({ "action": "change_password" }))
            .request(meta.ip_address, meta.user_agent),
    );

    Ok(ApiResponse::message("Password changed successfully"))
}

/// Exchange a refresh token for a new token pair
///
/// The presented token must be the most recently issued one for its user;
/// the replacement is stored in its place.
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/auth/refresh
///
/// { "refresh_token": "eyJ..." }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Token invalid, expired, superseded or the user is inactive
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> ApiResult<ApiResponse<RefreshResponse>> {
    req.validate()?;

    let claims = jwt::validate_refresh_token(&req.refresh_token, &state.config.jwt.refresh_secret)
        .map_err(|e| match e {
            JwtError::Expired => ApiError::Unauthorized("Refresh token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid refresh token".to_string()),
        })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".to_string()))?;

    let presented = jwt::hash_refresh_token(&req.refresh_token);
    let tokens = jwt::issue_token_pair(&TokenSubject::from(&user), &state.config.jwt)?;
    let replacement = jwt::hash_refresh_token(&tokens.refresh_token);

    if !User::rotate_refresh_token(&state.db, user.id, &presented, &replacement).await? {
        tracing::warn!(user_id = %user.id, "Rejected superseded refresh token");
        return Err(ApiError::Unauthorized("Invalid refresh token".to_string()));
    }

    Ok(ApiResponse::ok(
        "Token refreshed successfully",
        RefreshResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        },
    ))
}

/// Issues a token pair and stores the refresh token's hash
async fn start_session(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    let tokens = jwt::issue_token_pair(&TokenSubject::from(user), &state.config.jwt)?;
    let stored = jwt::hash_refresh_token(&tokens.refresh_token);
    User::set_refresh_token(&state.db, user.id, Some(&stored)).await?;
    Ok(tokens)
}
