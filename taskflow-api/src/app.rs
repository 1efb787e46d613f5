/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use taskflow_api::{app::AppState, config::Config};
/// use taskflow_shared::notify::build_mailer;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let mailer = build_mailer(&config.email)?;
/// let state = AppState::new(pool, config, mailer);
/// let app = taskflow_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        auth::jwt_auth_layer,
        rate_limit::{rate_limit_layer, RateLimitRule, RateLimiter},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Router,
};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;
use taskflow_shared::models::audit_log::{AuditLog, NewAuditLog};
use taskflow_shared::notify::{templates::Templates, EmailMessage, Mailer};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Limit for JSON request bodies
pub const JSON_BODY_LIMIT: usize = 16 * 1024;

/// Largest accepted avatar file
pub const AVATAR_MAX_BYTES: usize = 2 * 1024 * 1024;

/// Limit for the whole avatar request, leaving room for multipart framing
pub const AVATAR_BODY_LIMIT: usize = AVATAR_MAX_BYTES + 64 * 1024;

/// One limiter per rule
#[derive(Debug, Clone)]
pub struct RateLimiters {
    pub api: Arc<RateLimiter>,
    pub auth: Arc<RateLimiter>,
    pub create_task: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn in_memory() -> Self {
        Self {
            api: Arc::new(RateLimiter::in_memory(RateLimitRule::api())),
            auth: Arc::new(RateLimiter::in_memory(RateLimitRule::auth())),
            create_task: Arc::new(RateLimiter::in_memory(RateLimitRule::create_task())),
        }
    }

    pub fn redis(connection: ConnectionManager) -> Self {
        Self {
            api: Arc::new(RateLimiter::redis(RateLimitRule::api(), connection.clone())),
            auth: Arc::new(RateLimiter::redis(RateLimitRule::auth(), connection.clone())),
            create_task: Arc::new(RateLimiter::redis(RateLimitRule::create_task(), connection)),
        }
    }
}

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Outgoing email transport
    pub mailer: Arc<dyn Mailer>,

    /// Notification email templates
    pub templates: Arc<Templates>,

    pub rate_limiters: RateLimiters,
}

impl AppState {
    /// Creates new application state with in-process rate limiting
    pub fn new(db: PgPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let templates = Templates::new(config.email.frontend_url.clone());
        Self {
            db,
            config: Arc::new(config),
            mailer,
            templates: Arc::new(templates),
            rate_limiters: RateLimiters::in_memory(),
        }
    }

    pub fn with_rate_limiters(mut self, rate_limiters: RateLimiters) -> Self {
        self.rate_limiters = rate_limiters;
        self
    }

    /// Records an audit entry in the background
    pub fn audit(&self, entry: NewAuditLog) {
        let db = self.db.clone();
        tokio::spawn(async move {
            AuditLog::record(&db, entry).await;
        });
    }

    /// Sends an email in the background; failures are logged only
    pub fn notify(&self, message: EmailMessage) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let to = message.to.clone();
            let subject = message.subject.clone();
            if let Err(e) = mailer.send(message).await {
                tracing::error!(error = %e, to = %to, subject = %subject, "Failed to send notification email");
            }
        });
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                      # Health check (public)
/// ├── /uploads/*                   # Uploaded avatars (public, read-only)
/// └── /api/v1/                     # API v1 (general rate limit)
///     ├── GET  /health
///     ├── /auth/                   # Auth rate limit (failures only)
///     │   ├── POST /register
///     │   ├── POST /login
///     │   ├── POST /refresh
///     │   ├── POST /logout         # authenticated
///     │   ├── GET  /me             # authenticated
///     │   └── PUT  /change-password  # authenticated
///     ├── /tasks/                  # authenticated
///     │   ├── GET    /
///     │   ├── POST   /             # task creation rate limit
///     │   ├── GET    /stats
///     │   ├── GET    /:id
///     │   ├── PUT    /:id
///     │   ├── PATCH  /:id/status
///     │   └── DELETE /:id
///     └── /users/                  # authenticated
///         ├── GET       /
///         ├── GET       /:id
///         ├── PUT|PATCH /:id
///         ├── PATCH     /:id/avatar
///         ├── PATCH     /:id/role
///         ├── PATCH     /:id/status
///         └── GET       /:id/activity
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Compression
/// 4. Logging (tower-http TraceLayer)
/// 5. Body limit (16 KiB; 2 MiB for avatars)
/// 6. Rate limiting and authentication (per route group)
pub fn build_router(state: AppState) -> Router {
    let jwt = || from_fn_with_state(state.clone(), jwt_auth_layer);
    let limiters = &state.rate_limiters;

    // Auth routes: public ones plus a few that need a session
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .merge(
            Router::new()
                .route("/logout", post(routes::auth::logout))
                .route("/me", get(routes::auth::me))
                .route("/change-password", put(routes::auth::change_password))
                .route_layer(jwt()),
        )
        .layer(from_fn_with_state(limiters.auth.clone(), rate_limit_layer));

    let task_routes = Router::new()
        .route(
            "/",
            get(routes::tasks::list_tasks).merge(
                post(routes::tasks::create_task)
                    .layer(from_fn_with_state(limiters.create_task.clone(), rate_limit_layer)),
            ),
        )
        .route("/stats", get(routes::tasks::task_stats))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/status", patch(routes::tasks::update_task_status))
        .route_layer(jwt());

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users))
        .route(
            "/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .patch(routes::users::update_user),
        )
        .route(
            "/:id/avatar",
            patch(routes::users::upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
        .route("/:id/role", patch(routes::users::update_role))
        .route("/:id/status", patch(routes::users::update_status))
        .route("/:id/activity", get(routes::users::user_activity))
        .route_layer(jwt());

    // Build complete v1 API
    let v1_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/auth", auth_routes)
        .nest("/tasks", task_routes)
        .nest("/users", user_routes)
        .layer(from_fn_with_state(limiters.api.clone(), rate_limit_layer));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let uploads = ServeDir::new(&state.config.api.upload_dir);
    let production = state.config.api.production;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", v1_routes)
        .nest_service("/uploads", uploads)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
