//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Test configuration and app construction
//! - Test database setup and cleanup
//! - Test user creation and token issuing
//! - API client helpers

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use taskflow_api::app::{build_router, AppState};
use taskflow_api::config::{ApiConfig, Config};
use taskflow_shared::auth::jwt::{issue_token_pair, hash_refresh_token, JwtConfig, TokenSubject};
use taskflow_shared::auth::password;
use taskflow_shared::db::pool::DatabaseConfig;
use taskflow_shared::models::user::{CreateUser, Department, Role, User};
use taskflow_shared::notify::{EmailConfig, LogMailer, Mailer};
use tower::ServiceExt;
use uuid::Uuid;

/// Password given to every seeded user
pub const TEST_PASSWORD: &str = "Password123";

/// Configuration that needs no environment
pub fn test_config(database_url: &str) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            upload_dir: std::env::temp_dir()
                .join(format!("taskflow-test-uploads-{}", Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
            ..Default::default()
        },
        database: DatabaseConfig {
            url: database_url.to_string(),
            ..Default::default()
        },
        jwt: JwtConfig::new(
            "test-access-secret-at-least-32-bytes-long",
            "test-refresh-secret-at-least-32-bytes-long",
        ),
        redis_url: None,
        email: EmailConfig::default(),
    }
}

fn log_mailer() -> Arc<dyn Mailer> {
    Arc::new(LogMailer::new("\"TaskFlow\" <noreply@taskflow.test>"))
}

/// Router over a pool that never connects, for tests that must not reach the database
pub fn offline_app() -> (axum::Router, Config) {
    let config = test_config("postgresql://nobody@127.0.0.1:1/taskflow_unreachable");
    let db = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy(&config.database.url)
        .expect("lazy pool");

    let app = build_router(AppState::new(db, config.clone(), log_mailer()));
    (app, config)
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
    pub admin: User,
    pub manager: User,
    pub user: User,
    pub other_user: User,
    created_users: std::sync::Mutex<Vec<Uuid>>,
}

impl TestContext {
    /// Connects to `DATABASE_URL`, migrates, and seeds one user per role
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL")?;
        let config = test_config(&database_url);

        let db = PgPool::connect(&database_url).await?;
        taskflow_shared::db::migrations::run_migrations(&db).await?;

        let admin = seed_user(&db, Role::Admin).await?;
        let manager = seed_user(&db, Role::Manager).await?;
        let user = seed_user(&db, Role::User).await?;
        let other_user = seed_user(&db, Role::User).await?;

        let app = build_router(AppState::new(db.clone(), config.clone(), log_mailer()));

        Ok(TestContext {
            created_users: std::sync::Mutex::new(vec![admin.id, manager.id, user.id, other_user.id]),
            db,
            app,
            config,
            admin,
            manager,
            user,
            other_user,
        })
    }

    /// Bearer header for `user`, with a stored refresh token
    pub async fn auth_header(&self, user: &User) -> String {
        let tokens = issue_token_pair(&TokenSubject::from(user), &self.config.jwt).expect("tokens");
        User::set_refresh_token(&self.db, user.id, Some(&hash_refresh_token(&tokens.refresh_token)))
            .await
            .expect("store refresh token");
        format!("Bearer {}", tokens.access_token)
    }

    /// Remembers a user created through the API so cleanup removes it
    pub fn track_user(&self, id: Uuid) {
        self.created_users.lock().expect("lock").push(id);
    }

    /// Sends a JSON request and returns the status and parsed body
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send(&self.app, method, uri, auth, body).await
    }

    /// Uploads `data` as the `field` part of a multipart request
    pub async fn upload(
        &self,
        uri: &str,
        auth: &str,
        field: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let (header, body) = multipart_file(field, "upload.bin", content_type, data);
        let (status, _, bytes) = send_raw(&self.app, "PATCH", uri, Some(auth), Some(&header), body).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Cleans up test data
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        let ids = self.created_users.lock().expect("lock").clone();

        sqlx::query("DELETE FROM audit_logs WHERE user_id = ANY($1)")
            .bind(&ids)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE created_by = ANY($1) OR assigned_to = ANY($1)")
            .bind(&ids)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.db)
            .await?;

        let _ = tokio::fs::remove_dir_all(&self.config.api.upload_dir).await;
        Ok(())
    }
}

async fn seed_user(db: &PgPool, role: Role) -> anyhow::Result<User> {
    let user = User::create(
        db,
        CreateUser {
            email: format!("test-{}@example.com", Uuid::new_v4()),
            password_hash: password::hash_password(TEST_PASSWORD)?,
            first_name: "Test".to_string(),
            last_name: format!("{:?}", role),
            role,
            department: Department::Engineering,
            job_title: None,
        },
    )
    .await?;

    Ok(user)
}

/// Sends a request through the router
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.10");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Multipart body with one file part, plus its `content-type` header value
pub fn multipart_file(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = format!("taskflow-{}", Uuid::new_v4().simple());
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}

/// Sends a raw body and returns the status, headers and body bytes
pub async fn send_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    content_type: Option<&str>,
    body: Vec<u8>,
) -> (StatusCode, axum::http::HeaderMap, axum::body::Bytes) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.10");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body)).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");

    (status, headers, bytes)
}

/// Helper to wait for condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout_secs: u64) -> anyhow::Result<()>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);

    loop {
        if condition().await {
            return Ok(());
        }

        if start.elapsed() > timeout {
            anyhow::bail!("Condition not met within {} seconds", timeout_secs);
        }

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}
