/// Router tests that need no database
///
/// The app runs over a lazy pool pointed at a closed port, so anything that
/// reaches Postgres fails fast. These cover routing, the auth gate, request
/// validation and response envelopes.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{offline_app, send};
use serde_json::json;
use taskflow_shared::auth::jwt::{create_token, AccessClaims, TokenSubject};
use taskflow_shared::models::user::Role;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_health_reports_disconnected_database() {
    let (app, _) = offline_app();

    for uri in ["/health", "/api/v1/health"] {
        let (status, body) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "TaskFlow API is running");
        assert_eq!(body["database"], "disconnected");
        assert!(body["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (app, _) = offline_app();

    let (status, body) = send(&app, "GET", "/api/v1/projects", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let (app, _) = offline_app();

    for (method, uri) in [
        ("GET", "/api/v1/tasks"),
        ("GET", "/api/v1/tasks/stats"),
        ("GET", "/api/v1/users"),
        ("GET", "/api/v1/auth/me"),
        ("POST", "/api/v1/auth/logout"),
    ] {
        let (status, body) = send(&app, method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_malformed_authorization_header_is_bad_request() {
    let (app, _) = offline_app();

    let (status, body) = send(&app, "GET", "/api/v1/tasks", Some("Token abc"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_invalid_or_foreign_tokens_are_rejected() {
    let (app, config) = offline_app();

    let (status, _) = send(&app, "GET", "/api/v1/tasks", Some("Bearer not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let subject = TokenSubject {
        user_id: Uuid::new_v4(),
        email: "jane@example.com".to_string(),
        role: Role::Admin,
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
    };
    let claims = AccessClaims::new(&subject, config.jwt.access_ttl);

    // Signed with the refresh secret instead of the access secret
    let forged = create_token(&claims, &config.jwt.refresh_secret).unwrap();
    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/tasks",
        Some(&format!("Bearer {}", forged)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_register_validation_runs_before_database() {
    let (app, _) = offline_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": "not-an-email",
            "password": "Secret123",
            "first_name": "",
            "last_name": "Doe"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"first_name"));
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let (app, _) = offline_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": "jane@example.com",
            "password": "password",
            "first_name": "Jane",
            "last_name": "Doe"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _) = offline_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("content-type", "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_json_body_is_rejected() {
    let (app, _) = offline_app();

    let padding = "x".repeat(64 * 1024);
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "jane@example.com", "password": padding })),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload_too_large");
}

#[tokio::test]
async fn test_security_and_rate_limit_headers() {
    let (app, _) = offline_app();

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let headers = response.headers();

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
    assert_eq!(headers["x-ratelimit-limit"], "500");
    assert!(headers.contains_key("x-ratelimit-remaining"));
}

#[tokio::test]
async fn test_auth_limiter_blocks_repeated_failures() {
    let (app, _) = offline_app();
    let bad_login = json!({ "email": "bad", "password": "x" });

    for _ in 0..20 {
        let (status, _) = send(&app, "POST", "/api/v1/auth/login", None, Some(bad_login.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, body) = send(&app, "POST", "/api/v1/auth/login", None, Some(bad_login)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limit_exceeded");
}
