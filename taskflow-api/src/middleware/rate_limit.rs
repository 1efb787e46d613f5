/// Per-IP rate limiting
///
/// Fixed-window rate limiting keyed by client IP. State lives in-process by
/// default, or in Redis when `REDIS_URL` is configured so limits hold across
/// several API instances.
///
/// # Limits
///
/// - **API**: 500 requests per 15 minutes
/// - **Auth**: 20 failed requests per 15 minutes (successful requests are free)
/// - **Task creation**: 100 requests per hour
///
/// # Algorithm
///
/// Fixed windows:
/// - A client's window opens with its first counted request
/// - Each counted request increments the window's counter
/// - Requests are blocked once the counter reaches the limit, until the
///   window ends
///
/// # Storage
///
/// Redis keys: `ratelimit:{rule}:{ip}`, TTL of one window.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per window
/// - `X-RateLimit-Remaining`: Requests left in the window
/// - `Retry-After`: Seconds until the window resets (429 responses only)
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskflow_api::middleware::rate_limit::{rate_limit_layer, RateLimitRule, RateLimiter};
/// use axum::{middleware, Router};
///
/// let limiter = Arc::new(RateLimiter::in_memory(RateLimitRule::api()));
/// let app: Router = Router::new()
///     .route("/api/foo", axum::routing::get(|| async { "ok" }))
///     .layer(middleware::from_fn_with_state(limiter, rate_limit_layer));
/// ```

use crate::error::ApiError;
use crate::extract::client_ip;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory counters kept before expired ones are evicted
const MAX_MEMORY_COUNTERS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Unexpected rate limit script result")]
    BadScriptResult,
}

/// One named limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitRule {
    /// Key prefix, e.g. `api`
    pub name: &'static str,

    /// Requests allowed per window
    pub max_requests: u32,

    pub window: Duration,

    /// Only count responses that are not 2xx
    pub count_failures_only: bool,
}

impl RateLimitRule {
    pub fn api() -> Self {
        Self {
            name: "api",
            max_requests: 500,
            window: Duration::from_secs(15 * 60),
            count_failures_only: false,
        }
    }

    /// Brute-force protection for login and registration
    pub fn auth() -> Self {
        Self {
            name: "auth",
            max_requests: 20,
            window: Duration::from_secs(15 * 60),
            count_failures_only: true,
        }
    }

    pub fn create_task() -> Self {
        Self {
            name: "create_task",
            max_requests: 100,
            window: Duration::from_secs(60 * 60),
            count_failures_only: false,
        }
    }
}

/// Counter for the current fixed window
#[derive(Debug, Clone)]
struct WindowCounter {
    /// Counted requests in this window
    count: u32,

    /// Window start (Unix seconds)
    window_start: f64,
}

impl WindowCounter {
    fn new(now: f64) -> Self {
        WindowCounter {
            count: 0,
            window_start: now,
        }
    }

    fn expired(&self, window: f64, now: f64) -> bool {
        now - self.window_start >= window
    }

    /// Counts one request (if `consume`) against `rule`
    ///
    /// An empty or ended window restarts at `now`.
    fn hit(&mut self, rule: &RateLimitRule, now: f64, consume: bool) -> RateLimitResult {
        let window = rule.window.as_secs_f64();
        if self.count == 0 || self.expired(window, now) {
            *self = WindowCounter::new(now);
        }

        let ok = self.count < rule.max_requests;
        if ok && consume {
            self.count += 1;
        }

        RateLimitResult {
            ok,
            remaining: rule.max_requests.saturating_sub(self.count),
            retry_after: if ok {
                0
            } else {
                (self.window_start + window - now).ceil().max(1.0) as u64
            },
        }
    }
}

/// Result of rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Requests left in the current window
    pub remaining: u32,

    /// Seconds until the window resets (0 when allowed)
    pub retry_after: u64,
}

enum Backend {
    Memory(Mutex<HashMap<String, WindowCounter>>),
    Redis(ConnectionManager),
}

/// A rule plus the store its counters live in
pub struct RateLimiter {
    rule: RateLimitRule,
    backend: Backend,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            Backend::Memory(_) => "memory",
            Backend::Redis(_) => "redis",
        };
        f.debug_struct("RateLimiter")
            .field("rule", &self.rule)
            .field("backend", &backend)
            .finish()
    }
}

impl RateLimiter {
    pub fn in_memory(rule: RateLimitRule) -> Self {
        Self {
            rule,
            backend: Backend::Memory(Mutex::new(HashMap::new())),
        }
    }

    pub fn redis(rule: RateLimitRule, connection: ConnectionManager) -> Self {
        Self {
            rule,
            backend: Backend::Redis(connection),
        }
    }

    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }

    /// Checks the caller's window and, if `consume`, counts one request
    ///
    /// With `consume = false` this only reports whether a request would pass.
    pub async fn check(&self, client: &str, consume: bool) -> Result<RateLimitResult, RateLimitError> {
        let key = format!("ratelimit:{}:{}", self.rule.name, client);

        match &self.backend {
            Backend::Memory(counters) => Ok(self.check_memory(counters, key, unix_now(), consume)),
            Backend::Redis(connection) => self.check_redis(connection.clone(), &key, consume).await,
        }
    }

    fn check_memory(
        &self,
        counters: &Mutex<HashMap<String, WindowCounter>>,
        key: String,
        now: f64,
        consume: bool,
    ) -> RateLimitResult {
        let rule = self.rule;
        let mut counters = counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if counters.len() >= MAX_MEMORY_COUNTERS {
            let window = rule.window.as_secs_f64();
            counters.retain(|_, counter| !counter.expired(window, now));
        }

        counters
            .entry(key)
            .or_insert_with(|| WindowCounter::new(now))
            .hit(&rule, now, consume)
    }

    /// Fixed window in Redis
    ///
    /// The first `INCR` of a window sets its expiry, so the key vanishes when
    /// the window ends. Blocked requests are not counted.
    async fn check_redis(
        &self,
        mut connection: ConnectionManager,
        key: &str,
        consume: bool,
    ) -> Result<RateLimitResult, RateLimitError> {
        let script = redis::Script::new(
            r#"
            local key = KEYS[1]
            local limit = tonumber(ARGV[1])
            local window_ms = tonumber(ARGV[2])
            local consume = tonumber(ARGV[3])

            local count = tonumber(redis.call('GET', key) or '0')
            local allowed = 0
            if count < limit then
                allowed = 1
                if consume == 1 then
                    count = redis.call('INCR', key)
                    if count == 1 then
                        redis.call('PEXPIRE', key, window_ms)
                    end
                end
            end

            local ttl = redis.call('PTTL', key)
            if ttl < 0 then
                ttl = window_ms
            end

            return {allowed, math.max(0, limit - count), math.ceil(ttl / 1000)}
            "#,
        );

        let result: Vec<i64> = script
            .key(key)
            .arg(self.rule.max_requests)
            .arg(self.rule.window.as_millis() as u64)
            .arg(if consume { 1 } else { 0 })
            .invoke_async(&mut connection)
            .await?;

        match result.as_slice() {
            [ok, remaining, reset] => {
                let ok = *ok == 1;
                Ok(RateLimitResult {
                    ok,
                    remaining: (*remaining).max(0) as u32,
                    retry_after: if ok { 0 } else { (*reset).max(1) as u64 },
                })
            }
            _ => Err(RateLimitError::BadScriptResult),
        }
    }
}

/// Rate limiting middleware
///
/// Store failures are logged and the request is let through.
///
/// # Errors
///
/// - 429 Too Many Requests: Rate limit exceeded
pub async fn rate_limit_layer(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let rule = limiter.rule();
    let client = client_ip(request.headers(), request.extensions()).unwrap_or_else(|| "unknown".to_string());

    let result = match limiter.check(&client, !rule.count_failures_only).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, limiter = rule.name, "Rate limit check failed");
            return Ok(next.run(request).await);
        }
    };

    if !result.ok {
        tracing::warn!(client = %client, limiter = rule.name, "Rate limit exceeded");
        return Err(create_rate_limit_error(result));
    }

    let mut response = next.run(request).await;

    let mut remaining = result.remaining;
    if rule.count_failures_only && !response.status().is_success() {
        match limiter.check(&client, true).await {
            Ok(after) => remaining = after.remaining,
            Err(e) => tracing::error!(error = %e, limiter = rule.name, "Rate limit update failed"),
        }
    }

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(rule.max_requests));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));

    Ok(response)
}

/// Creates a rate limit exceeded error response
fn create_rate_limit_error(result: RateLimitResult) -> ApiError {
    ApiError::RateLimitExceeded {
        retry_after: result.retry_after,
        message: format!(
            "Too many requests. Try again in {} seconds",
            result.retry_after
        ),
    }
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn tiny_rule(count_failures_only: bool) -> RateLimitRule {
        RateLimitRule {
            name: "test",
            max_requests: 2,
            window: Duration::from_secs(3600),
            count_failures_only,
        }
    }

    #[test]
    fn test_rules() {
        let api = RateLimitRule::api();
        assert_eq!(api.max_requests, 500);
        assert_eq!(api.window, Duration::from_secs(900));

        let auth = RateLimitRule::auth();
        assert_eq!(auth.max_requests, 20);
        assert!(auth.count_failures_only);

        let create = RateLimitRule::create_task();
        assert_eq!(create.max_requests, 100);
        assert_eq!(create.window, Duration::from_secs(3600));
    }

    #[test]
    fn test_auth_window_allows_twenty_failures() {
        let rule = RateLimitRule::auth();
        let mut counter = WindowCounter::new(0.0);

        for _ in 0..20 {
            assert!(counter.hit(&rule, 0.0, true).ok);
        }

        // Nothing comes back until the 15 minutes are up
        let blocked = counter.hit(&rule, 899.0, true);
        assert!(!blocked.ok);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.retry_after, 1);
        assert_eq!(counter.count, 20);

        let fresh = counter.hit(&rule, 900.0, true);
        assert!(fresh.ok);
        assert_eq!(fresh.remaining, 19);
    }

    #[test]
    fn test_window_retry_after_counts_down() {
        let rule = tiny_rule(false);
        let mut counter = WindowCounter::new(100.0);
        counter.hit(&rule, 100.0, true);
        counter.hit(&rule, 100.0, true);

        assert_eq!(counter.hit(&rule, 100.0, true).retry_after, 3600);
        assert_eq!(counter.hit(&rule, 3099.5, true).retry_after, 601);
    }

    #[test]
    fn test_peek_reports_without_counting() {
        let rule = tiny_rule(true);
        let mut counter = WindowCounter::new(0.0);

        assert!(counter.hit(&rule, 0.0, false).ok);
        assert_eq!(counter.count, 0);

        counter.hit(&rule, 1.0, true);
        counter.hit(&rule, 2.0, true);
        assert!(!counter.hit(&rule, 3.0, false).ok);
    }

    #[tokio::test]
    async fn test_memory_limiter_blocks_after_capacity() {
        let limiter = RateLimiter::in_memory(tiny_rule(false));

        assert!(limiter.check("1.2.3.4", true).await.unwrap().ok);
        assert!(limiter.check("1.2.3.4", true).await.unwrap().ok);

        let blocked = limiter.check("1.2.3.4", true).await.unwrap();
        assert!(!blocked.ok);
        assert!(blocked.retry_after > 0);

        // Other clients have their own window
        assert!(limiter.check("5.6.7.8", true).await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let limiter = RateLimiter::in_memory(tiny_rule(true));
        for _ in 0..5 {
            assert!(limiter.check("1.2.3.4", false).await.unwrap().ok);
        }
    }

    async fn send(app: &Router) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-forwarded-for", "198.51.100.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_layer_returns_429() {
        let limiter = Arc::new(RateLimiter::in_memory(tiny_rule(false)));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_layer));

        assert_eq!(send(&app).await.status(), StatusCode::OK);
        let second = send(&app).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers().get("X-RateLimit-Remaining").unwrap(), "0");

        let third = send(&app).await;
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(third.headers().get("Retry-After").is_some());
    }

    #[tokio::test]
    async fn test_failures_only_ignores_success() {
        let limiter = Arc::new(RateLimiter::in_memory(tiny_rule(true)));
        let ok_app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter.clone(), rate_limit_layer));
        let failing_app = Router::new()
            .route("/", get(|| async { StatusCode::UNAUTHORIZED }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_layer));

        for _ in 0..5 {
            assert_eq!(send(&ok_app).await.status(), StatusCode::OK);
        }

        assert_eq!(send(&failing_app).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(send(&failing_app).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(send(&failing_app).await.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
