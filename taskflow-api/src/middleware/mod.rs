/// Middleware modules for the API server
///
/// - `auth`: Bearer token authentication
/// - `rate_limit`: Per-IP fixed-window limits
/// - `security`: Security headers

pub mod auth;
pub mod rate_limit;
pub mod security;
