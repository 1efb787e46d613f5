/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login, refresh, logout, me, change password)
/// - `tasks`: Task CRUD, status changes and statistics
/// - `users`: User administration, profiles, avatars and activity

pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

use crate::error::{ApiError, ApiResult};
use taskflow_shared::pagination::PageRequest;

/// Validates `page`/`limit` query values
pub(crate) fn page_request(page: Option<u32>, limit: Option<u32>) -> ApiResult<PageRequest> {
    PageRequest::new(page, limit).map_err(|message| {
        let field = if message.starts_with("page") { "page" } else { "limit" };
        ApiError::invalid_field(field, message)
    })
}

/// Rejects strings that are empty once trimmed
pub(crate) fn require_non_blank(field: &str, value: Option<&str>, message: &str) -> ApiResult<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ApiError::invalid_field(field, message)),
        _ => Ok(()),
    }
}
