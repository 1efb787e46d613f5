/// Database models for TaskFlow
///
/// - `user`: accounts, roles and departments
/// - `task`: tasks with soft delete, filtering, statistics and reminder queries
/// - `audit_log`: best-effort audit trail
///
/// Each model exposes static async methods taking a `&PgPool`.

pub mod audit_log;
pub mod task;
pub mod user;
