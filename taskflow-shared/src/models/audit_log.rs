/// Audit trail of user actions
///
/// Recording is best-effort: [`AuditLog::record`] never returns an error.
/// A failed insert is logged and swallowed so the operation being audited is
/// never affected.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_logs (
///     id UUID PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id),
///     action audit_action NOT NULL,
///     resource_type audit_resource NOT NULL,
///     resource_id UUID,
///     details JSONB NOT NULL DEFAULT '{}',
///     ip_address TEXT,
///     user_agent TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use crate::pagination::PageRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_action", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    StatusChange,
    Assign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_resource")]
pub enum AuditResource {
    Task,
    User,
    Auth,
}

/// One audit entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: AuditAction,
    pub resource_type: AuditResource,
    pub resource_id: Option<Uuid>,
    pub details: JsonValue,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,

    /// When the action happened
    pub created_at: DateTime<Utc>,
}

/// Input for recording an entry
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub user_id: Uuid,
    pub action: AuditAction,
    pub resource_type: AuditResource,
    pub resource_id: Option<Uuid>,
    pub details: JsonValue,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditLog {
    pub fn new(user_id: Uuid, action: AuditAction, resource_type: AuditResource) -> Self {
        Self {
            user_id,
            action,
            resource_type,
            resource_id: None,
            details: JsonValue::Object(Default::default()),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn resource(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }

    pub fn request(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

impl AuditLog {
    /// Inserts an entry, swallowing any failure
    ///
    /// # Returns
    ///
    /// The stored entry, or `None` if the insert failed (the failure is logged
    /// at `warn`).
    pub async fn record(pool: &PgPool, entry: NewAuditLog) -> Option<Self> {
        let action = entry.action;
        let result = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource_type, resource_id,
                                    details, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, action, resource_type, resource_id, details,
                      ip_address, user_agent, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource_type)
        .bind(entry.resource_id)
        .bind(entry.details)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .fetch_one(pool)
        .await;

        match result {
            Ok(log) => Some(log),
            Err(e) => {
                tracing::warn!(error = %e, action = ?action, "Failed to record audit log");
                None
            }
        }
    }

    /// A user's activity, newest first
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_logs WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        let logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, resource_type, resource_id, details,
                   ip_address, user_agent, created_at
            FROM audit_logs
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok((logs, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_labels() {
        assert_eq!(serde_json::to_string(&AuditAction::StatusChange).unwrap(), "\"STATUS_CHANGE\"");
        assert_eq!(serde_json::to_string(&AuditAction::Login).unwrap(), "\"LOGIN\"");
        assert_eq!(serde_json::to_string(&AuditResource::Task).unwrap(), "\"Task\"");
    }

    #[test]
    fn test_builder() {
        let user_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let entry = NewAuditLog::new(user_id, AuditAction::Delete, AuditResource::Task)
            .resource(task_id)
            .details(json!({ "title": "Old task" }))
            .request(Some("10.0.0.1".to_string()), None);

        assert_eq!(entry.user_id, user_id);
        assert_eq!(entry.resource_id, Some(task_id));
        assert_eq!(entry.details["title"], "Old task");
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(entry.user_agent.is_none());
    }

    #[test]
    fn test_default_details_is_empty_object() {
        let entry = NewAuditLog::new(Uuid::new_v4(), AuditAction::Logout, AuditResource::Auth);
        assert_eq!(entry.details, json!({}));
        assert!(entry.resource_id.is_none());
    }

    #[tokio::test]
    async fn test_record_swallows_database_errors() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgresql://nobody@127.0.0.1:1/taskflow_unreachable")
            .unwrap();

        let entry = NewAuditLog::new(Uuid::new_v4(), AuditAction::Login, AuditResource::Auth);
        assert!(AuditLog::record(&pool, entry).await.is_none());
    }
}
