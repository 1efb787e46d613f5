/// Role-based access control
///
/// Every check is a pure function of the caller's [`AuthContext`] and the
/// resource, so handlers load the resource first (404 if missing) and then
/// ask here (403 if denied).
///
/// # Rules
///
/// | Operation | admin | manager | user |
/// |---|---|---|---|
/// | view task | any | any | creator or assignee |
/// | edit / delete task | any | any | creator |
/// | change task status | any | any | creator or assignee |
/// | list users | yes | yes | no |
/// | view user / activity | any | any | self |
/// | update profile / avatar | any | self | self |
/// | change role / activation | yes | no | no |
///
/// # Example
///
/// ```
/// use taskflow_shared::auth::authorization::task_scope;
/// use taskflow_shared::auth::middleware::AuthContext;
/// use taskflow_shared::models::task::TaskScope;
/// use taskflow_shared::models::user::Role;
/// use uuid::Uuid;
///
/// let ctx = AuthContext { user_id: Uuid::new_v4(), email: "u@example.com".into(), role: Role::User };
/// assert_eq!(task_scope(&ctx), TaskScope::Participant(ctx.user_id));
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::task::{Task, TaskScope};
use crate::models::user::Role;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: Role, actual: Role },

    #[error("{0}")]
    NotAuthorized(&'static str),
}

/// Requires the caller's role to be at least `required`
pub fn require_role(auth: &AuthContext, required: Role) -> Result<(), AuthzError> {
    if !auth.role.has_permission(&required) {
        return Err(AuthzError::InsufficientRole {
            required,
            actual: auth.role,
        });
    }

    Ok(())
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, Role::Admin)
}

pub fn require_admin_or_manager(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, Role::Manager)
}

/// Which tasks the caller may list and aggregate
pub fn task_scope(auth: &AuthContext) -> TaskScope {
    if auth.is_staff() {
        TaskScope::All
    } else {
        TaskScope::Participant(auth.user_id)
    }
}

pub fn can_view_task(auth: &AuthContext, task: &Task) -> Result<(), AuthzError> {
    if auth.is_staff() || task.is_participant(auth.user_id) {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized("Not authorized to view this task"))
}

pub fn can_edit_task(auth: &AuthContext, task: &Task) -> Result<(), AuthzError> {
    if auth.is_staff() || task.created_by == auth.user_id {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized("Only the task creator can update this task"))
}

pub fn can_change_task_status(auth: &AuthContext, task: &Task) -> Result<(), AuthzError> {
    if auth.is_staff() || task.is_participant(auth.user_id) {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized("Not authorized to change the status of this task"))
}

pub fn can_delete_task(auth: &AuthContext, task: &Task) -> Result<(), AuthzError> {
    if auth.is_staff() || task.created_by == auth.user_id {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized("Only the task creator can delete this task"))
}

/// Profile and activity reads
pub fn can_view_user(auth: &AuthContext, user_id: Uuid) -> Result<(), AuthzError> {
    if auth.is_staff() || auth.user_id == user_id {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized("Not authorized to view this user"))
}

/// Profile and avatar writes
pub fn can_update_user(auth: &AuthContext, user_id: Uuid) -> Result<(), AuthzError> {
    if auth.is_admin() || auth.user_id == user_id {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized("Not authorized to update this user"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskPriority, TaskStatus};
    use chrono::Utc;

    fn ctx(role: Role) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            role,
        }
    }

    fn task(created_by: Uuid, assigned_to: Option<Uuid>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "Task".to_string(),
            description: "Description".to_string(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: now,
            created_by,
            assigned_to,
            tags: vec![],
            is_deleted: false,
            deleted_at: None,
            completed_at: None,
            due_soon_sent: false,
            overdue_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_require_role() {
        assert!(require_admin(&ctx(Role::Admin)).is_ok());
        assert!(require_admin(&ctx(Role::Manager)).is_err());
        assert!(require_admin_or_manager(&ctx(Role::Manager)).is_ok());
        assert!(require_admin_or_manager(&ctx(Role::Admin)).is_ok());

        let err = require_admin_or_manager(&ctx(Role::User)).unwrap_err();
        assert!(matches!(
            err,
            AuthzError::InsufficientRole { required: Role::Manager, actual: Role::User }
        ));
        assert!(err.to_string().contains("requires manager"));
    }

    #[test]
    fn test_task_scope() {
        assert_eq!(task_scope(&ctx(Role::Admin)), TaskScope::All);
        assert_eq!(task_scope(&ctx(Role::Manager)), TaskScope::All);

        let user = ctx(Role::User);
        assert_eq!(task_scope(&user), TaskScope::Participant(user.user_id));
    }

    #[test]
    fn test_user_task_access() {
        let creator = ctx(Role::User);
        let assignee = ctx(Role::User);
        let stranger = ctx(Role::User);
        let t = task(creator.user_id, Some(assignee.user_id));

        assert!(can_view_task(&creator, &t).is_ok());
        assert!(can_view_task(&assignee, &t).is_ok());
        assert!(can_view_task(&stranger, &t).is_err());

        assert!(can_edit_task(&creator, &t).is_ok());
        assert!(can_edit_task(&assignee, &t).is_err());
        assert!(can_edit_task(&stranger, &t).is_err());

        assert!(can_change_task_status(&creator, &t).is_ok());
        assert!(can_change_task_status(&assignee, &t).is_ok());
        assert!(can_change_task_status(&stranger, &t).is_err());

        assert!(can_delete_task(&creator, &t).is_ok());
        assert!(can_delete_task(&assignee, &t).is_err());
    }

    #[test]
    fn test_staff_task_access() {
        let t = task(Uuid::new_v4(), None);
        for role in [Role::Admin, Role::Manager] {
            let staff = ctx(role);
            assert!(can_view_task(&staff, &t).is_ok());
            assert!(can_edit_task(&staff, &t).is_ok());
            assert!(can_change_task_status(&staff, &t).is_ok());
            assert!(can_delete_task(&staff, &t).is_ok());
        }
    }

    #[test]
    fn test_user_access() {
        let user = ctx(Role::User);
        let manager = ctx(Role::Manager);
        let admin = ctx(Role::Admin);
        let other = Uuid::new_v4();

        assert!(can_view_user(&user, user.user_id).is_ok());
        assert!(can_view_user(&user, other).is_err());
        assert!(can_view_user(&manager, other).is_ok());

        assert!(can_update_user(&user, user.user_id).is_ok());
        assert!(can_update_user(&user, other).is_err());
        assert!(can_update_user(&manager, other).is_err());
        assert!(can_update_user(&manager, manager.user_id).is_ok());
        assert!(can_update_user(&admin, other).is_ok());
    }
}
