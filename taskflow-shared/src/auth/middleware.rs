/// Authentication context and bearer-token parsing
///
/// The API's auth layer parses the `Authorization` header with
/// [`parse_bearer_token`], validates the access token, reloads the user and
/// inserts an [`AuthContext`] into the request extensions. Handlers read it
/// with `Extension<AuthContext>`.
///
/// The role comes from the database rather than the token, so a role change
/// or deactivation applies to the very next request.

use crate::models::user::{Role, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins and managers see and manage every task
    pub fn is_staff(&self) -> bool {
        self.role.has_permission(&Role::Manager)
    }
}

/// Errors raised while authenticating a request
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),

    /// The token is valid but its user no longer exists or was deactivated
    #[error("User not found or inactive")]
    InactiveUser,
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
///
/// ```
/// use taskflow_shared::auth::middleware::parse_bearer_token;
///
/// assert_eq!(parse_bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
/// assert!(parse_bearer_token(Some("Basic abc")).is_err());
/// assert!(parse_bearer_token(None).is_err());
/// ```
pub fn parse_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidFormat("Empty bearer token".to_string()));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_token() {
        assert_eq!(parse_bearer_token(Some("Bearer token123")).unwrap(), "token123");
        assert!(matches!(parse_bearer_token(None), Err(AuthError::MissingCredentials)));
        assert!(matches!(
            parse_bearer_token(Some("Token token123")),
            Err(AuthError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_bearer_token(Some("Bearer   ")),
            Err(AuthError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_staff_roles() {
        let mut ctx = AuthContext {
            user_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            role: Role::User,
        };
        assert!(!ctx.is_staff());
        assert!(!ctx.is_admin());

        ctx.role = Role::Manager;
        assert!(ctx.is_staff());
        assert!(!ctx.is_admin());

        ctx.role = Role::Admin;
        assert!(ctx.is_staff());
        assert!(ctx.is_admin());
    }
}
