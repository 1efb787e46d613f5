/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     email TEXT NOT NULL UNIQUE,          -- stored lowercase
///     password_hash TEXT NOT NULL,
///     first_name VARCHAR(50) NOT NULL,
///     last_name VARCHAR(50) NOT NULL,
///     role user_role NOT NULL DEFAULT 'user',
///     department department NOT NULL DEFAULT 'Operations',
///     job_title VARCHAR(100),
///     avatar TEXT,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     email_verification_token TEXT,
///     email_verification_expires TIMESTAMPTZ,
///     password_reset_token TEXT,
///     password_reset_expires TIMESTAMPTZ,
///     refresh_token TEXT,                  -- SHA-256 of the current refresh token
///     last_login TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::models::user::{CreateUser, Department, Role, User};
/// # use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "Jane@Example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     first_name: "Jane".to_string(),
///     last_name: "Doe".to_string(),
///     role: Role::User,
///     department: Department::Engineering,
///     job_title: None,
/// }).await?;
///
/// assert_eq!(user.email, "jane@example.com");
/// # Ok(())
/// # }
/// ```

use crate::pagination::PageRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, department, \
     job_title, avatar, is_active, is_email_verified, email_verification_token, \
     email_verification_expires, password_reset_token, password_reset_expires, refresh_token, \
     last_login, created_at, updated_at";

/// Account role
///
/// # Permission Hierarchy
///
/// Admin > Manager > User
///
/// - **Admin**: manages users and roles, sees every task
/// - **Manager**: sees and manages every task, lists users
/// - **User**: sees only tasks they created or were assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }

    /// Checks whether this role is at least `required` in the hierarchy
    ///
    /// # Example
    ///
    /// ```
    /// use taskflow_shared::models::user::Role;
    ///
    /// assert!(Role::Admin.has_permission(&Role::Manager));
    /// assert!(Role::Manager.has_permission(&Role::Manager));
    /// assert!(!Role::User.has_permission(&Role::Manager));
    /// ```
    pub fn has_permission(&self, required: &Role) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Manager => 2,
            Role::User => 1,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organizational department
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "department")]
pub enum Department {
    Engineering,
    Marketing,
    Sales,
    HR,
    Finance,
    Operations,
    Product,
    Design,
    Support,
    Management,
}

impl Default for Department {
    fn default() -> Self {
        Department::Operations
    }
}

/// User row
///
/// Secrets (password hash, refresh token, verification and reset tokens) are
/// never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Always lowercase
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: Department,
    pub job_title: Option<String>,

    /// Public path of the uploaded avatar, e.g. `/uploads/<file>`
    pub avatar: Option<String>,

    pub is_active: bool,
    pub is_email_verified: bool,

    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,

    /// Hash of the most recently issued refresh token
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,

    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Normalized to lowercase before insert
    pub email: String,

    /// Argon2id hash, never plaintext
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: Department,
    pub job_title: Option<String>,
}

/// Profile fields a user (or an admin) may change
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<Department>,
    pub job_title: Option<String>,
}

impl UpdateProfile {
    /// Names of the fields that will be written, in column order
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.first_name.is_some() {
            fields.push("first_name");
        }
        if self.last_name.is_some() {
            fields.push("last_name");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        if self.department.is_some() {
            fields.push("department");
        }
        if self.job_title.is_some() {
            fields.push("job_title");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }
}

/// Filters for the admin user listing
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,

    /// Case-insensitive substring over first name, last name and email
    pub search: Option<String>,
}

/// Minimal identity embedded in task responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }
    }

    /// Normalizes an email address for storage and lookup
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns a database error on duplicate email (`users_email_key`).
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role, department, job_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(Self::normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.first_name.trim())
            .bind(data.last_name.trim())
            .bind(data.role)
            .bind(data.department)
            .bind(data.job_title.as_deref().map(str::trim))
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&sql)
            .bind(Self::normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Returns true if `email` belongs to a user other than `except`
    pub async fn email_taken(
        pool: &PgPool,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let (taken,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(Self::normalize_email(email))
        .bind(except)
        .fetch_one(pool)
        .await?;

        Ok(taken)
    }

    /// Applies a profile update
    ///
    /// # Returns
    ///
    /// The updated user, or `None` if no user has this ID
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(first_name) = data.first_name {
            query.push(", first_name = ").push_bind(first_name.trim().to_string());
        }
        if let Some(last_name) = data.last_name {
            query.push(", last_name = ").push_bind(last_name.trim().to_string());
        }
        if let Some(email) = data.email {
            query.push(", email = ").push_bind(Self::normalize_email(&email));
        }
        if let Some(department) = data.department {
            query.push(", department = ").push_bind(department);
        }
        if let Some(job_title) = data.job_title {
            query.push(", job_title = ").push_bind(job_title.trim().to_string());
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(" RETURNING ").push(USER_COLUMNS);

        query.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Changes a user's role
    pub async fn update_role(pool: &PgPool, id: Uuid, role: Role) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(pool)
            .await
    }

    /// Activates or deactivates an account
    ///
    /// Deactivation also revokes the stored refresh token.
    pub async fn set_active(pool: &PgPool, id: Uuid, is_active: bool) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE users
            SET is_active = $2,
                refresh_token = CASE WHEN $2 THEN refresh_token ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// Stores the public path of a newly uploaded avatar
    pub async fn update_avatar(pool: &PgPool, id: Uuid, avatar: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(avatar)
            .fetch_optional(pool)
            .await
    }

    /// Replaces the password hash and revokes the refresh token
    pub async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, refresh_token = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores (or with `None`, clears) the hash of the current refresh token
    pub async fn set_refresh_token(
        pool: &PgPool,
        id: Uuid,
        token_hash: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token_hash)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the stored refresh token hash only if it still equals `current`
    ///
    /// Returns false when another rotation or a logout got there first, or
    /// the user has been deactivated.
    pub async fn rotate_refresh_token(
        pool: &PgPool,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $3
            WHERE id = $1 AND refresh_token = $2 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .bind(current)
        .bind(next)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users matching `filter`, newest first
    ///
    /// # Returns
    ///
    /// The requested page and the total number of matching users
    pub async fn list(
        pool: &PgPool,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count_query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE TRUE");
        push_user_filter(&mut count_query, filter);
        let (total,) = count_query.build_query_as::<(i64,)>().fetch_one(pool).await?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        query.push(USER_COLUMNS).push(" FROM users WHERE TRUE");
        push_user_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let users = query.build_query_as::<User>().fetch_all(pool).await?;

        Ok((users, total))
    }

    /// All active accounts, used by the daily digest
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM users WHERE is_active = TRUE ORDER BY created_at",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql).fetch_all(pool).await
    }
}

fn push_user_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(role) = filter.role {
        query.push(" AND role = ").push_bind(role);
    }
    if let Some(is_active) = filter.is_active {
        query.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        query
            .push(" AND (first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Escapes LIKE metacharacters so search input matches literally
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Admin.has_permission(&Role::User));
        assert!(Role::Admin.has_permission(&Role::Manager));
        assert!(Role::Manager.has_permission(&Role::User));
        assert!(!Role::Manager.has_permission(&Role::Admin));
        assert!(!Role::User.has_permission(&Role::Manager));
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "\"manager\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Role::default(), Role::User);
        assert_eq!(Department::default(), Department::Operations);
        assert_eq!(serde_json::to_string(&Department::HR).unwrap(), "\"HR\"");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(User::normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_update_profile_field_names() {
        let update = UpdateProfile {
            first_name: Some("Jane".to_string()),
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(update.field_names(), vec!["first_name", "email"]);
        assert!(UpdateProfile::default().is_empty());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_secrets_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            role: Role::User,
            department: Department::Engineering,
            job_title: None,
            avatar: None,
            is_active: true,
            is_email_verified: false,
            email_verification_token: Some("verify".to_string()),
            email_verification_expires: None,
            password_reset_token: Some("reset".to_string()),
            password_reset_expires: None,
            refresh_token: Some("refresh".to_string()),
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("refresh_token").is_none());
        assert!(json.get("password_reset_token").is_none());
        assert!(json.get("email_verification_token").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(user.full_name(), "Jane Doe");
    }
}
