/// JWT access and refresh tokens
///
/// Tokens are signed with HS256. Access and refresh tokens use different
/// secrets, so a leaked refresh secret cannot mint access tokens and a refresh
/// token can never pass access-token validation.
///
/// - **Access token**: short-lived (default 15 minutes), carries the user's
///   identity and role
/// - **Refresh token**: long-lived (default 7 days), carries only the subject
///   and a unique `jti`. The server stores a SHA-256 of the latest one per
///   user, which makes refresh tokens single-use.
///
/// # Example
///
/// ```
/// use taskflow_shared::auth::jwt::{issue_token_pair, validate_access_token, JwtConfig, TokenSubject};
/// use taskflow_shared::models::user::Role;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = JwtConfig::new(
///     "access-secret-that-is-at-least-32-bytes",
///     "refresh-secret-that-is-at-least-32-bytes",
/// );
///
/// let subject = TokenSubject {
///     user_id: Uuid::new_v4(),
///     email: "jane@example.com".to_string(),
///     role: Role::Manager,
///     first_name: "Jane".to_string(),
///     last_name: "Doe".to_string(),
/// };
///
/// let pair = issue_token_pair(&subject, &config)?;
/// let claims = validate_access_token(&pair.access_token, &config.access_secret)?;
/// assert_eq!(claims.role, Role::Manager);
/// # Ok(())
/// # }
/// ```

use crate::models::user::{Role, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Value of the `iss` claim
pub const ISSUER: &str = "taskflow";

/// Shortest secret accepted for HS256
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token issuer")]
    InvalidIssuer,

    #[error("Expected {expected} token")]
    WrongTokenType { expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Secrets and lifetimes for both token kinds
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtConfig {
    /// Config with the default lifetimes (15 minutes / 7 days)
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        }
    }
}

/// Identity baked into an access token
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub token_type: TokenType,
}

impl AccessClaims {
    pub fn new(subject: &TokenSubject, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            email: subject.email.clone(),
            role: subject.role,
            first_name: subject.first_name.clone(),
            last_name: subject.last_name.clone(),
            token_type: TokenType::Access,
        }
    }
}

/// Refresh token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User ID
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    /// Unique per token, so two tokens issued in the same second differ
    pub jti: Uuid,
    pub token_type: TokenType,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
            token_type: TokenType::Refresh,
        }
    }
}

/// A freshly issued access/refresh pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Signs any claims set with HS256
pub fn create_token<T: Serialize>(claims: &T, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, not-before and issuer, then decodes the claims
pub fn validate_token<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<T>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(e.to_string()),
    })?;

    Ok(token_data.claims)
}

/// Validates an access token signed with the access secret
pub fn validate_access_token(token: &str, secret: &str) -> Result<AccessClaims, JwtError> {
    let claims: AccessClaims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Access {
        return Err(JwtError::WrongTokenType { expected: "access" });
    }

    Ok(claims)
}

/// Validates a refresh token signed with the refresh secret
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<RefreshClaims, JwtError> {
    let claims: RefreshClaims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Refresh {
        return Err(JwtError::WrongTokenType { expected: "refresh" });
    }

    Ok(claims)
}

/// Issues a new access/refresh pair for `subject`
pub fn issue_token_pair(subject: &TokenSubject, config: &JwtConfig) -> Result<TokenPair, JwtError> {
    let access_claims = AccessClaims::new(subject, config.access_ttl);
    let refresh_claims = RefreshClaims::new(subject.user_id, config.refresh_ttl);

    Ok(TokenPair {
        access_token: create_token(&access_claims, &config.access_secret)?,
        refresh_token: create_token(&refresh_claims, &config.refresh_secret)?,
        expires_in: config.access_ttl.num_seconds(),
    })
}

/// Hex SHA-256 of a refresh token, as stored on the user row
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Parses lifetimes such as `15m`, `7d`, `12h`, `30s` or bare seconds
///
/// ```
/// use taskflow_shared::auth::jwt::parse_duration;
/// use chrono::Duration;
///
/// assert_eq!(parse_duration("15m"), Some(Duration::minutes(15)));
/// assert_eq!(parse_duration("7d"), Some(Duration::days(7)));
/// assert_eq!(parse_duration("3600"), Some(Duration::seconds(3600)));
/// assert_eq!(parse_duration("soon"), None);
/// ```
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);
    let value: i64 = number.parse().ok()?;

    if value <= 0 {
        return None;
    }

    match unit {
        "" | "s" => Some(Duration::seconds(value)),
        "m" => Some(Duration::minutes(value)),
        "h" => Some(Duration::hours(value)),
        "d" => Some(Duration::days(value)),
        "w" => Some(Duration::weeks(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &str = "test-access-secret-at-least-32-bytes-long";
    const REFRESH_SECRET: &str = "test-refresh-secret-at-least-32-bytes-long";

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            role: Role::User,
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    fn config() -> JwtConfig {
        JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET)
    }

    #[test]
    fn test_default_lifetimes() {
        let config = config();
        assert_eq!(config.access_ttl, Duration::minutes(15));
        assert_eq!(config.refresh_ttl, Duration::days(7));
    }

    #[test]
    fn test_access_token_roundtrip() {
        let subject = subject();
        let claims = AccessClaims::new(&subject, Duration::minutes(15));
        let token = create_token(&claims, ACCESS_SECRET).expect("Should create token");

        let validated = validate_access_token(&token, ACCESS_SECRET).expect("Should validate");
        assert_eq!(validated.sub, subject.user_id);
        assert_eq!(validated.email, "jane@example.com");
        assert_eq!(validated.role, Role::User);
        assert_eq!(validated.iss, ISSUER);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = AccessClaims::new(&subject(), Duration::minutes(15));
        let token = create_token(&claims, ACCESS_SECRET).unwrap();

        assert!(matches!(
            validate_access_token(&token, "another-secret-entirely-32-bytes-xx"),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let claims = AccessClaims::new(&subject(), Duration::seconds(-3600));
        let token = create_token(&claims, ACCESS_SECRET).unwrap();

        assert!(matches!(
            validate_access_token(&token, ACCESS_SECRET),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut claims = AccessClaims::new(&subject(), Duration::minutes(15));
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, ACCESS_SECRET).unwrap();

        assert!(matches!(
            validate_access_token(&token, ACCESS_SECRET),
            Err(JwtError::InvalidIssuer)
        ));
    }

    #[test]
    fn test_refresh_token_cannot_be_used_as_access_token() {
        let pair = issue_token_pair(&subject(), &config()).unwrap();

        // different secret
        assert!(validate_access_token(&pair.refresh_token, ACCESS_SECRET).is_err());

        // same secret, wrong type
        let refresh_claims = RefreshClaims::new(Uuid::new_v4(), Duration::days(1));
        let token = create_token(&refresh_claims, ACCESS_SECRET).unwrap();
        assert!(matches!(
            validate_access_token(&token, ACCESS_SECRET),
            Err(JwtError::ValidationError(_)) | Err(JwtError::WrongTokenType { .. })
        ));
    }

    #[test]
    fn test_issue_token_pair() {
        let subject = subject();
        let pair = issue_token_pair(&subject, &config()).unwrap();

        assert_eq!(pair.expires_in, 15 * 60);
        let access = validate_access_token(&pair.access_token, ACCESS_SECRET).unwrap();
        let refresh = validate_refresh_token(&pair.refresh_token, REFRESH_SECRET).unwrap();
        assert_eq!(access.sub, subject.user_id);
        assert_eq!(refresh.sub, subject.user_id);
        assert_eq!(refresh.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let subject = subject();
        let first = issue_token_pair(&subject, &config()).unwrap();
        let second = issue_token_pair(&subject, &config()).unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert_ne!(
            hash_refresh_token(&first.refresh_token),
            hash_refresh_token(&second.refresh_token)
        );
    }

    #[test]
    fn test_hash_refresh_token() {
        let hash = hash_refresh_token("token");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_refresh_token("token"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::seconds(30)));
        assert_eq!(parse_duration("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_duration("2w"), Some(Duration::weeks(2)));
        assert_eq!(parse_duration(" 5m "), Some(Duration::minutes(5)));
        assert_eq!(parse_duration("0m"), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration("10y"), None);
        assert_eq!(parse_duration(""), None);
    }
}
