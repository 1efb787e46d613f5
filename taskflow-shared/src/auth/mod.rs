/// Authentication and authorization
///
/// - [`password`]: Argon2id hashing and the password policy
/// - [`jwt`]: access/refresh token issue and validation
/// - [`middleware`]: the per-request `AuthContext` and bearer parsing
/// - [`authorization`]: role-based permission checks

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
