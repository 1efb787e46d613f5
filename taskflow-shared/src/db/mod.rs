/// Database layer for TaskFlow
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations from the workspace `migrations/` directory
///
/// Row types and queries live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
