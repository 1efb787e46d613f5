/// Worker configuration
///
/// Loaded from environment variables (and `.env` when present):
///
/// - `NOTIFICATIONS_ENABLED`: `true`/`1` to run the scheduler (default off)
/// - `DATABASE_URL` and pool settings, as for the API
/// - `EMAIL_*` and `FRONTEND_URL`, as for the API

use std::env;
use taskflow_shared::db::pool::DatabaseConfig;
use taskflow_shared::notify::EmailConfig;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// When false the worker exits without scheduling anything
    pub notifications_enabled: bool,

    pub database: DatabaseConfig,
    pub email: EmailConfig,
}

impl WorkerConfig {
    /// Reads the worker configuration from the environment
    ///
    /// The database and email sections are only read when notifications are
    /// enabled, so a disabled worker starts without a `DATABASE_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        let notifications_enabled = env::var("NOTIFICATIONS_ENABLED")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        if !notifications_enabled {
            return Ok(WorkerConfig {
                notifications_enabled,
                database: DatabaseConfig::default(),
                email: EmailConfig::default(),
            });
        }

        Ok(WorkerConfig {
            notifications_enabled,
            database: DatabaseConfig::from_env()?,
            email: EmailConfig::from_env()?,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("enabled-ish"));
    }
}
