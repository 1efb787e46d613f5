/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `SERVER_HOST`: Host to bind to (default: 0.0.0.0)
/// - `SERVER_PORT`: Port to bind to (default: 5000)
/// - `CORS_ORIGIN`: Comma-separated allowed origins, `*` for any (default: http://localhost:3000)
/// - `PRODUCTION` or `APP_ENV=production`: Enables production behavior
/// - `UPLOAD_DIR`: Where avatar uploads are written (default: uploads)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `ACCESS_TOKEN_SECRET` / `REFRESH_TOKEN_SECRET`: JWT secrets, at least 32 characters (required)
/// - `ACCESS_TOKEN_EXPIRY` / `REFRESH_TOKEN_EXPIRY`: e.g. `15m`, `7d` (defaults: 15m, 7d)
/// - `REDIS_URL`: Optional, enables Redis-backed rate limiting
/// - `EMAIL_*`, `FRONTEND_URL`: see [`EmailConfig::from_env`]
///
/// # Example
///
/// ```no_run
/// use taskflow_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use taskflow_shared::auth::jwt::{parse_duration, JwtConfig, MIN_SECRET_LENGTH};
use taskflow_shared::db::pool::DatabaseConfig;
use taskflow_shared::notify::EmailConfig;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Token secrets and lifetimes
    pub jwt: JwtConfig,

    /// Redis URL for distributed rate limiting
    pub redis_url: Option<String>,

    /// Outgoing email
    pub email: EmailConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS, no internal error details)
    pub production: bool,

    /// Directory avatar uploads are written to
    pub upload_dir: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            production: false,
            upload_dir: "uploads".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or either token secret is missing
    /// - A token secret is shorter than 32 characters
    /// - A port, pool size or expiry has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let defaults = ApiConfig::default();

        let host = env::var("SERVER_HOST").unwrap_or(defaults.host);
        let port = match env::var("SERVER_PORT") {
            Ok(port) => port
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid port, got '{}'", port))?,
            Err(_) => defaults.port,
        };

        let cors_origins = env::var("CORS_ORIGIN")
            .map(|origins| parse_origins(&origins))
            .unwrap_or(defaults.cors_origins);

        let production = env::var("PRODUCTION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
            || env::var("APP_ENV").map(|v| v == "production").unwrap_or(false);

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir);

        let database = DatabaseConfig::from_env()?;

        let access_secret = required_secret("ACCESS_TOKEN_SECRET")?;
        let refresh_secret = required_secret("REFRESH_TOKEN_SECRET")?;

        let mut jwt = JwtConfig::new(access_secret, refresh_secret);
        if let Ok(expiry) = env::var("ACCESS_TOKEN_EXPIRY") {
            jwt.access_ttl = parse_duration(&expiry)
                .ok_or_else(|| anyhow::anyhow!("Invalid ACCESS_TOKEN_EXPIRY '{}'", expiry))?;
        }
        if let Ok(expiry) = env::var("REFRESH_TOKEN_EXPIRY") {
            jwt.refresh_ttl = parse_duration(&expiry)
                .ok_or_else(|| anyhow::anyhow!("Invalid REFRESH_TOKEN_EXPIRY '{}'", expiry))?;
        }

        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty());

        let email = EmailConfig::from_env()?;

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
                upload_dir,
            },
            database,
            jwt,
            redis_url,
            email,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn required_secret(name: &str) -> anyhow::Result<String> {
    let secret = env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable is required", name))?;

    if secret.len() < MIN_SECRET_LENGTH {
        anyhow::bail!("{} must be at least {} characters long", name, MIN_SECRET_LENGTH);
    }

    Ok(secret)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}
