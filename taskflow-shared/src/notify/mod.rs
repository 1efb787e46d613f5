/// Email notifications
///
/// Delivery goes through the [`Mailer`] trait so the API and the worker can
/// share one implementation chosen at startup:
///
/// - [`LogMailer`]: writes each message to the tracing log (default)
/// - [`HttpMailer`]: posts each message as JSON to a transactional email API
///
/// Message bodies come from [`templates::Templates`].
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::notify::{build_mailer, EmailConfig, EmailMessage};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EmailConfig::from_env()?;
/// let mailer = build_mailer(&config)?;
///
/// mailer.send(EmailMessage {
///     to: "jane@example.com".to_string(),
///     subject: "Hello".to_string(),
///     html: "<p>Hi</p>".to_string(),
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod mailer;
pub mod templates;

pub use mailer::{HttpMailer, LogMailer};

use async_trait::async_trait;
use std::{env, sync::Arc};

/// Display name used in the From header
pub const SENDER_NAME: &str = "TaskFlow";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Email configuration error: {0}")]
    Config(String),

    #[error("Email transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Email provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Which delivery backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailProvider {
    Log,
    Http,
}

/// Email settings shared by the API and the worker
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub provider: EmailProvider,

    /// Sender address; the From header is `"TaskFlow" <from_address>`
    pub from_address: String,

    /// Endpoint for the HTTP provider
    pub api_url: Option<String>,

    /// Bearer token for the HTTP provider
    pub api_key: Option<String>,

    /// Base URL used for links inside emails
    pub frontend_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: EmailProvider::Log,
            from_address: "noreply@taskflow.com".to_string(),
            api_url: None,
            api_key: None,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

impl EmailConfig {
    /// Reads email settings from the environment
    ///
    /// # Environment Variables
    ///
    /// - `EMAIL_PROVIDER`: `log` (default) or `http`
    /// - `EMAIL_USER`: sender address (default `noreply@taskflow.com`)
    /// - `EMAIL_API_URL`, `EMAIL_API_KEY`: required for `http`
    /// - `FRONTEND_URL`: link base (default `http://localhost:3000`)
    pub fn from_env() -> Result<Self, MailError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let provider = match env::var("EMAIL_PROVIDER")
            .unwrap_or_else(|_| "log".to_string())
            .to_lowercase()
            .as_str()
        {
            "log" => EmailProvider::Log,
            "http" => EmailProvider::Http,
            other => {
                return Err(MailError::Config(format!(
                    "Unknown EMAIL_PROVIDER '{}', expected 'log' or 'http'",
                    other
                )))
            }
        };

        let config = Self {
            provider,
            from_address: env::var("EMAIL_USER").unwrap_or(defaults.from_address),
            api_url: env::var("EMAIL_API_URL").ok(),
            api_key: env::var("EMAIL_API_KEY").ok(),
            frontend_url: env::var("FRONTEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.frontend_url),
        };

        if config.provider == EmailProvider::Http && config.api_url.is_none() {
            return Err(MailError::Config(
                "EMAIL_API_URL is required when EMAIL_PROVIDER=http".to_string(),
            ));
        }

        Ok(config)
    }

    /// `"TaskFlow" <address>`
    pub fn from_header(&self) -> String {
        format!("\"{}\" <{}>", SENDER_NAME, self.from_address)
    }
}

/// Builds the configured mailer
pub fn build_mailer(config: &EmailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.provider {
        EmailProvider::Log => Ok(Arc::new(LogMailer::new(config.from_header()))),
        EmailProvider::Http => Ok(Arc::new(HttpMailer::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header() {
        let config = EmailConfig {
            from_address: "alerts@example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(config.from_header(), "\"TaskFlow\" <alerts@example.com>");
    }

    #[test]
    fn test_build_log_mailer() {
        assert!(build_mailer(&EmailConfig::default()).is_ok());
    }

    #[test]
    fn test_http_mailer_requires_url() {
        let config = EmailConfig {
            provider: EmailProvider::Http,
            ..Default::default()
        };
        assert!(matches!(build_mailer(&config), Err(MailError::Config(_))));
    }
}
