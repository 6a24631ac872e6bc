//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;

use chrono::Duration;

/// Default lifetime of a login session.
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

/// bcrypt cost used by `for_testing`; the lowest the algorithm accepts.
const TEST_PASSWORD_COST: u32 = 4;

const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_EMAIL_FROM: &str = "Growth Tracker <noreply@localhost>";

#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite file (from GROWTH_DB_PATH). `None` uses the platform data dir.
    pub db_path: Option<PathBuf>,
    /// Shared secret for the cron endpoints (from CRON_SECRET_KEY).
    /// When unset every cron call is rejected.
    pub cron_secret: Option<String>,
    pub email: EmailConfig,
    pub session_ttl: Duration,
    /// bcrypt cost factor for new password hashes (from GROWTH_PASSWORD_COST).
    pub password_cost: u32,
    /// Public base URL used for links in emails (from GROWTH_APP_URL).
    pub app_url: String,
    /// Whether to mark the session cookie `Secure` (from GROWTH_SECURE_COOKIES).
    pub secure_cookies: bool,
}

/// Credentials for the HTTP email provider.
#[derive(Clone, Debug, Default)]
pub struct EmailConfig {
    /// Provider endpoint (from EMAIL_API_URL).
    pub api_url: Option<String>,
    /// Bearer key (from EMAIL_API_KEY).
    pub api_key: Option<String>,
    /// Sender address (from EMAIL_FROM).
    pub from: String,
}

impl Config {
    /// Load configuration from the environment, reading `.env` first if present.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        let session_ttl_hours = std::env::var("GROWTH_SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);

        let password_cost = std::env::var("GROWTH_PASSWORD_COST")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .map(|cost| cost.clamp(TEST_PASSWORD_COST, 31))
            .unwrap_or(bcrypt::DEFAULT_COST);

        Self {
            db_path: std::env::var("GROWTH_DB_PATH").ok().map(PathBuf::from),
            cron_secret: std::env::var("CRON_SECRET_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            email: EmailConfig {
                api_url: std::env::var("EMAIL_API_URL").ok(),
                api_key: std::env::var("EMAIL_API_KEY").ok(),
                from: std::env::var("EMAIL_FROM").unwrap_or_else(|_| DEFAULT_EMAIL_FROM.into()),
            },
            session_ttl: Duration::hours(session_ttl_hours),
            password_cost,
            app_url: std::env::var("GROWTH_APP_URL").unwrap_or_else(|_| DEFAULT_APP_URL.into()),
            secure_cookies: std::env::var("GROWTH_SECURE_COOKIES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// A config with no cron secret, no email provider and the cheapest
    /// password hashing.
    pub fn for_testing() -> Self {
        Self {
            db_path: None,
            cron_secret: None,
            email: EmailConfig {
                from: DEFAULT_EMAIL_FROM.to_string(),
                ..EmailConfig::default()
            },
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            password_cost: TEST_PASSWORD_COST,
            app_url: DEFAULT_APP_URL.to_string(),
            secure_cookies: false,
        }
    }

    pub fn with_cron_secret(mut self, secret: impl Into<String>) -> Self {
        self.cron_secret = Some(secret.into());
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}
