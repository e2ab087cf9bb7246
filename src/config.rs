//! Server configuration parsed from environment variables.
//!
//! Every knob has a named default. Parsing goes through a lookup closure so
//! tests can feed a fixed map instead of mutating the process environment.

use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MAX_MONTHLY_MESSAGES: u32 = 50;
pub const DEFAULT_SUBSCRIPTION_SWEEP_SECS: u64 = 3600;
pub const DEFAULT_PAYMENT_PAGE_URL: &str = "https://payments.example.invalid/checkout";
pub const DEFAULT_RESEND_FROM: &str = "Lisan <no-reply@lisan.local>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres URL. `None` runs on in-memory stores.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub max_monthly_messages: u32,
    /// Lower-cased e-mails allowed to use the admin endpoints.
    pub admin_emails: Vec<String>,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Hosted payment page that checkouts redirect to.
    pub payment_page_url: String,
    /// Shared key the payment provider sends with webhooks. `None` disables
    /// the check.
    pub webhook_key: Option<String>,
    pub resend_api_key: Option<String>,
    pub resend_from: String,
    pub subscription_sweep_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            max_monthly_messages: DEFAULT_MAX_MONTHLY_MESSAGES,
            admin_emails: Vec::new(),
            cors_origins: Vec::new(),
            payment_page_url: DEFAULT_PAYMENT_PAGE_URL.to_owned(),
            webhook_key: None,
            resend_api_key: None,
            resend_from: DEFAULT_RESEND_FROM.to_owned(),
            subscription_sweep_secs: DEFAULT_SUBSCRIPTION_SWEEP_SECS,
        }
    }
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// - `PORT` (default 3000)
    /// - `DATABASE_URL` (unset: in-memory stores)
    /// - `DB_MAX_CONNECTIONS` (default 5)
    /// - `MAX_MONTHLY_MESSAGES` (default 50)
    /// - `ADMIN_EMAILS`: comma-separated
    /// - `CORS_ORIGINS`: comma-separated
    /// - `PAYMENT_PAGE_URL`
    /// - `PAYMENT_WEBHOOK_KEY`
    /// - `RESEND_API_KEY`, `RESEND_FROM`
    /// - `SUBSCRIPTION_SWEEP_SECS` (default 3600)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            port: env_parse(&lookup, "PORT", defaults.port),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: env_parse(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections),
            max_monthly_messages: env_parse(&lookup, "MAX_MONTHLY_MESSAGES", defaults.max_monthly_messages),
            admin_emails: split_list(lookup("ADMIN_EMAILS").as_deref())
                .into_iter()
                .map(|email| email.to_ascii_lowercase())
                .collect(),
            cors_origins: split_list(lookup("CORS_ORIGINS").as_deref()),
            payment_page_url: non_empty("PAYMENT_PAGE_URL").unwrap_or(defaults.payment_page_url),
            webhook_key: non_empty("PAYMENT_WEBHOOK_KEY"),
            resend_api_key: non_empty("RESEND_API_KEY"),
            resend_from: non_empty("RESEND_FROM").unwrap_or(defaults.resend_from),
            subscription_sweep_secs: env_parse(&lookup, "SUBSCRIPTION_SWEEP_SECS", defaults.subscription_sweep_secs),
        }
    }

    #[must_use]
    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.trim().to_ascii_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }
}

pub(crate) fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
