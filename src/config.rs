//! Environment configuration, read once at startup and injected.
//!
//! Required values (signing secrets) fail fast with a `ConfigError`.
//! The SMTP and invoicing blocks are optional: when absent, the
//! corresponding side-effect chain is disabled and creation endpoints
//! respond with `email_sent`/`invoice_sent` = false without attempting
//! any network call.

use std::env;

pub const APP_NAME: &str = "SquareOne API";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{key} is not a valid number: {value}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub frontend_origin: String,
    pub upload_dir: String,
    pub database_path: String,
    pub db_pool_size: usize,

    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_mins: i64,
    pub refresh_ttl_days: i64,
    pub is_prod: bool,

    pub smtp: Option<SmtpConfig>,
    pub invoicing: Option<InvoicingConfig>,

    pub clinic_name: String,
    pub clinic_tz: String,
    pub org_domain: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub secret_key: String,
    pub auto_email: bool,
    pub default_currency: String,
}

fn must(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn num_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value: v }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: num_or("SMTP_PORT", 587)?,
                user: var_or("SMTP_USER", ""),
                pass: var_or("SMTP_PASS", ""),
                from: must("MAIL_FROM")?,
            }),
            Err(_) => None,
        };

        let invoicing = match env::var("STRIPE_SECRET_KEY") {
            Ok(secret_key) if !secret_key.is_empty() => Some(InvoicingConfig {
                secret_key,
                auto_email: var_or("STRIPE_AUTO_EMAIL", "true").to_lowercase() != "false",
                default_currency: var_or("STRIPE_DEFAULT_CURRENCY", "usd").to_lowercase(),
            }),
            _ => None,
        };

        Ok(Config {
            port: num_or("PORT", 4000)?,
            frontend_origin: var_or("FRONTEND_ORIGIN", "http://localhost:5173"),
            upload_dir: var_or("UPLOAD_DIR", "uploads"),
            database_path: var_or("DATABASE_PATH", "squareone.db"),
            db_pool_size: num_or("DB_POOL_SIZE", 10)?,
            access_secret: must("JWT_ACCESS_SECRET")?,
            refresh_secret: must("JWT_REFRESH_SECRET")?,
            access_ttl_mins: num_or("ACCESS_TOKEN_TTL_MINS", 15)?,
            refresh_ttl_days: num_or("REFRESH_TOKEN_TTL_DAYS", 7)?,
            is_prod: var_or("APP_ENV", "development") == "production",
            smtp,
            invoicing,
            clinic_name: var_or("CLINIC_NAME", "Clinic"),
            clinic_tz: var_or("CLINIC_TZ", "Asia/Colombo"),
            org_domain: var_or("ORG_DOMAIN", "squareone.com"),
        })
    }

    /// Config for tests: no integrations, fixed secrets.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            port: 0,
            frontend_origin: "http://localhost:5173".into(),
            upload_dir: "uploads".into(),
            database_path: ":memory:".into(),
            db_pool_size: 2,
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_ttl_mins: 15,
            refresh_ttl_days: 7,
            is_prod: false,
            smtp: None,
            invoicing: None,
            clinic_name: "Test Clinic".into(),
            clinic_tz: "Asia/Colombo".into(),
            org_domain: "squareone.test".into(),
        }
    }
}

pub fn default_log_filter() -> &'static str {
    "info,squareone_api=debug"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_has_no_integrations() {
        let cfg = Config::for_tests();
        assert!(cfg.smtp.is_none());
        assert!(cfg.invoicing.is_none());
        assert!(!cfg.is_prod);
    }

    #[test]
    fn default_ttls() {
        let cfg = Config::for_tests();
        assert_eq!(cfg.access_ttl_mins, 15);
        assert_eq!(cfg.refresh_ttl_days, 7);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
