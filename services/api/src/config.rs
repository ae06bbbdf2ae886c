//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Endpoints and client registration of the Google OAuth/Calendar integration.
#[derive(Clone, Debug)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub calendar_api_base: String,
    pub http_timeout_secs: u64,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub google: GoogleSettings,
    pub sync_window_days: i64,
    pub event_list_limit: usize,
    pub admin_token: Option<String>,
    pub cors_origin: String,
    pub post_connect_redirect: String,
    pub catalog_scrape_command: Option<String>,
    pub catalog_import_command: Option<String>,
    pub catalog_refresh_lease_secs: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Load Server and Database Settings ---
        let bind_address = parse_or(&var, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>().ok())?;
        let database_url = required("DATABASE_URL")?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Google OAuth and Calendar Settings ---
        let google = GoogleSettings {
            client_id: required("GOOGLE_CLIENT_ID")?,
            client_secret: required("GOOGLE_CLIENT_SECRET")?,
            redirect_uri: required("GOOGLE_REDIRECT_URI")?,
            auth_url: var("GOOGLE_AUTH_URL")
                .unwrap_or_else(|| "https://accounts.google.com/o/oauth2/v2/auth".to_string()),
            token_url: var("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|| "https://oauth2.googleapis.com/token".to_string()),
            calendar_api_base: var("GOOGLE_CALENDAR_API_BASE")
                .unwrap_or_else(|| "https://www.googleapis.com/calendar/v3".to_string()),
            http_timeout_secs: parse_or(&var, "HTTP_TIMEOUT_SECS", Some(15))?,
        };

        // --- Load Pipeline Settings ---
        let sync_window_days: i64 = parse_or(&var, "SYNC_WINDOW_DAYS", Some(7))?;
        if sync_window_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "SYNC_WINDOW_DAYS".to_string(),
                "must be a positive number of days".to_string(),
            ));
        }
        let event_list_limit = parse_or(&var, "EVENT_LIST_LIMIT", Some(10))?;

        // --- Load Admin and Job Settings ---
        let admin_token = var("ADMIN_TOKEN");
        let cors_origin = var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let post_connect_redirect = var("POST_CONNECT_REDIRECT").unwrap_or_else(|| "/".to_string());
        let catalog_scrape_command = var("CATALOG_SCRAPE_COMMAND");
        let catalog_import_command = var("CATALOG_IMPORT_COMMAND");
        let catalog_refresh_lease_secs = parse_or(&var, "CATALOG_REFRESH_LEASE_SECS", Some(1800))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            google,
            sync_window_days,
            event_list_limit,
            admin_token,
            cors_origin,
            post_connect_redirect,
            catalog_scrape_command,
            catalog_import_command,
            catalog_refresh_lease_secs,
        })
    }
}

/// Parses `key` if set, falling back to `default` otherwise.
fn parse_or<T, V>(var: &V, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
    }
}
