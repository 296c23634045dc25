//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// When absent the service runs against the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub jwt_secret: String,
    pub stripe_secret_key: String,
    pub webhook_secret: String,
    pub frontend_url: String,
    pub checkout_currency: String,
    /// Production cookies are `Secure` and `SameSite=None`.
    pub production: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Secrets ---
        let jwt_secret = required("SECRET_KEY")?;
        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;
        let webhook_secret = required("WEBHOOK_ENDPOINT_SECRET")?;

        // --- Checkout Settings ---
        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".to_string());
        let checkout_currency = lookup("CHECKOUT_CURRENCY")
            .unwrap_or_else(|| "inr".to_string())
            .to_lowercase();
        if checkout_currency.len() != 3 || !checkout_currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidValue(
                "CHECKOUT_CURRENCY".to_string(),
                format!("'{}' is not a three-letter currency code", checkout_currency),
            ));
        }

        let production = lookup("APP_ENV")
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret,
            stripe_secret_key,
            webhook_secret,
            frontend_url,
            checkout_currency,
            production,
        })
    }
}
