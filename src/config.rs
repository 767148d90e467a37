//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Upper bound on exclusive balance-lock acquisition
    pub lock_timeout: Duration,

    /// Currency balances are stored in
    pub base_currency: String,

    /// Exchange-rates endpoint; conversion stays unavailable when unset
    pub rates_url: Option<String>,

    /// How often the rate refresh job runs
    pub rates_refresh_interval: Duration,

    /// How long a fetched rates table stays usable
    pub rates_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let lock_timeout = duration_var("LOCK_TIMEOUT_MS", 5_000, Duration::from_millis)?;

        let base_currency = env::var("BASE_CURRENCY")
            .unwrap_or_else(|_| "RUB".to_string())
            .to_uppercase();

        let rates_url = env::var("EXCHANGE_RATES_URL").ok();

        let rates_refresh_interval =
            duration_var("RATES_REFRESH_INTERVAL_SECS", 3_600, Duration::from_secs)?;

        // Day-old rates are still acceptable for display conversion
        let rates_ttl = duration_var("RATES_TTL_SECS", 86_400, Duration::from_secs)?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            lock_timeout,
            base_currency,
            rates_url,
            rates_refresh_interval,
            rates_ttl,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn duration_var(
    name: &'static str,
    default: u64,
    to_duration: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    let value = match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(name))?,
        Err(_) => default,
    };
    Ok(to_duration(value))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
