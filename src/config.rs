use dotenvy::dotenv;
use std::env;
use thiserror::Error;

/// Which persistence adapter backs the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    MySql,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Persistence
    pub store:            StoreBackend,
    pub db_host:          String,
    pub db_port:          u16,
    pub db_name:          String,
    pub db_user:          String,
    pub db_password:      String,
    pub db_max_connections: u32,

    // Backend
    pub backend_host:     String,
    pub backend_port:     u16,

    // Session
    pub session_days:     i64,

    // Email
    pub smtp_host:        String,
    pub smtp_port:        u16,
    pub smtp_user:        String,
    pub smtp_password:    String,
    pub smtp_from:        String,

    // Seeded admin account
    pub seed_admin_email:    String,
    pub seed_admin_password: String,

    // Earnings fallback when no rate is recorded
    pub default_hourly_rate: f64,

    // Background maintenance (audit purge, cover completion)
    pub maintenance_enabled:          bool,
    pub maintenance_interval_minutes: u64,

    // App
    pub app_env:          String,
    pub app_base_url:     String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        fn require(key: &str) -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        }

        fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
            match env::var(key) {
                Ok(raw) => raw
                    .parse::<T>()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
                Err(_) => Ok(default),
            }
        }

        let store = match env::var("STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("mysql") | Err(_) => StoreBackend::MySql,
            Ok(other) => {
                return Err(ConfigError::InvalidValue("STORE".into(), other.to_string()))
            }
        };

        // DB credentials only matter for the MySQL adapter.
        let db_var = |key: &str| -> Result<String, ConfigError> {
            match store {
                StoreBackend::MySql => require(key),
                StoreBackend::Memory => Ok(env::var(key).unwrap_or_default()),
            }
        };

        Ok(Self {
            store,
            db_host:      env::var("DB_HOST").unwrap_or_else(|_| "db".into()),
            db_port:      parse_or("DB_PORT", 3306)?,
            db_name:      db_var("DB_NAME")?,
            db_user:      db_var("DB_USER")?,
            db_password:  db_var("DB_PASSWORD")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,

            backend_host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            backend_port: parse_or("BACKEND_PORT", 8080)?,

            session_days: parse_or("SESSION_DAYS", 7)?,

            smtp_host:     env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port:     parse_or("SMTP_PORT", 587)?,
            smtp_user:     env::var("SMTP_USER").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from:     env::var("SMTP_FROM").unwrap_or_default(),

            seed_admin_email:    env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@leisure.local".into()),
            seed_admin_password: env::var("SEED_ADMIN_PASSWORD").unwrap_or_default(),

            default_hourly_rate: parse_or("DEFAULT_HOURLY_RATE", 25.0)?,

            maintenance_enabled:          parse_or("MAINTENANCE_ENABLED", true)?,
            maintenance_interval_minutes: parse_or("MAINTENANCE_INTERVAL_MINUTES", 60)?,

            app_env:      env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            app_base_url: env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost".into()),
        })
    }

    /// Defaults for an in-memory process with no mail server; used by tests.
    pub fn in_memory() -> Self {
        Self {
            store:        StoreBackend::Memory,
            db_host:      String::new(),
            db_port:      3306,
            db_name:      String::new(),
            db_user:      String::new(),
            db_password:  String::new(),
            db_max_connections: 1,

            backend_host: "127.0.0.1".into(),
            backend_port: 8080,

            session_days: 7,

            smtp_host:     String::new(),
            smtp_port:     587,
            smtp_user:     String::new(),
            smtp_password: String::new(),
            smtp_from:     String::new(),

            seed_admin_email:    "admin@leisure.local".into(),
            seed_admin_password: String::new(),

            default_hourly_rate: 25.0,

            maintenance_enabled:          false,
            maintenance_interval_minutes: 60,

            app_env:      "test".into(),
            app_base_url: "http://localhost".into(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }

    pub fn smtp_configured(&self) -> bool {
        !self.smtp_host.is_empty()
    }
}
