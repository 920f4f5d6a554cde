//! Configuration management for the social graph service
//!
//! Strongly-typed configuration read from environment variables, with validation
//! and defaults suitable for local development.
//!
//! # Example
//! ```no_run
//! use socialgraph::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("Listening on {}:{}", config.api.host, config.api.port);
//! ```

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Which store implementation backs the service
    pub store: StoreConfig,
    /// Database configuration (used by the postgres store)
    pub database: DatabaseConfig,
    /// API server configuration
    pub api: ApiConfig,
    /// Session and credential configuration
    pub auth: AuthConfig,
}

/// Store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(Error::InvalidConfig {
                key: "STORE_BACKEND",
                message: format!("Unknown store backend '{}'", other).into(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Apply migrations at startup (postgres only)
    pub run_migrations: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections to keep open
    pub min_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Idle timeout for connections
    pub idle_timeout: Duration,
    /// Maximum lifetime for connections
    pub max_lifetime: Duration,
    /// Enable statement caching
    pub statement_cache_size: usize,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
    /// Host to bind to
    pub host: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// How long an issued session token stays valid
    pub session_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore if not found)
        dotenvy::dotenv().ok();

        let config = Self {
            store: StoreConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            api: ApiConfig::from_env()?,
            auth: AuthConfig::from_env()?,
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Postgres && self.database.url.is_empty() {
            return Err(Error::InvalidConfig {
                key: "DATABASE_URL",
                message: "DATABASE_URL cannot be empty with the postgres store".into(),
            });
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                message: "max_connections must be >= min_connections".into(),
            });
        }

        if self.auth.session_ttl.is_zero() {
            return Err(Error::InvalidConfig {
                key: "SESSION_TTL_SECS",
                message: "session TTL must be positive".into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary (without sensitive data)
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Store: {:?}", self.store.backend);
        if self.store.backend == StoreBackend::Postgres {
            info!("  Database:");
            info!("    URL: {}", mask_url(&self.database.url));
            info!(
                "    Pool Size: {}-{}",
                self.database.min_connections, self.database.max_connections
            );
        }
        info!("  API:");
        info!("    Listening on: {}:{}", self.api.host, self.api.port);
        info!("    Request timeout: {:?}", self.api.request_timeout);
        info!("  Sessions:");
        info!("    TTL: {:?}", self.auth.session_ttl);
    }

    /// In-memory configuration for tests and local tooling
    pub fn for_memory() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                run_migrations: false,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 5,
                min_connections: 1,
                connect_timeout: Duration::from_secs(5),
                idle_timeout: Duration::from_secs(60),
                max_lifetime: Duration::from_secs(300),
                statement_cache_size: 10,
            },
            api: ApiConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                request_timeout: Duration::from_secs(30),
                max_body_size: 1024 * 1024,
                cors_enabled: false,
            },
            auth: AuthConfig {
                session_ttl: Duration::from_secs(3600),
            },
        }
    }
}

impl StoreConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            backend: get_env_or("STORE_BACKEND", "memory").parse()?,
            run_migrations: get_env_or("DB_RUN_MIGRATIONS", "true")
                .parse()
                .unwrap_or(true),
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = get_env("DATABASE_URL").unwrap_or_else(|_| {
            let user = std::env::var("USER").unwrap_or_else(|_| "postgres".to_string());
            format!("postgres://{}@localhost/socialgraph_dev", user)
        });

        Ok(Self {
            url,
            max_connections: get_env_or("DB_MAX_CONNECTIONS", "20").parse().unwrap_or(20),
            min_connections: get_env_or("DB_MIN_CONNECTIONS", "2").parse().unwrap_or(2),
            connect_timeout: Duration::from_secs(
                get_env_or("DB_CONNECT_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            idle_timeout: Duration::from_secs(
                get_env_or("DB_IDLE_TIMEOUT_SECS", "600")
                    .parse()
                    .unwrap_or(600),
            ),
            max_lifetime: Duration::from_secs(
                get_env_or("DB_MAX_LIFETIME_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
            ),
            statement_cache_size: get_env_or("DB_STATEMENT_CACHE_SIZE", "100")
                .parse()
                .unwrap_or(100),
        })
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            port: get_env_parsed_or("API_PORT", 8080)?,
            host: get_env_or("API_HOST", "0.0.0.0"),
            request_timeout: Duration::from_secs(
                get_env_or("API_REQUEST_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            max_body_size: get_env_or("API_MAX_BODY_SIZE", "1048576")
                .parse()
                .unwrap_or(1024 * 1024),
            cors_enabled: get_env_or("API_CORS_ENABLED", "true")
                .parse()
                .unwrap_or(true),
        })
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            session_ttl: Duration::from_secs(get_env_parsed_or(
                "SESSION_TTL_SECS",
                7 * 24 * 3600,
            )?),
        })
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get required environment variable
fn get_env(key: &'static str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnvVar { var: key })
}

/// Get environment variable with default
fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, rejecting malformed values
fn get_env_parsed_or<T: FromStr>(key: &'static str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|e: T::Err| Error::InvalidConfig {
            key,
            message: format!("Invalid value '{}': {}", value, e).into(),
        }),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive parts of URL
fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            // scheme separator, not a password
            if url[colon_pos..].starts_with("://") {
                return url.to_string();
            }
            let (before, after) = url.split_at(colon_pos + 1);
            let (_, rest) = after.split_at(at_pos - colon_pos - 1);
            return format!("{}****{}", before, rest);
        }
    }
    url.to_string()
}
