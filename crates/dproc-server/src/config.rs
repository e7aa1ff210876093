//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default lifetime of staged cache entries, in hours.
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 1;

/// Default interval between expired-entry sweeps, in seconds.
pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default number of validation requests processed at once.
pub const DEFAULT_VALIDATION_CONCURRENCY: usize = 4;

/// Default capacity of each in-process event queue.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Default record path used for category counts.
pub const DEFAULT_CATEGORY_PATH: &str = "$.category";

/// Default timeout for fetching metric definitions, in seconds.
pub const DEFAULT_METRICS_TIMEOUT_SECS: u64 = 10;

/// Default sliding expiration of memoised metric definitions, in seconds (10 minutes).
pub const DEFAULT_METRICS_CACHE_TTL_SECS: u64 = 600;

/// Default number of write attempts per destination.
pub const DEFAULT_OUTPUT_MAX_ATTEMPTS: u32 = 3;

/// Default first retry delay in milliseconds; doubles on every retry.
pub const DEFAULT_OUTPUT_BASE_DELAY_MS: u64 = 1000;

/// Default consecutive failures before a destination's breaker opens.
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 5;

/// Default breaker cool-down in seconds.
pub const DEFAULT_BREAKER_RESET_SECS: u64 = 30;

/// Default dead-letter directory.
pub const DEFAULT_DEAD_LETTER_DIR: &str = "./dead-letter";

/// Default Kafka bootstrap servers.
pub const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";

/// Default locale of the validation message catalog.
pub const DEFAULT_CATALOG_LOCALE: &str = "en";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub cache: CacheConfig,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    pub catalog: CatalogConfig,
    /// JSON file with the data source definitions loaded at start-up.
    pub datasources_file: Option<PathBuf>,
    /// Present only when `DATABASE_URL` is set.
    pub database: Option<DatabaseConfig>,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Staging cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_hours: u64,
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

/// Validation run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub concurrency: usize,
    pub queue_capacity: usize,
    pub category_path: String,
    pub metrics_timeout_secs: u64,
    pub metrics_cache_ttl_secs: u64,
    /// JSON file with metric definitions served by the local definition source.
    pub metrics_file: Option<PathBuf>,
}

/// Output dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub breaker_threshold: u32,
    pub breaker_reset_secs: u64,
    pub dead_letter_dir: PathBuf,
    pub kafka_brokers: String,
}

/// Message catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub locale: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("DPROC_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("DPROC_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "DPROC_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", false),
            },
            cache: CacheConfig {
                ttl_hours: env_or("CACHE_TTL_HOURS", DEFAULT_CACHE_TTL_HOURS),
                sweep_interval_secs: env_or(
                    "CACHE_SWEEP_INTERVAL_SECS",
                    DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
                ),
            },
            validation: ValidationConfig {
                concurrency: env_or("VALIDATION_CONCURRENCY", DEFAULT_VALIDATION_CONCURRENCY),
                queue_capacity: env_or("EVENT_QUEUE_CAPACITY", DEFAULT_EVENT_QUEUE_CAPACITY),
                category_path: std::env::var("METRICS_CATEGORY_PATH")
                    .unwrap_or_else(|_| DEFAULT_CATEGORY_PATH.to_string()),
                metrics_timeout_secs: env_or(
                    "METRICS_DEFINITION_TIMEOUT_SECS",
                    DEFAULT_METRICS_TIMEOUT_SECS,
                ),
                metrics_cache_ttl_secs: env_or(
                    "METRICS_DEFINITION_CACHE_SECS",
                    DEFAULT_METRICS_CACHE_TTL_SECS,
                ),
                metrics_file: env_path("METRICS_DEFINITIONS_FILE"),
            },
            output: OutputConfig {
                max_attempts: env_or("OUTPUT_MAX_ATTEMPTS", DEFAULT_OUTPUT_MAX_ATTEMPTS),
                base_delay_ms: env_or("OUTPUT_BASE_DELAY_MS", DEFAULT_OUTPUT_BASE_DELAY_MS),
                breaker_threshold: env_or("OUTPUT_BREAKER_THRESHOLD", DEFAULT_BREAKER_THRESHOLD),
                breaker_reset_secs: env_or("OUTPUT_BREAKER_RESET_SECS", DEFAULT_BREAKER_RESET_SECS),
                dead_letter_dir: env_path("DEAD_LETTER_DIR")
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DEAD_LETTER_DIR)),
                kafka_brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| DEFAULT_KAFKA_BROKERS.to_string()),
            },
            catalog: CatalogConfig {
                locale: std::env::var("CATALOG_LOCALE")
                    .unwrap_or_else(|_| DEFAULT_CATALOG_LOCALE.to_string()),
            },
            datasources_file: env_path("DATASOURCES_FILE"),
            database: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(|url| DatabaseConfig {
                    url,
                    max_connections: env_or(
                        "DATABASE_MAX_CONNECTIONS",
                        DEFAULT_DATABASE_MAX_CONNECTIONS,
                    ),
                    connect_timeout_secs: env_or(
                        "DATABASE_CONNECT_TIMEOUT",
                        DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                    ),
                }),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.cache.ttl_hours == 0 {
            anyhow::bail!("CACHE_TTL_HOURS must be greater than 0");
        }

        if self.validation.concurrency == 0 {
            anyhow::bail!("VALIDATION_CONCURRENCY must be greater than 0");
        }

        if self.validation.queue_capacity == 0 {
            anyhow::bail!("EVENT_QUEUE_CAPACITY must be greater than 0");
        }

        if self.output.max_attempts == 0 {
            anyhow::bail!("OUTPUT_MAX_ATTEMPTS must be at least 1");
        }

        if self.output.breaker_threshold == 0 {
            anyhow::bail!("OUTPUT_BREAKER_THRESHOLD must be at least 1");
        }

        if let Some(database) = &self.database {
            if database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: false,
            },
            cache: CacheConfig {
                ttl_hours: DEFAULT_CACHE_TTL_HOURS,
                sweep_interval_secs: DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
            },
            validation: ValidationConfig {
                concurrency: DEFAULT_VALIDATION_CONCURRENCY,
                queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
                category_path: DEFAULT_CATEGORY_PATH.to_string(),
                metrics_timeout_secs: DEFAULT_METRICS_TIMEOUT_SECS,
                metrics_cache_ttl_secs: DEFAULT_METRICS_CACHE_TTL_SECS,
                metrics_file: None,
            },
            output: OutputConfig {
                max_attempts: DEFAULT_OUTPUT_MAX_ATTEMPTS,
                base_delay_ms: DEFAULT_OUTPUT_BASE_DELAY_MS,
                breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
                breaker_reset_secs: DEFAULT_BREAKER_RESET_SECS,
                dead_letter_dir: PathBuf::from(DEFAULT_DEAD_LETTER_DIR),
                kafka_brokers: DEFAULT_KAFKA_BROKERS.to_string(),
            },
            catalog: CatalogConfig {
                locale: DEFAULT_CATALOG_LOCALE.to_string(),
            },
            datasources_file: None,
            database: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.output.breaker_threshold, 5);
        assert_eq!(config.output.base_delay_ms, 1000);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = Config::default();
        config.output.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.validation.concurrency = 0;
        assert!(config.validate().is_err());
    }
}
