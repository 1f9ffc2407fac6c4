//! Alert-history configuration system.
//!
//! TOML configuration with environment variable override support, matching
//! the three-stage precedence of the platform this crate is descended from:
//! compiled-in defaults → TOML file → environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub pool: PoolConfig,
    pub classification: ClassificationConfig,
    pub publish: PublishConfig,
    pub matcher: MatcherConfig,
    pub ingest: IngestConfig,

    /// Enable development mode (relaxed SSRF guard, in-memory L2/LLM fakes).
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            postgres: PostgresConfig::default(),
            redis: RedisConfig::default(),
            pool: PoolConfig::default(),
            classification: ClassificationConfig::default(),
            publish: PublishConfig::default(),
            matcher: MatcherConfig::default(),
            ingest: IngestConfig::default(),
            dev_mode: false,
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Connection config recognized by the Pool Façade (§4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// One of `disable`, `require`, `verify-ca`, `verify-full`.
    pub ssl_mode: String,
    pub max_conns: u32,
    pub min_conns: u32,
    pub max_conn_lifetime_secs: u64,
    pub max_conn_idle_secs: u64,
    pub health_check_period_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "alert_history".to_string(),
            user: "alert_history".to_string(),
            password: String::new(),
            ssl_mode: "disable".to_string(),
            max_conns: 20,
            min_conns: 2,
            max_conn_lifetime_secs: 1800,
            max_conn_idle_secs: 600,
            health_check_period_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

/// Retry executor + circuit breaker tunables shared between the Pool Façade
/// and the Publishing Fanout (§4.A, §4.G.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub max_failures: u32,
    pub reset_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig {
                max_retries: 5,
                initial_delay_ms: 200,
                max_delay_ms: 10_000,
                backoff_factor: 2.0,
                jitter_factor: 0.1,
            },
            circuit_breaker: CircuitBreakerConfig {
                max_failures: 5,
                reset_timeout_secs: 30,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub llm_url: String,
    pub llm_timeout_ms: u64,
    pub l2_ttl_secs: u64,
    pub batch_concurrency: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            llm_url: "http://localhost:9000/v1/classify".to_string(),
            llm_timeout_ms: 2_000,
            l2_ttl_secs: 3_600,
            batch_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub worker_pool_size: usize,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub unit_timeout_ms: u64,
    /// Allow private/loopback/link-local target URLs (development only).
    pub allow_private_targets: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 32,
            retry: RetryConfig {
                max_retries: 3,
                initial_delay_ms: 100,
                max_delay_ms: 5_000,
                backoff_factor: 2.0,
                jitter_factor: 0.1,
            },
            circuit_breaker: CircuitBreakerConfig {
                max_failures: 10,
                reset_timeout_secs: 30,
            },
            unit_timeout_ms: 10_000,
            allow_private_targets: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub regex_cache_max_size: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { regex_cache_max_size: 1_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_parallelism: usize,
    pub sync_classification: bool,
    pub retention_days: i64,
    pub db_query_timeout_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_parallelism: 16,
            sync_classification: true,
            retention_days: 90,
            db_query_timeout_ms: 5_000,
        }
    }
}
