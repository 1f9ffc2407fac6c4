//! Configuration loader with file and environment variable support.

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "alert-history.toml",
    "./config/config.toml",
    "/etc/alert-history/config.toml",
];

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("AH_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) {
        if let Ok(val) = env::var("AH_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }
        if let Ok(val) = env::var("AH_HTTP_HOST") {
            config.http.host = val;
        }
        if let Ok(val) = env::var("AH_CORS_ORIGINS") {
            config.http.cors_origins = val.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(val) = env::var("AH_POSTGRES_HOST") {
            config.postgres.host = val;
        }
        if let Ok(val) = env::var("AH_POSTGRES_PORT") {
            if let Ok(port) = val.parse() {
                config.postgres.port = port;
            }
        }
        if let Ok(val) = env::var("AH_POSTGRES_DATABASE") {
            config.postgres.database = val;
        }
        if let Ok(val) = env::var("AH_POSTGRES_USER") {
            config.postgres.user = val;
        }
        if let Ok(val) = env::var("AH_POSTGRES_PASSWORD") {
            config.postgres.password = val;
        }
        if let Ok(val) = env::var("AH_POSTGRES_SSL_MODE") {
            config.postgres.ssl_mode = val;
        }
        if let Ok(val) = env::var("AH_POSTGRES_MAX_CONNS") {
            if let Ok(n) = val.parse() {
                config.postgres.max_conns = n;
            }
        }

        if let Ok(val) = env::var("AH_REDIS_URL") {
            config.redis.url = val;
        }

        if let Ok(val) = env::var("AH_CLASSIFICATION_LLM_URL") {
            config.classification.llm_url = val;
        }
        if let Ok(val) = env::var("AH_CLASSIFICATION_LLM_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                config.classification.llm_timeout_ms = ms;
            }
        }
        if let Ok(val) = env::var("AH_CLASSIFICATION_BATCH_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.classification.batch_concurrency = n;
            }
        }

        if let Ok(val) = env::var("AH_PUBLISH_WORKER_POOL_SIZE") {
            if let Ok(n) = val.parse() {
                config.publish.worker_pool_size = n;
            }
        }
        if let Ok(val) = env::var("AH_PUBLISH_ALLOW_PRIVATE_TARGETS") {
            config.publish.allow_private_targets = val.parse().unwrap_or(false);
        }

        if let Ok(val) = env::var("AH_MATCHER_REGEX_CACHE_MAX_SIZE") {
            if let Ok(n) = val.parse() {
                config.matcher.regex_cache_max_size = n;
            }
        }

        if let Ok(val) = env::var("AH_INGEST_BATCH_PARALLELISM") {
            if let Ok(n) = val.parse() {
                config.ingest.batch_parallelism = n;
            }
        }
        if let Ok(val) = env::var("AH_INGEST_SYNC_CLASSIFICATION") {
            config.ingest.sync_classification = val.parse().unwrap_or(true);
        }
        if let Ok(val) = env::var("AH_INGEST_RETENTION_DAYS") {
            if let Ok(n) = val.parse() {
                config.ingest.retention_days = n;
            }
        }

        if let Ok(val) = env::var("AH_DEV_MODE") {
            config.dev_mode = val.parse().unwrap_or(false);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
