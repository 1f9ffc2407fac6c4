//! Alert History Server
//!
//! Production entrypoint wiring the Pool Façade, Alert Store, Classification
//! Engine, Silence Matcher, Target Registry, Publishing Fanout, and Ingest
//! Orchestrator into one HTTP service.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AH_CONFIG` | - | Path to a TOML config file, overriding the built-in search list |
//! | `AH_HTTP_PORT` | `8080` | HTTP port |
//! | `AH_RECEIVERS_CONFIG` | `receivers.json` | Path to a JSON array of receiver configs |
//! | `RUST_LOG` | `info` | Log level |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//!
//! See `ah-config`'s `ConfigLoader` for the full list of `AH_*` overrides
//! applied on top of the TOML file.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use ah_classify::{ClassificationEngine, HttpLlmClient, RedisL2Cache};
use ah_common::{Receiver, RetryPolicy};
use ah_config::ConfigLoader;
use ah_ingest::{AllReceiversRouter, AppState, InMemorySilenceSource, Orchestrator, OrchestratorConfig};
use ah_matcher::{RegexCache, SilenceMatcher};
use ah_pool::{AlertPool, CircuitBreakerConfig as PoolBreakerConfig, PoolConfigRequest};
use ah_publish::{Publisher, PublisherConfig};
use ah_store::{AlertStore, PgAlertStore};
use ah_targets::TargetRegistry;

fn retry_policy(cfg: &ah_config::RetryConfig) -> RetryPolicy {
    RetryPolicy {
        max_retries: cfg.max_retries,
        initial_delay: Duration::from_millis(cfg.initial_delay_ms),
        max_delay: Duration::from_millis(cfg.max_delay_ms),
        backoff_factor: cfg.backoff_factor,
        jitter_factor: cfg.jitter_factor,
    }
}

fn breaker_config(cfg: &ah_config::CircuitBreakerConfig) -> PoolBreakerConfig {
    PoolBreakerConfig { max_failures: cfg.max_failures, reset_timeout: Duration::from_secs(cfg.reset_timeout_secs) }
}

/// Loads the receiver set that populates the Target Registry. The validated
/// routing-tree/receiver-config parser is out of scope for this service; a
/// deployment supplies a flat JSON array of already-valid `Receiver` records
/// instead. Missing file is treated as "no receivers configured yet".
fn load_receivers(path: &str) -> Result<Vec<Receiver>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let receivers: Vec<Receiver> = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse receivers config at {path}"))?;
            Ok(receivers)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path, "receivers config not found, starting with an empty target registry");
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read receivers config at {path}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    ah_common::logging::init_logging("ah-server");
    info!("starting alert-history server");

    let recorder_handle = PrometheusBuilder::new().install_recorder().context("failed to install Prometheus recorder")?;

    let config = ConfigLoader::new().load().context("failed to load configuration")?;

    let pool_request = PoolConfigRequest {
        host: config.postgres.host.clone(),
        port: config.postgres.port,
        database: config.postgres.database.clone(),
        user: config.postgres.user.clone(),
        password: config.postgres.password.clone(),
        ssl_mode: config.postgres.ssl_mode.clone(),
        max_conns: config.postgres.max_conns,
        min_conns: config.postgres.min_conns,
        max_conn_lifetime_secs: config.postgres.max_conn_lifetime_secs,
        max_conn_idle_secs: config.postgres.max_conn_idle_secs,
        health_check_period_secs: config.postgres.health_check_period_secs,
        connect_timeout_secs: config.postgres.connect_timeout_secs,
        retry_policy: retry_policy(&config.pool.retry),
        circuit_breaker: breaker_config(&config.pool.circuit_breaker),
    };
    let mut pool = AlertPool::new(pool_request.try_into().context("invalid postgres pool configuration")?);
    pool.connect().await.context("failed to connect to postgres")?;
    info!("connected to postgres");

    let store: Arc<dyn AlertStore> = {
        let pg_store = PgAlertStore::from_pool(&pool).context("failed to build alert store from pool")?;
        pg_store.run_migrations().await.context("failed to run migrations")?;
        Arc::new(pg_store)
    };

    let l2_cache = RedisL2Cache::connect(&config.redis.url, "ah:classify:").await.context("failed to connect to redis")?;
    let llm_client = Arc::new(HttpLlmClient::new(config.classification.llm_url.clone(), true));
    let classifier = Arc::new(ClassificationEngine::new(
        Arc::new(l2_cache),
        llm_client,
        Duration::from_millis(config.classification.llm_timeout_ms),
        Duration::from_secs(config.classification.l2_ttl_secs),
        config.classification.batch_concurrency,
    ));

    let matcher = Arc::new(SilenceMatcher::new(Arc::new(RegexCache::new(config.matcher.regex_cache_max_size))));
    let silences = Arc::new(InMemorySilenceSource::default());

    let receivers_path = std::env::var("AH_RECEIVERS_CONFIG").unwrap_or_else(|_| "receivers.json".to_string());
    let receivers = load_receivers(&receivers_path)?;
    let registry = Arc::new(TargetRegistry::new(receivers).context("invalid receivers config")?);
    let router = Arc::new(AllReceiversRouter::new(registry.clone()));

    let publisher = Arc::new(Publisher::new(
        registry,
        store.clone(),
        PublisherConfig {
            worker_pool_size: config.publish.worker_pool_size,
            retry: retry_policy(&config.publish.retry),
            circuit_breaker: breaker_config(&config.publish.circuit_breaker),
            unit_timeout: Duration::from_millis(config.publish.unit_timeout_ms),
            allow_private_targets: config.publish.allow_private_targets || config.dev_mode,
        },
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        classifier,
        matcher,
        silences,
        router,
        publisher,
        OrchestratorConfig {
            batch_parallelism: config.ingest.batch_parallelism,
            sync_classification: config.ingest.sync_classification,
        },
    ));

    let app_state = AppState { orchestrator, store, metrics_handle: recorder_handle };
    let app = ah_ingest::app_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse().context("invalid http.host/http.port")?;
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind http listener")?;

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("http server failed")?;

    info!("alert-history server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
