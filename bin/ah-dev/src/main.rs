//! Alert History Dev Monolith
//!
//! Local-iteration entrypoint wiring the same components as `ah-server`
//! except for two substitutions: `InMemoryL2Cache` stands in for Redis and
//! `FakeLlmClient` stands in for the real model endpoint, so the whole
//! ingest -> classify -> publish pipeline runs against nothing but a local
//! Postgres. The SSRF guard is relaxed (`allow_private_targets = true`) so
//! dispatch units can target `localhost` receivers during development.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use ah_classify::{ClassificationEngine, FakeLlmClient, InMemoryL2Cache};
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
    ah_common::logging::init_logging("ah-dev");
    info!("starting alert-history dev monolith (in-memory L2, fake LLM, relaxed SSRF guard)");

    let recorder_handle = PrometheusBuilder::new().install_recorder().context("failed to install Prometheus recorder")?;

    let mut config = ConfigLoader::new().load().context("failed to load configuration")?;
    config.dev_mode = true;

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

    let l2_cache = Arc::new(InMemoryL2Cache::new());
    let llm_client = Arc::new(FakeLlmClient);
    let classifier = Arc::new(ClassificationEngine::new(
        l2_cache,
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
            allow_private_targets: true,
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
    let app = ah_ingest::app_router(app_state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse().context("invalid http.host/http.port")?;
    info!(%addr, "listening (dev mode)");
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind http listener")?;

    axum::serve(listener, app).await.context("http server failed")?;

    Ok(())
}
