//! Pool façade (§4.A): a Postgres connection pool wrapped with a connection
//! state machine, a circuit breaker and a retry executor so every database
//! call goes through the same backoff and failure-accounting discipline.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ah_common::RetryPolicy;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Postgres, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::{PoolError, Result};
use crate::health::{PingFuture, PoolHealthChecker};
use crate::retry_executor;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: String,
    pub max_conns: u32,
    pub min_conns: u32,
    pub max_conn_lifetime: Duration,
    pub max_conn_idle: Duration,
    pub health_check_period: Duration,
    pub connect_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Raw, unvalidated field set. `PoolConfig` is only constructible through
/// `TryFrom<PoolConfigRequest>` so `PoolError::InvalidConfig` is unrepresentable
/// once a `PoolConfig` exists.
#[derive(Debug, Clone)]
pub struct PoolConfigRequest {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: String,
    pub max_conns: u32,
    pub min_conns: u32,
    pub max_conn_lifetime_secs: u64,
    pub max_conn_idle_secs: u64,
    pub health_check_period_secs: u64,
    pub connect_timeout_secs: u64,
    pub retry_policy: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl TryFrom<PoolConfigRequest> for PoolConfig {
    type Error = PoolError;

    fn try_from(req: PoolConfigRequest) -> Result<Self> {
        if req.host.trim().is_empty() {
            return Err(PoolError::InvalidConfig("host must not be empty".into()));
        }
        if req.database.trim().is_empty() {
            return Err(PoolError::InvalidConfig("database must not be empty".into()));
        }
        if req.max_conns == 0 {
            return Err(PoolError::InvalidConfig("max_conns must be >= 1".into()));
        }
        if req.min_conns > req.max_conns {
            return Err(PoolError::InvalidConfig(
                "min_conns must not exceed max_conns".into(),
            ));
        }

        Ok(Self {
            host: req.host,
            port: req.port,
            database: req.database,
            user: req.user,
            password: req.password,
            ssl_mode: req.ssl_mode,
            max_conns: req.max_conns,
            min_conns: req.min_conns,
            max_conn_lifetime: Duration::from_secs(req.max_conn_lifetime_secs),
            max_conn_idle: Duration::from_secs(req.max_conn_idle_secs),
            health_check_period: Duration::from_secs(req.health_check_period_secs),
            connect_timeout: Duration::from_secs(req.connect_timeout_secs),
            retry_policy: req.retry_policy,
            circuit_breaker: req.circuit_breaker,
        })
    }
}

impl PoolConfig {
    fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = match self.ssl_mode.as_str() {
            "require" => sqlx::postgres::PgSslMode::Require,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            _ => sqlx::postgres::PgSslMode::Disable,
        };
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(ssl_mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl From<u8> for ConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl From<ConnectionState> for u8 {
    fn from(s: ConnectionState) -> Self {
        match s {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closed => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub in_use: u32,
}

struct Shared {
    state: AtomicU8,
    config: PoolConfig,
    pg: tokio::sync::RwLock<Option<sqlx::PgPool>>,
    breaker: CircuitBreaker,
}

/// The Alert Pool façade. Cheap to clone — internally reference-counted.
#[derive(Clone)]
pub struct AlertPool {
    shared: Arc<Shared>,
    health: Option<Arc<PoolHealthChecker>>,
}

impl AlertPool {
    pub fn new(config: PoolConfig) -> Self {
        let breaker = CircuitBreaker::new(config.circuit_breaker);
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(ConnectionState::Disconnected.into()),
                config,
                pg: tokio::sync::RwLock::new(None),
                breaker,
            }),
            health: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.load(Ordering::SeqCst).into()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn set_state(&self, state: ConnectionState) {
        self.shared.state.store(state.into(), Ordering::SeqCst);
    }

    /// Establish the pool and spawn the periodic health loop. Idempotent —
    /// calling `connect` on an already-connected pool is a no-op.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting);

        let config = &self.shared.config;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_conns)
            .min_connections(config.min_conns)
            .max_lifetime(config.max_conn_lifetime)
            .idle_timeout(config.max_conn_idle)
            .acquire_timeout(config.connect_timeout)
            .connect_with(config.connect_options())
            .await
            .map_err(|err| {
                self.set_state(ConnectionState::Disconnected);
                PoolError::Database(err)
            })?;

        *self.shared.pg.write().await = Some(pool);
        self.set_state(ConnectionState::Connected);

        let shared = self.shared.clone();
        let ping: Arc<dyn Fn() -> PingFuture + Send + Sync> = Arc::new(move || {
            let shared = shared.clone();
            Box::pin(async move {
                let guard = shared.pg.read().await;
                match guard.as_ref() {
                    Some(pool) => sqlx::query("SELECT 1")
                        .execute(pool)
                        .await
                        .map(|_| ())
                        .map_err(PoolError::Database),
                    None => Err(PoolError::ConnectionClosed),
                }
            })
        });

        let checker = Arc::new(PoolHealthChecker::new(ping, config.health_check_period));
        checker.clone().spawn();
        self.health = Some(checker);

        info!("alert pool connected");
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(pool) = self.shared.pg.write().await.take() {
            pool.close().await;
        }
        self.health = None;
        self.set_state(ConnectionState::Closed);
    }

    /// Last health check result, or `false` if the pool has never run one
    /// (and is therefore not yet proven healthy).
    pub fn health(&self) -> bool {
        self.health.as_ref().map(|h| h.is_healthy()).unwrap_or(false)
    }

    async fn handle(&self) -> Result<sqlx::PgPool> {
        if !self.shared.breaker.allow_request() {
            return Err(PoolError::CircuitBreakerOpen);
        }
        let guard = self.shared.pg.read().await;
        guard.clone().ok_or(PoolError::ConnectionClosed)
    }

    fn record(&self, result: &Result<impl Sized>) {
        match result {
            Ok(_) => self.shared.breaker.record_success(),
            Err(_) => self.shared.breaker.record_failure(),
        }
    }

    async fn with_retry<T, F, Fut>(&self, cancel: &CancellationToken, op: F) -> Result<T>
    where
        F: Fn(sqlx::PgPool) -> Fut,
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        let pool = self.handle().await?;
        let result = retry_executor::execute(&self.shared.config.retry_policy, cancel, || op(pool.clone())).await;
        self.record(&result);
        result
    }

    pub async fn execute(&self, cancel: &CancellationToken, sql: &str) -> Result<u64> {
        let sql = sql.to_string();
        self.with_retry(cancel, |pool| {
            let sql = sql.clone();
            async move { sqlx::query(&sql).execute(&pool).await.map(|r| r.rows_affected()) }
        })
        .await
    }

    pub async fn query(&self, cancel: &CancellationToken, sql: &str) -> Result<Vec<PgRow>> {
        let sql = sql.to_string();
        self.with_retry(cancel, |pool| {
            let sql = sql.clone();
            async move { sqlx::query(&sql).fetch_all(&pool).await }
        })
        .await
    }

    pub async fn query_row(&self, cancel: &CancellationToken, sql: &str) -> Result<Option<PgRow>> {
        let sql = sql.to_string();
        self.with_retry(cancel, |pool| {
            let sql = sql.clone();
            async move { sqlx::query(&sql).fetch_optional(&pool).await }
        })
        .await
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let pool = self.handle().await?;
        pool.begin().await.map_err(PoolError::Database)
    }

    pub fn stats(&self) -> PoolStats {
        match self.shared.pg.try_read().ok().and_then(|g| g.clone()) {
            Some(pool) => {
                let size = pool.size();
                let idle = pool.num_idle() as u32;
                PoolStats { size, idle, in_use: size.saturating_sub(idle) }
            }
            None => PoolStats::default(),
        }
    }

    pub fn raw(&self) -> Option<sqlx::PgPool> {
        self.shared.pg.try_read().ok().and_then(|g| g.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> PoolConfigRequest {
        PoolConfigRequest {
            host: "localhost".into(),
            port: 5432,
            database: "alert_history".into(),
            user: "alert_history".into(),
            password: "".into(),
            ssl_mode: "disable".into(),
            max_conns: 20,
            min_conns: 2,
            max_conn_lifetime_secs: 1800,
            max_conn_idle_secs: 600,
            health_check_period_secs: 30,
            connect_timeout_secs: 5,
            retry_policy: crate::retry_executor::default_policy(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }

    #[test]
    fn rejects_empty_host() {
        let mut req = base_request();
        req.host = "".into();
        assert!(PoolConfig::try_from(req).is_err());
    }

    #[test]
    fn rejects_min_conns_above_max() {
        let mut req = base_request();
        req.min_conns = 100;
        assert!(PoolConfig::try_from(req).is_err());
    }

    #[test]
    fn valid_config_constructs_pool_in_disconnected_state() {
        let config = PoolConfig::try_from(base_request()).unwrap();
        let pool = AlertPool::new(config);
        assert_eq!(pool.state(), ConnectionState::Disconnected);
        assert!(!pool.is_connected());
    }
}
