//! Health loop (§4.A): periodic `SELECT 1` with a 5s per-check deadline.
//! Non-fatal failures do not close the pool.
//!
//! §9 flags cyclic pool/health-checker ownership in the source. This
//! implementation uses a pull model instead: the checker is parameterized by
//! a ping closure supplied by the pool at construction time, not a
//! back-reference to the pool.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::PoolError;

pub type PingFuture = Pin<Box<dyn Future<Output = Result<(), PoolError>> + Send>>;
pub type PingFn = Arc<dyn Fn() -> PingFuture + Send + Sync>;

pub struct PoolHealthChecker {
    ping: PingFn,
    period: Duration,
    last_healthy: Arc<AtomicBool>,
}

impl PoolHealthChecker {
    pub fn new(ping: PingFn, period: Duration) -> Self {
        Self {
            ping,
            period,
            last_healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.last_healthy.load(Ordering::SeqCst)
    }

    /// Run one health check iteration with a 5s deadline, recording the
    /// outcome through the `metrics` facade.
    pub async fn check_once(&self) -> bool {
        let ping = self.ping.clone();
        let deadline = Duration::from_secs(5);
        let healthy = match timeout(deadline, ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "pool health check failed");
                false
            }
            Err(_) => {
                warn!("pool health check timed out after 5s");
                false
            }
        };

        self.last_healthy.store(healthy, Ordering::SeqCst);
        metrics::counter!("pool_health_checks_total", "result" => if healthy { "ok" } else { "fail" }).increment(1);
        healthy
    }

    /// Spawn the periodic loop. The returned handle can be aborted to stop it.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            loop {
                interval.tick().await;
                let healthy = self.check_once().await;
                debug!(healthy, "pool health check tick");
            }
        })
    }
}
