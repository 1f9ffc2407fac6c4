//! Shared retry-with-backoff policy (§4.A) reused verbatim by the Pool
//! Façade's retry executor and the Publishing Fanout's per-unit retry (§4.G).
//!
//! Delay sequence: `dₙ₊₁ = min(max_delay, dₙ·backoff_factor) + U(0, dₙ·jitter_factor)`.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter_factor: f64,
}

impl RetryPolicy {
    /// Defaults for the Pool Façade's retry executor (§4.A has no stated
    /// numeric defaults beyond the parameter names; these follow the
    /// Publishing Fanout's own stated defaults at 4.G.6 scaled up for a
    /// longer-lived connection attempt).
    pub fn pool_default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }

    /// Defaults stated explicitly in §4.G.6 for the publishing fanout retry.
    pub fn publish_default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }

    /// Grow the base delay for the next retry: `min(max_delay, dₙ·backoff_factor)`.
    /// Does not include jitter — call `jittered` on the result before sleeping.
    pub fn advance(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.backoff_factor;
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Apply `U(0, base·jitter_factor)` jitter to a base delay.
    pub fn jittered(&self, base: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return base;
        }
        let max_jitter = base.as_secs_f64() * self.jitter_factor;
        let jitter = if max_jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..max_jitter)
        } else {
            0.0
        };
        Duration::from_secs_f64(base.as_secs_f64() + jitter)
    }

    /// Honor an explicit `Retry-After` hint (seconds) over the computed delay,
    /// as required by §4.G.6 for 429/5xx responses that carry the header.
    pub fn respect_retry_after(&self, computed: Duration, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs {
            Some(secs) => Duration::from_secs(secs),
            None => computed,
        }
    }
}

/// Retryable error classes recognized by the Pool Façade's retry executor
/// (§4.A), and the taxonomy every transient storage error is classified
/// into before a caller decides whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientErrorKind {
    ConnectionFailure,
    SerializationFailure,
    DeadlockDetected,
    TooManyConnections,
    AdminShutdown,
    CrashShutdown,
    CannotConnectNow,
    Timeout,
}

impl TransientErrorKind {
    /// Classify a Postgres `SQLSTATE` code into the retryable taxonomy.
    /// Codes not recognized here are treated as permanent (not retryable).
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            "08000" | "08003" | "08006" | "08001" => Some(Self::ConnectionFailure),
            "08004" | "57P03" => Some(Self::CannotConnectNow),
            "40001" => Some(Self::SerializationFailure),
            "40P01" => Some(Self::DeadlockDetected),
            "53300" => Some(Self::TooManyConnections),
            "57P01" => Some(Self::AdminShutdown),
            "57P02" => Some(Self::CrashShutdown),
            _ => None,
        }
    }
}
