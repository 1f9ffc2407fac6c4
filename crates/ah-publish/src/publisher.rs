//! Publishing Fanout entry point (§4.G): `Publish(ctx, alert, receiver_names)
//! -> PublishReport`. Generalized from the teacher's bounded worker-pool
//! idiom (`fc-router/src/pool.rs`'s `Semaphore`-gated dispatch) onto
//! independent per-unit tasks instead of per-group FIFO queues, since
//! dispatch units here have no inter-unit ordering requirement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use ah_common::{Alert, AttemptStatus, Classification, PublishingAttempt, RetryPolicy, TargetType};
use ah_pool::CircuitBreakerConfig;
use ah_store::AlertStore;
use ah_targets::TargetRegistry;

use crate::breaker_registry::{unit_key, BreakerRegistry};
use crate::dispatch::{dispatch_unit, DispatchOutcome, SIGNING_SECRET_HEADER};
use crate::report::{PublishReport, UnitOutcome, UnitResult};
use crate::ssrf_guard;

pub struct PublisherConfig {
    pub worker_pool_size: usize,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    pub unit_timeout: Duration,
    pub allow_private_targets: bool,
}

pub struct Publisher {
    client: Client,
    registry: Arc<TargetRegistry>,
    store: Arc<dyn AlertStore>,
    breakers: BreakerRegistry,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(registry: Arc<TargetRegistry>, store: Arc<dyn AlertStore>, config: PublisherConfig) -> Self {
        Self {
            client: Client::new(),
            registry,
            store,
            breakers: BreakerRegistry::new(config.circuit_breaker),
            config,
        }
    }

    pub async fn publish(
        &self,
        cancel: &CancellationToken,
        alert: &Alert,
        classification: &Classification,
        receiver_names: &[String],
    ) -> PublishReport {
        let mut units: Vec<UnitResult> = Vec::new();
        let mut tasks: Vec<(String, TargetType, usize, ah_common::DispatchConfig)> = Vec::new();

        for name in receiver_names {
            match self.registry.get(name) {
                None => {
                    self.audit_skip(alert, name, "unknown", "unknown_target").await;
                    units.push(UnitResult {
                        receiver_name: name.clone(),
                        target_type: "unknown".to_string(),
                        config_index: 0,
                        outcome: UnitOutcome::Skipped,
                        attempts: 0,
                        last_response_code: None,
                        reason: Some("unknown_target".to_string()),
                    });
                }
                Some(receiver) => {
                    for (target_type, index, dispatch_config) in receiver.dispatch_units() {
                        tasks.push((name.clone(), target_type, index, dispatch_config.clone()));
                    }
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.worker_pool_size.max(1)));
        let mut handles = Vec::with_capacity(tasks.len());

        for (receiver_name, target_type, config_index, dispatch_config) in tasks {
            if cancel.is_cancelled() {
                units.push(skipped_cancelled(&receiver_name, target_type, config_index));
                continue;
            }

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let client = self.client.clone();
            let cancel = cancel.clone();
            let breaker = self.breakers.get_or_create(&unit_key(&receiver_name, config_index));
            let alert = alert.clone();
            let classification = classification.clone();
            let retry_policy = self.config.retry;
            let unit_timeout = self.config.unit_timeout;
            let allow_private = self.config.allow_private_targets;

            let handle = tokio::spawn(async move {
                let _permit = permit;

                if let Err(e) = ssrf_guard::check(&dispatch_config.url, allow_private) {
                    return (
                        receiver_name,
                        target_type,
                        config_index,
                        None,
                        Err(e.to_string()),
                    );
                }

                let signing_secret = dispatch_config
                    .headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(SIGNING_SECRET_HEADER))
                    .map(|(_, v)| v.clone());

                let start = Instant::now();
                let outcome = dispatch_unit(
                    &client,
                    &cancel,
                    &breaker,
                    target_type,
                    &dispatch_config,
                    &alert,
                    &classification,
                    signing_secret.as_deref(),
                    &retry_policy,
                    unit_timeout,
                )
                .await;

                let health = match breaker.state() {
                    ah_pool::CircuitState::Closed => 1.0,
                    ah_pool::CircuitState::HalfOpen => 0.5,
                    ah_pool::CircuitState::Open => 0.0,
                };
                metrics::gauge!("target_health_status", "target" => receiver_name.clone()).set(health);

                (receiver_name, target_type, config_index, Some((outcome, start.elapsed())), Ok(()))
            });
            handles.push(handle);
        }

        for handle in handles {
            match handle.await {
                Ok((receiver_name, target_type, config_index, Some((outcome, elapsed)), Ok(()))) => {
                    let unit_outcome = if outcome.success {
                        UnitOutcome::Success
                    } else if outcome.reason.as_deref() == Some("breaker_open")
                        || outcome.reason.as_deref() == Some("cancelled")
                    {
                        UnitOutcome::Skipped
                    } else {
                        UnitOutcome::Failed
                    };

                    self.audit_dispatch_outcome(alert, &receiver_name, target_type, unit_outcome, &outcome, elapsed).await;

                    units.push(UnitResult {
                        receiver_name,
                        target_type: target_type_str(target_type).to_string(),
                        config_index,
                        outcome: unit_outcome,
                        attempts: outcome.attempts,
                        last_response_code: outcome.last_response_code,
                        reason: outcome.reason,
                    });
                }
                Ok((receiver_name, target_type, config_index, _, Err(reason))) => {
                    self.audit_skip(alert, &receiver_name, target_type_str(target_type), &reason).await;
                    units.push(UnitResult {
                        receiver_name,
                        target_type: target_type_str(target_type).to_string(),
                        config_index,
                        outcome: UnitOutcome::Skipped,
                        attempts: 0,
                        last_response_code: None,
                        reason: Some(reason),
                    });
                }
                Ok((receiver_name, target_type, config_index, None, _)) => {
                    units.push(skipped_cancelled(&receiver_name, target_type, config_index));
                }
                Err(join_error) => {
                    warn!(error = %join_error, "dispatch task panicked");
                }
            }
        }

        PublishReport { units }
    }

    /// Appends one `PublishingAttempt` row per HTTP try the unit made
    /// (`outcome.attempt_log`), so a unit that retries N times leaves N
    /// rows with distinct `attempt_number`s (§4.G.7). A unit skipped before
    /// any request went out (breaker open, cancelled up front) has an empty
    /// log and falls back to a single row carrying the unit-level outcome.
    async fn audit_dispatch_outcome(
        &self,
        alert: &Alert,
        receiver_name: &str,
        target_type: TargetType,
        unit_outcome: UnitOutcome,
        outcome: &DispatchOutcome,
        elapsed: Duration,
    ) {
        if outcome.attempt_log.is_empty() {
            let status = match unit_outcome {
                UnitOutcome::Success => AttemptStatus::Success,
                UnitOutcome::Failed => AttemptStatus::Failed,
                UnitOutcome::Skipped => AttemptStatus::Skipped,
            };
            self.append_attempt_row(
                alert,
                receiver_name,
                target_type,
                status,
                outcome.attempts,
                outcome.last_response_code,
                outcome.reason.clone(),
                outcome.payload_size,
                elapsed,
            )
            .await;
            return;
        }

        for record in &outcome.attempt_log {
            let status = if record.success { AttemptStatus::Success } else { AttemptStatus::Failed };
            self.append_attempt_row(
                alert,
                receiver_name,
                target_type,
                status,
                record.attempt_number,
                record.response_code,
                record.reason.clone(),
                outcome.payload_size,
                record.elapsed,
            )
            .await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_attempt_row(
        &self,
        alert: &Alert,
        receiver_name: &str,
        target_type: TargetType,
        status: AttemptStatus,
        attempt_number: u32,
        response_code: Option<i32>,
        reason: Option<String>,
        payload_size: i64,
        elapsed: Duration,
    ) {
        let status_label = match status {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Skipped => "skipped",
        };
        metrics::counter!("publishing_attempts_total", "target" => receiver_name.to_string(), "status" => status_label).increment(1);

        let attempt = PublishingAttempt {
            alert_fingerprint: alert.fingerprint.clone(),
            target_name: receiver_name.to_string(),
            target_type: target_type_str(target_type).to_string(),
            status,
            attempt_number,
            response_code,
            response_message: reason.clone(),
            payload_size: Some(payload_size),
            processing_time_seconds: elapsed.as_secs_f64(),
            error_details: reason.map(|r| serde_json::json!({ "reason": r })),
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.store.append_publishing_attempt(attempt).await {
            warn!(error = %e, "failed to persist publishing attempt");
        }
    }

    async fn audit_skip(&self, alert: &Alert, receiver_name: &str, target_type: &str, reason: &str) {
        metrics::counter!("publishing_attempts_total", "target" => receiver_name.to_string(), "status" => "skipped").increment(1);
        let attempt = PublishingAttempt::skipped(alert.fingerprint.clone(), receiver_name, target_type, reason);
        if let Err(e) = self.store.append_publishing_attempt(attempt).await {
            warn!(error = %e, "failed to persist skipped publishing attempt");
        }
    }
}

fn target_type_str(t: TargetType) -> &'static str {
    match t {
        TargetType::Webhook => "webhook",
        TargetType::Chat => "chat",
        TargetType::Incident => "incident",
        TargetType::Email => "email",
    }
}

fn skipped_cancelled(receiver_name: &str, target_type: TargetType, config_index: usize) -> UnitResult {
    UnitResult {
        receiver_name: receiver_name.to_string(),
        target_type: target_type_str(target_type).to_string(),
        config_index,
        outcome: UnitOutcome::Skipped,
        attempts: 0,
        last_response_code: None,
        reason: Some("cancelled".to_string()),
    }
}
