//! Per-unit dispatch (§4.G.5-6): payload encode, signing, HTTP POST, status
//! classification, retry-with-backoff. Generalized from the teacher's
//! `HttpMediator::mediate` retry loop (`fc-router/src/mediator.rs`) onto a
//! closed-form `ah_common::RetryPolicy` instead of a fixed delay table.

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ah_common::{Alert, Classification, DispatchConfig, RetryPolicy, TargetType};
use ah_pool::CircuitBreaker;

use crate::payload;
use crate::signing;

/// Reserved header key carrying a webhook signing secret (stripped before
/// the request is sent, never forwarded to the target). Receiver configs
/// have no dedicated signing-secret field (§6), so this is the convention
/// that `TargetRegistry`-sourced receivers use to opt a unit into signing.
pub const SIGNING_SECRET_HEADER: &str = "X-Signing-Secret";

/// One row of the per-attempt audit trail (§4.G.7): every HTTP try a unit
/// makes, success or failure, including retries, is its own record.
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub success: bool,
    pub response_code: Option<i32>,
    pub reason: Option<String>,
    pub elapsed: Duration,
}

/// The outcome of one fully-retried dispatch unit. `attempt_log` holds one
/// entry per HTTP try that was actually made; it is empty when the unit was
/// skipped before any request went out (breaker open, cancelled up front).
pub struct DispatchOutcome {
    pub success: bool,
    pub attempts: u32,
    pub last_response_code: Option<i32>,
    pub reason: Option<String>,
    pub payload_size: i64,
    pub attempt_log: Vec<AttemptRecord>,
}

/// Per-attempt classification of an HTTP result, mirroring the teacher's
/// status-code taxonomy: success records a breaker success and stops;
/// config errors stop without retry and do not count as breaker failures;
/// transient errors retry and, except for 429, count as breaker failures.
enum AttemptResult {
    Success { code: i32 },
    ConfigError { code: i32, message: String },
    Transient { code: Option<i32>, message: String, retry_after: Option<u64>, breaker_failure: bool },
}

fn classify_response(status: reqwest::StatusCode, retry_after: Option<u64>) -> AttemptResult {
    let code = status.as_u16() as i32;
    if status.is_success() {
        AttemptResult::Success { code }
    } else if status.as_u16() == 429 {
        AttemptResult::Transient {
            code: Some(code),
            message: "HTTP 429: too many requests".to_string(),
            retry_after,
            breaker_failure: false,
        }
    } else if status.as_u16() == 408 {
        AttemptResult::Transient {
            code: Some(code),
            message: "HTTP 408: request timeout".to_string(),
            retry_after,
            breaker_failure: true,
        }
    } else if status.is_client_error() {
        AttemptResult::ConfigError { code, message: format!("HTTP {code}: client error") }
    } else if status.is_server_error() {
        AttemptResult::Transient {
            code: Some(code),
            message: format!("HTTP {code}: server error"),
            retry_after,
            breaker_failure: true,
        }
    } else {
        AttemptResult::Transient {
            code: Some(code),
            message: format!("HTTP {code}: unexpected status"),
            retry_after,
            breaker_failure: true,
        }
    }
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response.headers().get("Retry-After").and_then(|v| v.to_str().ok()).and_then(|s| s.parse::<u64>().ok())
}

#[allow(clippy::too_many_arguments)]
pub async fn dispatch_unit(
    client: &Client,
    cancel: &CancellationToken,
    breaker: &CircuitBreaker,
    target_type: TargetType,
    config: &DispatchConfig,
    alert: &Alert,
    classification: &Classification,
    signing_secret: Option<&str>,
    retry_policy: &RetryPolicy,
    unit_timeout: Duration,
) -> DispatchOutcome {
    let body = payload::encode(target_type, alert, classification, config);
    let payload_json = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
    let payload_size = payload_json.len() as i64;

    let mut delay = retry_policy.initial_delay;
    let mut attempt: u32 = 0;
    let mut attempt_log: Vec<AttemptRecord> = Vec::new();

    loop {
        attempt += 1;

        if cancel.is_cancelled() {
            return DispatchOutcome {
                success: false,
                attempts: attempt,
                last_response_code: None,
                reason: Some("cancelled".to_string()),
                payload_size,
                attempt_log,
            };
        }

        if !breaker.allow_request() {
            return DispatchOutcome {
                success: false,
                attempts: attempt,
                last_response_code: None,
                reason: Some("breaker_open".to_string()),
                payload_size,
                attempt_log,
            };
        }

        let mut request = client
            .request(parse_method(&config.method), config.url.as_str())
            .header("Content-Type", "application/json");
        for (k, v) in &config.headers {
            if k.eq_ignore_ascii_case(SIGNING_SECRET_HEADER) {
                continue;
            }
            request = request.header(k.as_str(), v.as_str());
        }
        if let Some(secret) = signing_secret {
            let (sig, ts) = signing::sign(&payload_json, secret);
            request = request.header(signing::SIGNATURE_HEADER, sig).header(signing::TIMESTAMP_HEADER, ts);
        }
        request = request.body(payload_json.clone());

        let attempt_start = Instant::now();
        let sent = timeout(unit_timeout, request.send()).await;

        let result = match sent {
            Err(_elapsed) => {
                breaker.record_failure();
                AttemptResult::Transient {
                    code: None,
                    message: format!("unit timeout after {:?}", attempt_start.elapsed()),
                    retry_after: None,
                    breaker_failure: true,
                }
            }
            Ok(Err(e)) => {
                breaker.record_failure();
                AttemptResult::Transient {
                    code: None,
                    message: format!("network error: {e}"),
                    retry_after: None,
                    breaker_failure: true,
                }
            }
            Ok(Ok(response)) => {
                let status = response.status();
                let retry_after = retry_after_secs(&response);
                let outcome = classify_response(status, retry_after);
                match &outcome {
                    AttemptResult::Success { .. } => breaker.record_success(),
                    AttemptResult::ConfigError { .. } => breaker.record_success(),
                    AttemptResult::Transient { breaker_failure: true, .. } => breaker.record_failure(),
                    AttemptResult::Transient { breaker_failure: false, .. } => breaker.record_success(),
                }
                outcome
            }
        };

        let record_elapsed = attempt_start.elapsed();
        attempt_log.push(match &result {
            AttemptResult::Success { code } => {
                AttemptRecord { attempt_number: attempt, success: true, response_code: Some(*code), reason: None, elapsed: record_elapsed }
            }
            AttemptResult::ConfigError { code, message } => AttemptRecord {
                attempt_number: attempt,
                success: false,
                response_code: Some(*code),
                reason: Some(message.clone()),
                elapsed: record_elapsed,
            },
            AttemptResult::Transient { code, message, .. } => AttemptRecord {
                attempt_number: attempt,
                success: false,
                response_code: *code,
                reason: Some(message.clone()),
                elapsed: record_elapsed,
            },
        });

        match result {
            AttemptResult::Success { code } => {
                return DispatchOutcome {
                    success: true,
                    attempts: attempt,
                    last_response_code: Some(code),
                    reason: None,
                    payload_size,
                    attempt_log,
                };
            }
            AttemptResult::ConfigError { code, message } => {
                warn!(url = %config.url, code, "dispatch unit config error, not retrying");
                return DispatchOutcome {
                    success: false,
                    attempts: attempt,
                    last_response_code: Some(code),
                    reason: Some(message),
                    payload_size,
                    attempt_log,
                };
            }
            AttemptResult::Transient { code, message, retry_after, .. } => {
                if attempt > retry_policy.max_retries {
                    return DispatchOutcome {
                        success: false,
                        attempts: attempt,
                        last_response_code: code,
                        reason: Some(message),
                        payload_size,
                        attempt_log,
                    };
                }
                let wait = retry_policy.respect_retry_after(
                    retry_policy.jittered(delay),
                    retry_after,
                );
                debug!(url = %config.url, attempt, wait_ms = wait.as_millis(), "retrying dispatch unit");
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => {
                        return DispatchOutcome {
                            success: false,
                            attempts: attempt,
                            last_response_code: code,
                            reason: Some("cancelled".to_string()),
                            payload_size,
                            attempt_log,
                        };
                    }
                }
                delay = retry_policy.advance(delay);
            }
        }
    }
}

fn parse_method(method: &str) -> reqwest::Method {
    method.parse().unwrap_or(reqwest::Method::POST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_common::{AlertStatus, ClassificationSource, HttpConfigOptions, Severity};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::time::Duration as StdDuration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_alert() -> Alert {
        let now = Utc::now();
        Alert {
            fingerprint: "a".repeat(64),
            alert_name: "HighCPU".to_string(),
            status: AlertStatus::Firing,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            starts_at: now,
            ends_at: None,
            generator_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_classification() -> Classification {
        Classification {
            fingerprint: "a".repeat(64),
            severity: Severity::Warning,
            confidence: 0.5,
            reasoning: "test".to_string(),
            recommendations: vec![],
            processing_time_seconds: 0.0,
            source: ClassificationSource::Fallback,
            model: None,
            model_version: None,
            cache_hit: false,
            created_at: Utc::now(),
        }
    }

    fn fast_retry_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_delay: StdDuration::from_millis(1),
            max_delay: StdDuration::from_millis(10),
            backoff_factor: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn success_response_records_breaker_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let config = DispatchConfig {
            url: format!("{}/hook", server.uri()),
            method: "POST".to_string(),
            headers: Default::default(),
            send_resolved: true,
            max_alerts: 0,
            http_config: HttpConfigOptions::default(),
        };
        let breaker = CircuitBreaker::new(ah_pool::CircuitBreakerConfig::default());
        let outcome = dispatch_unit(
            &Client::new(),
            &CancellationToken::new(),
            &breaker,
            TargetType::Webhook,
            &config,
            &sample_alert(),
            &sample_classification(),
            None,
            &fast_retry_policy(),
            StdDuration::from_secs(5),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.last_response_code, Some(200));
        assert_eq!(outcome.attempt_log.len(), 1);
        assert_eq!(outcome.attempt_log[0].attempt_number, 1);
        assert!(outcome.attempt_log[0].success);
    }

    #[tokio::test]
    async fn four_hundred_does_not_retry_and_does_not_trip_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(400)).mount(&server).await;

        let config = DispatchConfig {
            url: format!("{}/hook", server.uri()),
            method: "POST".to_string(),
            headers: Default::default(),
            send_resolved: true,
            max_alerts: 0,
            http_config: HttpConfigOptions::default(),
        };
        let breaker = CircuitBreaker::new(ah_pool::CircuitBreakerConfig::default());
        let outcome = dispatch_unit(
            &Client::new(),
            &CancellationToken::new(),
            &breaker,
            TargetType::Webhook,
            &config,
            &sample_alert(),
            &sample_classification(),
            None,
            &fast_retry_policy(),
            StdDuration::from_secs(5),
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn five_hundred_retries_then_fails_and_trips_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let config = DispatchConfig {
            url: format!("{}/hook", server.uri()),
            method: "POST".to_string(),
            headers: Default::default(),
            send_resolved: true,
            max_alerts: 0,
            http_config: HttpConfigOptions::default(),
        };
        let breaker = CircuitBreaker::new(ah_pool::CircuitBreakerConfig { max_failures: 10, reset_timeout: StdDuration::from_secs(30) });
        let outcome = dispatch_unit(
            &Client::new(),
            &CancellationToken::new(),
            &breaker,
            TargetType::Webhook,
            &config,
            &sample_alert(),
            &sample_classification(),
            None,
            &fast_retry_policy(),
            StdDuration::from_secs(5),
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3); // initial + 2 retries
        assert_eq!(breaker.failure_count(), 3);
        assert_eq!(outcome.attempt_log.len(), 3);
        assert_eq!(outcome.attempt_log.iter().map(|r| r.attempt_number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(outcome.attempt_log.iter().all(|r| !r.success && r.response_code == Some(503)));
    }

    #[tokio::test]
    async fn open_breaker_skips_without_network_call() {
        let breaker = CircuitBreaker::new(ah_pool::CircuitBreakerConfig { max_failures: 1, reset_timeout: StdDuration::from_secs(30) });
        breaker.record_failure();

        let config = DispatchConfig {
            url: "https://example.invalid/hook".to_string(),
            method: "POST".to_string(),
            headers: Default::default(),
            send_resolved: true,
            max_alerts: 0,
            http_config: HttpConfigOptions::default(),
        };
        let outcome = dispatch_unit(
            &Client::new(),
            &CancellationToken::new(),
            &breaker,
            TargetType::Webhook,
            &config,
            &sample_alert(),
            &sample_classification(),
            None,
            &fast_retry_policy(),
            StdDuration::from_secs(5),
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("breaker_open"));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn cancellation_before_first_attempt_is_reported() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let config = DispatchConfig {
            url: "https://example.invalid/hook".to_string(),
            method: "POST".to_string(),
            headers: Default::default(),
            send_resolved: true,
            max_alerts: 0,
            http_config: HttpConfigOptions::default(),
        };
        let breaker = CircuitBreaker::new(ah_pool::CircuitBreakerConfig::default());
        let outcome = dispatch_unit(
            &Client::new(),
            &cancel,
            &breaker,
            TargetType::Webhook,
            &config,
            &sample_alert(),
            &sample_classification(),
            None,
            &fast_retry_policy(),
            StdDuration::from_secs(5),
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("cancelled"));
    }
}
