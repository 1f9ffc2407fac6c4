use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ah_classify::{ClassificationEngine, InMemoryL2Cache, FakeLlmClient};
use ah_common::{
    Alert, AlertStatus, Classification, DispatchConfig, HttpConfigOptions, Matcher, MatcherType,
    PublishingAttempt, Receiver, RetryPolicy, Silence,
};
use ah_ingest::{AllReceiversRouter, IncomingAlert, InMemorySilenceSource, Orchestrator, OrchestratorConfig};
use ah_matcher::{RegexCache, SilenceMatcher};
use ah_pool::CircuitBreakerConfig;
use ah_publish::{Publisher, PublisherConfig};
use ah_store::{AlertFilter, AlertStats, AlertStore, Result as StoreResult};
use ah_targets::TargetRegistry;
use uuid::Uuid;

struct RecordingStore {
    alerts: Mutex<Vec<Alert>>,
    attempts: Mutex<Vec<PublishingAttempt>>,
}

impl RecordingStore {
    fn new() -> Self {
        Self { alerts: Mutex::new(Vec::new()), attempts: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl AlertStore for RecordingStore {
    async fn save_alert(&self, alert: Alert) -> StoreResult<Alert> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(alert)
    }
    async fn get_alert_by_fingerprint(&self, _fingerprint: &str) -> StoreResult<Option<Alert>> {
        Ok(None)
    }
    async fn list_alerts(&self, _filter: AlertFilter) -> StoreResult<(Vec<Alert>, i64)> {
        Ok((vec![], 0))
    }
    async fn update_alert(&self, alert: Alert) -> StoreResult<Alert> {
        Ok(alert)
    }
    async fn delete_alert(&self, _fingerprint: &str, _idempotent: bool) -> StoreResult<()> {
        Ok(())
    }
    async fn get_alert_stats(&self) -> StoreResult<AlertStats> {
        unimplemented!()
    }
    async fn cleanup_old_alerts(&self, _retention_days: i64) -> StoreResult<u64> {
        Ok(0)
    }
    async fn save_classification(&self, classification: Classification) -> StoreResult<Classification> {
        Ok(classification)
    }
    async fn get_classification(&self, _fingerprint: &str) -> StoreResult<Option<Classification>> {
        Ok(None)
    }
    async fn append_publishing_attempt(&self, attempt: PublishingAttempt) -> StoreResult<()> {
        self.attempts.lock().unwrap().push(attempt);
        Ok(())
    }
    async fn get_publishing_history(&self, _fingerprint: &str) -> StoreResult<Vec<PublishingAttempt>> {
        Ok(self.attempts.lock().unwrap().clone())
    }
}

fn incoming_alert(alertname: &str) -> IncomingAlert {
    let mut labels = BTreeMap::new();
    labels.insert("alertname".to_string(), alertname.to_string());
    IncomingAlert {
        labels,
        annotations: BTreeMap::new(),
        status: AlertStatus::Firing,
        starts_at: Utc::now(),
        ends_at: None,
        generator_url: None,
    }
}

fn publisher_config() -> PublisherConfig {
    PublisherConfig {
        worker_pool_size: 4,
        retry: RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
            jitter_factor: 0.0,
        },
        circuit_breaker: CircuitBreakerConfig { max_failures: 5, reset_timeout: Duration::from_secs(30) },
        unit_timeout: Duration::from_secs(5),
        allow_private_targets: true,
    }
}

fn classifier() -> Arc<ClassificationEngine> {
    Arc::new(ClassificationEngine::new(
        Arc::new(InMemoryL2Cache::new()),
        Arc::new(FakeLlmClient),
        Duration::from_secs(2),
        Duration::from_secs(60),
        4,
    ))
}

fn matcher() -> Arc<SilenceMatcher> {
    Arc::new(SilenceMatcher::new(Arc::new(RegexCache::new(100))))
}

#[tokio::test]
async fn happy_path_ingest_with_no_silences_publishes_and_returns_ok() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let receiver = Receiver {
        name: "ops".to_string(),
        webhook_configs: vec![DispatchConfig {
            url: format!("{}/hook", server.uri()),
            method: "POST".to_string(),
            headers: Default::default(),
            send_resolved: true,
            max_alerts: 0,
            http_config: HttpConfigOptions::default(),
        }],
        chat_configs: vec![],
        incident_configs: vec![],
        email_configs: vec![],
    };
    let registry = Arc::new(TargetRegistry::new(vec![receiver]).unwrap());
    let store: Arc<dyn AlertStore> = Arc::new(RecordingStore::new());
    let publisher = Arc::new(Publisher::new(registry.clone(), store.clone(), publisher_config()));

    let orchestrator = Orchestrator::new(
        store,
        classifier(),
        matcher(),
        Arc::new(InMemorySilenceSource::default()),
        Arc::new(AllReceiversRouter::new(registry)),
        publisher,
        OrchestratorConfig { batch_parallelism: 4, sync_classification: true },
    );

    let details = orchestrator.ingest(&CancellationToken::new(), vec![incoming_alert("HighCPU")]).await;

    assert_eq!(details.len(), 1);
    assert_eq!(details[0].status, ah_ingest::AlertOutcomeStatus::Ok);
    assert!(!details[0].silenced);
    assert!(details[0].severity.is_some());
}

#[tokio::test]
async fn silenced_alert_is_suppressed_and_audited() {
    let registry = Arc::new(TargetRegistry::new(vec![]).unwrap());
    let store: Arc<dyn AlertStore> = Arc::new(RecordingStore::new());
    let publisher = Arc::new(Publisher::new(registry.clone(), store.clone(), publisher_config()));

    let now = Utc::now();
    let silence = Silence {
        id: Uuid::new_v4(),
        created_by: "oncall".to_string(),
        comment: "maintenance".to_string(),
        starts_at: now - chrono::Duration::minutes(5),
        ends_at: now + chrono::Duration::minutes(5),
        matchers: vec![Matcher {
            name: "alertname".to_string(),
            value: "HighCPU".to_string(),
            matcher_type: MatcherType::Eq,
        }],
    };

    let orchestrator = Orchestrator::new(
        store.clone(),
        classifier(),
        matcher(),
        Arc::new(InMemorySilenceSource::new(vec![silence])),
        Arc::new(AllReceiversRouter::new(registry)),
        publisher,
        OrchestratorConfig { batch_parallelism: 4, sync_classification: true },
    );

    let details = orchestrator.ingest(&CancellationToken::new(), vec![incoming_alert("HighCPU")]).await;

    assert_eq!(details.len(), 1);
    assert!(details[0].silenced);
    assert_eq!(details[0].silence_ids.len(), 1);

    let history = store.get_publishing_history(&details[0].fingerprint).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].target_type, "silenced");
}

#[tokio::test]
async fn async_mode_replies_before_publish_completes() {
    let registry = Arc::new(TargetRegistry::new(vec![]).unwrap());
    let store: Arc<dyn AlertStore> = Arc::new(RecordingStore::new());
    let publisher = Arc::new(Publisher::new(registry.clone(), store.clone(), publisher_config()));

    let orchestrator = Orchestrator::new(
        store,
        classifier(),
        matcher(),
        Arc::new(InMemorySilenceSource::default()),
        Arc::new(AllReceiversRouter::new(registry)),
        publisher,
        OrchestratorConfig { batch_parallelism: 4, sync_classification: false },
    );

    let details = orchestrator.ingest(&CancellationToken::new(), vec![incoming_alert("DiskFull")]).await;

    assert_eq!(details.len(), 1);
    assert_eq!(details[0].status, ah_ingest::AlertOutcomeStatus::Ok);
    assert!(details[0].severity.is_none(), "async mode replies before classification finishes");
}

#[tokio::test]
async fn batch_with_a_failing_alert_is_partial() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/good")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("POST")).and(path("/bad")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let good = Receiver {
        name: "good".to_string(),
        webhook_configs: vec![DispatchConfig {
            url: format!("{}/good", server.uri()),
            method: "POST".to_string(),
            headers: Default::default(),
            send_resolved: true,
            max_alerts: 0,
            http_config: HttpConfigOptions::default(),
        }],
        chat_configs: vec![],
        incident_configs: vec![],
        email_configs: vec![],
    };
    let bad = Receiver {
        name: "bad".to_string(),
        webhook_configs: vec![DispatchConfig {
            url: format!("{}/bad", server.uri()),
            method: "POST".to_string(),
            headers: Default::default(),
            send_resolved: true,
            max_alerts: 0,
            http_config: HttpConfigOptions::default(),
        }],
        chat_configs: vec![],
        incident_configs: vec![],
        email_configs: vec![],
    };
    let registry = Arc::new(TargetRegistry::new(vec![good, bad]).unwrap());
    let store: Arc<dyn AlertStore> = Arc::new(RecordingStore::new());
    let mut config = publisher_config();
    config.retry.max_retries = 0;
    let publisher = Arc::new(Publisher::new(registry.clone(), store.clone(), config));

    let orchestrator = Orchestrator::new(
        store,
        classifier(),
        matcher(),
        Arc::new(InMemorySilenceSource::default()),
        Arc::new(AllReceiversRouter::new(registry)),
        publisher,
        OrchestratorConfig { batch_parallelism: 4, sync_classification: true },
    );

    let details = orchestrator.ingest(&CancellationToken::new(), vec![incoming_alert("HighCPU")]).await;

    assert_eq!(details.len(), 1);
    assert_eq!(details[0].status, ah_ingest::AlertOutcomeStatus::Partial);
}
