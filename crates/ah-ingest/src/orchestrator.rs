//! Ingest Orchestrator (§4.H): decode batch -> upsert -> classify -> silence
//! check -> conditional publish -> reply. Grounded on the teacher's
//! `fc-router/src/manager.rs` as the closest analog to a top-level
//! request-scoped orchestrator coordinating storage, a classification-like
//! side call, and dispatch, generalized from queue-message routing to this
//! spec's batch-ingest pipeline.

use std::sync::Arc;

use ah_classify::ClassificationEngine;
use ah_common::{Alert, AttemptStatus, PublishingAttempt};
use ah_matcher::SilenceMatcher;
use ah_publish::{Publisher, ReportStatus};
use ah_store::AlertStore;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::collaborators::{RouteResolver, SilenceSource};
use crate::model::{AlertOutcomeStatus, IncomingAlert, IngestAlertDetail};

pub struct OrchestratorConfig {
    /// Bounded parallelism across alerts within one batch (`B <= 16`, §5).
    pub batch_parallelism: usize,
    /// Default sync mode waits for classification before replying; async
    /// mode replies immediately and finishes classify/silence/publish in
    /// the background (§4.H step 3).
    pub sync_classification: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { batch_parallelism: 16, sync_classification: true }
    }
}

pub struct Orchestrator {
    store: Arc<dyn AlertStore>,
    classifier: Arc<ClassificationEngine>,
    matcher: Arc<SilenceMatcher>,
    silences: Arc<dyn SilenceSource>,
    router: Arc<dyn RouteResolver>,
    publisher: Arc<Publisher>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn AlertStore>,
        classifier: Arc<ClassificationEngine>,
        matcher: Arc<SilenceMatcher>,
        silences: Arc<dyn SilenceSource>,
        router: Arc<dyn RouteResolver>,
        publisher: Arc<Publisher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { store, classifier, matcher, silences, router, publisher, config }
    }

    fn to_alert(incoming: IncomingAlert) -> Alert {
        let alert_name = incoming.labels.get("alertname").cloned().unwrap_or_default();
        let now = chrono::Utc::now();
        Alert {
            fingerprint: ah_common::fingerprint(&incoming.labels),
            alert_name,
            status: incoming.status,
            labels: incoming.labels,
            annotations: incoming.annotations,
            starts_at: incoming.starts_at,
            ends_at: incoming.ends_at,
            generator_url: incoming.generator_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Processes one ingest batch, honoring the optional bounded
    /// cross-alert parallelism (`B`); within an alert, processing stays
    /// strictly sequential (upsert before classify before publish, §5).
    pub async fn ingest(&self, cancel: &CancellationToken, alerts: Vec<IncomingAlert>) -> Vec<IngestAlertDetail> {
        let semaphore = Arc::new(Semaphore::new(self.config.batch_parallelism.max(1)));
        let mut handles = Vec::with_capacity(alerts.len());

        for incoming in alerts {
            let alert = Self::to_alert(incoming);
            let store = self.store.clone();
            let classifier = self.classifier.clone();
            let matcher = self.matcher.clone();
            let silences = self.silences.clone();
            let router = self.router.clone();
            let publisher = self.publisher.clone();
            let sync_classification = self.config.sync_classification;
            let cancel = cancel.clone();
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                Self::process_one(store, classifier, matcher, silences, router, publisher, cancel, alert, sync_classification).await
            }));
        }

        let mut details = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(detail) => details.push(detail),
                Err(join_error) => warn!(error = %join_error, "ingest task panicked"),
            }
        }
        details
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_one(
        store: Arc<dyn AlertStore>,
        classifier: Arc<ClassificationEngine>,
        matcher: Arc<SilenceMatcher>,
        silences: Arc<dyn SilenceSource>,
        router: Arc<dyn RouteResolver>,
        publisher: Arc<Publisher>,
        cancel: CancellationToken,
        alert: Alert,
        sync_classification: bool,
    ) -> IngestAlertDetail {
        let fingerprint = alert.fingerprint.clone();
        metrics::counter!("alerts_received_total").increment(1);

        let stored = match store.save_alert(alert).await {
            Ok(a) => a,
            Err(e) => {
                return IngestAlertDetail {
                    fingerprint,
                    status: AlertOutcomeStatus::Failed,
                    severity: None,
                    silenced: false,
                    silence_ids: vec![],
                    error: Some(e.to_string()),
                };
            }
        };

        if sync_classification {
            Self::classify_silence_publish(store, classifier, matcher, silences, router, publisher, cancel, stored).await
        } else {
            tokio::spawn(async move {
                Self::classify_silence_publish(store, classifier, matcher, silences, router, publisher, cancel, stored).await;
            });
            IngestAlertDetail {
                fingerprint,
                status: AlertOutcomeStatus::Ok,
                severity: None,
                silenced: false,
                silence_ids: vec![],
                error: None,
            }
        }
    }

    /// Steps 3-6 of §4.H, shared by the sync path (awaited inline) and the
    /// async path (run in a detached task after the caller has replied).
    #[allow(clippy::too_many_arguments)]
    async fn classify_silence_publish(
        store: Arc<dyn AlertStore>,
        classifier: Arc<ClassificationEngine>,
        matcher: Arc<SilenceMatcher>,
        silences: Arc<dyn SilenceSource>,
        router: Arc<dyn RouteResolver>,
        publisher: Arc<Publisher>,
        cancel: CancellationToken,
        alert: Alert,
    ) -> IngestAlertDetail {
        let classification = classifier.classify(&alert).await;
        if let Err(e) = store.save_classification(classification.clone()).await {
            warn!(error = %e, fingerprint = %alert.fingerprint, "failed to persist classification");
        }

        let active = silences.active_silences().await;
        let matched_ids = match matcher.matches_any(&cancel, &active, &alert.labels) {
            Ok(ids) => ids,
            Err(ah_matcher::MatcherError::ContextCancelled(partial)) => {
                warn!(
                    fingerprint = %alert.fingerprint,
                    partial_matches = partial.len(),
                    "silence evaluation cancelled; treating alert as silenced by the silences matched so far"
                );
                partial
            }
            Err(e) => {
                warn!(error = %e, fingerprint = %alert.fingerprint, "silence evaluation failed; treating alert as not silenced");
                Vec::new()
            }
        };

        if !matched_ids.is_empty() {
            Self::audit_silenced_skip(&store, &alert, &matched_ids).await;
            return IngestAlertDetail {
                fingerprint: alert.fingerprint,
                status: AlertOutcomeStatus::Ok,
                severity: Some(classification.severity),
                silenced: true,
                silence_ids: matched_ids,
                error: None,
            };
        }

        let receiver_names = router.route_for(&alert);
        let report = publisher.publish(&cancel, &alert, &classification, &receiver_names).await;

        let status = match report.status() {
            ReportStatus::Empty | ReportStatus::AllSuccess => AlertOutcomeStatus::Ok,
            ReportStatus::Mixed => AlertOutcomeStatus::Partial,
            ReportStatus::AllFailed => AlertOutcomeStatus::Failed,
        };

        IngestAlertDetail {
            fingerprint: alert.fingerprint,
            status,
            severity: Some(classification.severity),
            silenced: false,
            silence_ids: vec![],
            error: None,
        }
    }

    async fn audit_silenced_skip(store: &Arc<dyn AlertStore>, alert: &Alert, silence_ids: &[Uuid]) {
        let attempt = PublishingAttempt {
            alert_fingerprint: alert.fingerprint.clone(),
            target_name: "*".to_string(),
            target_type: "silenced".to_string(),
            status: AttemptStatus::Skipped,
            attempt_number: 1,
            response_code: None,
            response_message: Some("silenced".to_string()),
            payload_size: None,
            processing_time_seconds: 0.0,
            error_details: Some(serde_json::json!({ "reason": "silenced", "silence_ids": silence_ids })),
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = store.append_publishing_attempt(attempt).await {
            warn!(error = %e, "failed to persist silenced publishing attempt");
        }
    }
}
