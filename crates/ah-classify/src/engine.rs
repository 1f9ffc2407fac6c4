//! Classification Engine (§4.E): L1 -> L2 -> LLM -> rule-based-fallback
//! decision tree, plus an order-preserving batch API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ah_common::{Alert, Classification, ClassificationSource};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::fallback;
use crate::l1::L1Cache;
use crate::l2::{FaultTolerantL2, L2Cache};
use crate::llm::LlmClient;

fn mark_cache_hit(mut c: Classification) -> Classification {
    c.source = ClassificationSource::Cache;
    c.cache_hit = true;
    c
}

pub struct ClassificationEngine {
    l1: L1Cache,
    l2: FaultTolerantL2,
    llm: Arc<dyn LlmClient>,
    llm_timeout: Duration,
    l2_ttl: Duration,
    batch_concurrency: usize,
}

impl ClassificationEngine {
    pub fn new(
        l2: Arc<dyn L2Cache>,
        llm: Arc<dyn LlmClient>,
        llm_timeout: Duration,
        l2_ttl: Duration,
        batch_concurrency: usize,
    ) -> Self {
        Self {
            l1: L1Cache::new(),
            l2: FaultTolerantL2::new(l2),
            llm,
            llm_timeout,
            l2_ttl,
            batch_concurrency: batch_concurrency.clamp(1, 8),
        }
    }

    /// Never fails: an LLM or cache error just falls through to the next
    /// stage, and the rule-based fallback always succeeds.
    pub async fn classify(&self, alert: &Alert) -> Classification {
        if let Some(hit) = self.l1.get(&alert.fingerprint) {
            metrics::counter!("classification_l1_cache_hits_total").increment(1);
            return mark_cache_hit(hit);
        }

        if let Some(hit) = self.l2.get(&alert.fingerprint).await {
            metrics::counter!("classification_l2_cache_hits_total").increment(1);
            self.l1.put(hit.clone());
            return mark_cache_hit(hit);
        }

        self.classify_uncached(alert).await
    }

    async fn classify_uncached(&self, alert: &Alert) -> Classification {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.llm_timeout, self.llm.classify(alert)).await;

        let classification = match outcome {
            Ok(Ok(mut c)) => {
                c.processing_time_seconds = started.elapsed().as_secs_f64();
                c = c.clamp_confidence();
                self.l2.put(&c, self.l2_ttl).await;
                self.l1.put(c.clone());
                c
            }
            Ok(Err(err)) => {
                metrics::counter!("llm_errors_total", "reason" => "error").increment(1);
                warn!(%err, fingerprint = %alert.fingerprint, "LLM classification failed, using rule-based fallback");
                let c = fallback::classify(alert);
                self.l1.put(c.clone());
                c
            }
            Err(_) => {
                metrics::counter!("llm_errors_total", "reason" => "timeout").increment(1);
                debug!(fingerprint = %alert.fingerprint, timeout_ms = self.llm_timeout.as_millis(), "LLM classification timed out, using rule-based fallback");
                let c = fallback::classify(alert);
                self.l1.put(c.clone());
                c
            }
        };

        classification
    }

    /// Preserves input order. Checks L1/L2 per fingerprint first; the
    /// remaining uncached alerts go to the LLM either as one batch request
    /// (if it supports that) or sequentially under a `K <= 8` semaphore.
    pub async fn classify_batch(&self, alerts: &[Alert]) -> Vec<Classification> {
        let mut results: Vec<Option<Classification>> = Vec::with_capacity(alerts.len());
        let mut uncached_indices = Vec::new();

        for alert in alerts {
            if let Some(hit) = self.l1.get(&alert.fingerprint) {
                metrics::counter!("classification_l1_cache_hits_total").increment(1);
                results.push(Some(mark_cache_hit(hit)));
                continue;
            }
            if let Some(hit) = self.l2.get(&alert.fingerprint).await {
                metrics::counter!("classification_l2_cache_hits_total").increment(1);
                self.l1.put(hit.clone());
                results.push(Some(mark_cache_hit(hit)));
                continue;
            }
            uncached_indices.push(results.len());
            results.push(None);
        }

        if uncached_indices.is_empty() {
            return results.into_iter().map(|c| c.expect("every slot filled")).collect();
        }

        let uncached_alerts: Vec<Alert> = uncached_indices.iter().map(|&i| alerts[i].clone()).collect();

        let classified = if self.llm.supports_batch() {
            self.classify_batch_via_llm(&uncached_alerts).await
        } else {
            self.classify_batch_bounded(&uncached_alerts).await
        };

        for (slot, classification) in uncached_indices.into_iter().zip(classified) {
            results[slot] = Some(classification);
        }

        results.into_iter().map(|c| c.expect("every slot filled")).collect()
    }

    async fn classify_batch_via_llm(&self, alerts: &[Alert]) -> Vec<Classification> {
        match tokio::time::timeout(self.llm_timeout, self.llm.classify_batch(alerts)).await {
            Ok(Ok(results)) if results.len() == alerts.len() => {
                for c in &results {
                    self.l2.put(c, self.l2_ttl).await;
                    self.l1.put(c.clone());
                }
                results
            }
            Ok(Ok(_)) | Ok(Err(_)) | Err(_) => {
                metrics::counter!("llm_errors_total", "reason" => "batch_failed").increment(1);
                warn!("batch LLM classification failed or timed out, falling back to bounded per-alert calls");
                self.classify_batch_bounded(alerts).await
            }
        }
    }

    async fn classify_batch_bounded(&self, alerts: &[Alert]) -> Vec<Classification> {
        let semaphore = Arc::new(Semaphore::new(self.batch_concurrency));
        let mut handles = Vec::with_capacity(alerts.len());

        for alert in alerts {
            let semaphore = semaphore.clone();
            let alert = alert.clone();
            let llm = self.llm.clone();
            let llm_timeout = self.llm_timeout;
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                match tokio::time::timeout(llm_timeout, llm.classify(&alert)).await {
                    Ok(Ok(mut c)) => {
                        c = c.clamp_confidence();
                        Ok(c)
                    }
                    Ok(Err(_)) | Err(_) => Err(alert),
                }
            }));
        }

        let mut out = Vec::with_capacity(alerts.len());
        for handle in handles {
            match handle.await.expect("classification task did not panic") {
                Ok(c) => {
                    self.l2.put(&c, self.l2_ttl).await;
                    self.l1.put(c.clone());
                    out.push(c);
                }
                Err(alert) => {
                    let c = fallback::classify(&alert);
                    self.l1.put(c.clone());
                    out.push(c);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l2::InMemoryL2Cache;
    use crate::llm::FakeLlmClient;
    use ah_common::{AlertStatus, Severity};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn alert(fingerprint: &str) -> Alert {
        let now = chrono::Utc::now();
        Alert {
            fingerprint: fingerprint.to_string(),
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

    fn engine() -> ClassificationEngine {
        ClassificationEngine::new(
            Arc::new(InMemoryL2Cache::new()),
            Arc::new(FakeLlmClient),
            Duration::from_secs(2),
            Duration::from_secs(60),
            8,
        )
    }

    #[tokio::test]
    async fn llm_success_populates_both_caches() {
        let engine = engine();
        let a = alert("fp1");
        let first = engine.classify(&a).await;
        assert_eq!(first.source, ClassificationSource::Llm);

        let second = engine.classify(&a).await;
        assert_eq!(second.source, ClassificationSource::Cache);
        assert!(second.cache_hit);
    }

    struct TimeoutLlm;
    #[async_trait]
    impl LlmClient for TimeoutLlm {
        async fn classify(&self, _alert: &Alert) -> crate::error::Result<Classification> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            unreachable!("timeout should fire first")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn llm_timeout_falls_back_and_does_not_populate_l2() {
        let engine = ClassificationEngine::new(
            Arc::new(InMemoryL2Cache::new()),
            Arc::new(TimeoutLlm),
            Duration::from_millis(50),
            Duration::from_secs(60),
            8,
        );
        let a = alert("fp2");
        let handle = tokio::spawn(async move { engine.classify(&a).await });
        tokio::time::advance(Duration::from_millis(100)).await;
        let result = handle.await.unwrap();
        assert_eq!(result.source, ClassificationSource::Fallback);
    }

    struct FailingLlm;
    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn classify(&self, _alert: &Alert) -> crate::error::Result<Classification> {
            Err(crate::error::ClassifyError::Llm("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn llm_error_falls_back_to_rule_based() {
        let engine = ClassificationEngine::new(
            Arc::new(InMemoryL2Cache::new()),
            Arc::new(FailingLlm),
            Duration::from_secs(2),
            Duration::from_secs(60),
            8,
        );
        let result = engine.classify(&alert("fp3")).await;
        assert_eq!(result.source, ClassificationSource::Fallback);
        assert_eq!(result.severity, Severity::Critical);
    }

    struct CountingLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for CountingLlm {
        async fn classify(&self, alert: &Alert) -> crate::error::Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FakeLlmClient.classify(alert).await
        }
    }

    #[tokio::test]
    async fn classify_batch_preserves_order_and_dedups_cached() {
        let counting = Arc::new(CountingLlm { calls: AtomicUsize::new(0) });
        let engine = ClassificationEngine::new(Arc::new(InMemoryL2Cache::new()), counting.clone(), Duration::from_secs(2), Duration::from_secs(60), 4);

        let alerts = vec![alert("b1"), alert("b2"), alert("b3")];
        let first_pass = engine.classify_batch(&alerts).await;
        assert_eq!(first_pass.len(), 3);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);

        let second_pass = engine.classify_batch(&alerts).await;
        assert!(second_pass.iter().all(|c| c.source == ClassificationSource::Cache));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3, "cached alerts must not call the LLM again");

        for (original, cached) in alerts.iter().zip(second_pass.iter()) {
            assert_eq!(original.fingerprint, cached.fingerprint);
        }
    }
}
