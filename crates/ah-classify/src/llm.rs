//! LLM classification client (§4.E step 3). A per-request deadline is
//! enforced by the caller via `tokio::time::timeout`; this module only knows
//! how to shape the request/response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ah_common::{Alert, Classification, ClassificationSource, Severity};
use chrono::Utc;

use crate::error::{ClassifyError, Result};

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-alert classification. The engine applies `T_llm` around this
    /// call; implementations should not add their own outer timeout.
    async fn classify(&self, alert: &Alert) -> Result<Classification>;

    /// Whether this client can classify many alerts in one request. When
    /// `false`, the engine fans out sequential `classify` calls under a
    /// bounded semaphore instead.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Only called when `supports_batch()` returns true. Must preserve
    /// input order.
    async fn classify_batch(&self, alerts: &[Alert]) -> Result<Vec<Classification>> {
        let mut out = Vec::with_capacity(alerts.len());
        for alert in alerts {
            out.push(self.classify(alert).await?);
        }
        Ok(out)
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    alert_name: &'a str,
    labels: &'a std::collections::BTreeMap<String, String>,
    annotations: &'a std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct BatchClassifyRequest<'a> {
    alerts: Vec<ClassifyRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    severity: String,
    confidence: f64,
    reasoning: String,
    #[serde(default)]
    recommendations: Vec<String>,
    model: Option<String>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchClassifyResponse {
    results: Vec<ClassifyResponse>,
}

fn parse_severity(s: &str) -> Result<Severity> {
    match s {
        "critical" => Ok(Severity::Critical),
        "warning" => Ok(Severity::Warning),
        "info" => Ok(Severity::Info),
        "noise" => Ok(Severity::Noise),
        other => Err(ClassifyError::Llm(format!("unknown severity in LLM response: {other}"))),
    }
}

fn to_classification(fingerprint: &str, resp: ClassifyResponse) -> Result<Classification> {
    Ok(Classification {
        fingerprint: fingerprint.to_string(),
        severity: parse_severity(&resp.severity)?,
        confidence: resp.confidence.clamp(0.0, 1.0),
        reasoning: resp.reasoning,
        recommendations: resp.recommendations,
        processing_time_seconds: 0.0,
        source: ClassificationSource::Llm,
        model: resp.model,
        model_version: resp.model_version,
        cache_hit: false,
        created_at: Utc::now(),
    })
}

/// Talks to an HTTP LLM classification endpoint exposing `POST /classify`
/// and, optionally, `POST /classify/batch`.
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    batch_capable: bool,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, batch_capable: bool) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), batch_capable }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn classify(&self, alert: &Alert) -> Result<Classification> {
        let request = ClassifyRequest { alert_name: &alert.alert_name, labels: &alert.labels, annotations: &alert.annotations };

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifyError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifyError::Llm(format!("LLM returned status {}", response.status())));
        }

        let body: ClassifyResponse = response.json().await.map_err(|e| ClassifyError::Llm(e.to_string()))?;
        to_classification(&alert.fingerprint, body)
    }

    fn supports_batch(&self) -> bool {
        self.batch_capable
    }

    async fn classify_batch(&self, alerts: &[Alert]) -> Result<Vec<Classification>> {
        if !self.batch_capable {
            let mut out = Vec::with_capacity(alerts.len());
            for alert in alerts {
                out.push(self.classify(alert).await?);
            }
            return Ok(out);
        }

        let requests = alerts
            .iter()
            .map(|a| ClassifyRequest { alert_name: &a.alert_name, labels: &a.labels, annotations: &a.annotations })
            .collect();

        let batch_url = format!("{}/batch", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&batch_url)
            .json(&BatchClassifyRequest { alerts: requests })
            .send()
            .await
            .map_err(|e| ClassifyError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifyError::Llm(format!("LLM batch endpoint returned status {}", response.status())));
        }

        let body: BatchClassifyResponse = response.json().await.map_err(|e| ClassifyError::Llm(e.to_string()))?;
        if body.results.len() != alerts.len() {
            return Err(ClassifyError::Llm("LLM batch response length mismatch".to_string()));
        }

        alerts
            .iter()
            .zip(body.results)
            .map(|(alert, resp)| to_classification(&alert.fingerprint, resp))
            .collect()
    }
}

/// Fake LLM used by `bin/ah-dev`: always classifies as `info` with a fixed
/// reasoning string, so local iteration never needs a real model endpoint.
pub struct FakeLlmClient;

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn classify(&self, alert: &Alert) -> Result<Classification> {
        Ok(Classification {
            fingerprint: alert.fingerprint.clone(),
            severity: Severity::Info,
            confidence: 0.5,
            reasoning: "dev-mode fake LLM response".to_string(),
            recommendations: Vec::new(),
            processing_time_seconds: 0.0,
            source: ClassificationSource::Llm,
            model: Some("ah-dev-fake".to_string()),
            model_version: None,
            cache_hit: false,
            created_at: Utc::now(),
        })
    }
}
