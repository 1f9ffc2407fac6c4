//! Alert and Classification domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Firing/resolution state of an alert as reported by the upstream alert manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Firing,
    Resolved,
    Pending,
}

/// Classified severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Noise,
}

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Llm,
    Fallback,
    Cache,
}

/// Identity is `fingerprint`: the SHA-256 hex of the canonicalized label set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub fingerprint: String,
    pub alert_name: String,
    pub status: AlertStatus,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub generator_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// `namespace` is derived from `labels["namespace"]`, not stored independently.
    pub fn namespace(&self) -> Option<&str> {
        self.labels.get("namespace").map(String::as_str)
    }

    /// `severity` as reported by the alert's own labels (distinct from the
    /// Classification Engine's computed severity), used by `ListAlerts` filters.
    pub fn label_severity(&self) -> Option<&str> {
        self.labels.get("severity").map(String::as_str)
    }
}

/// Keyed by alert fingerprint, 1:1 latest — classification is replaceable (upsert).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Classification {
    pub fingerprint: String,
    pub severity: Severity,
    pub confidence: f64,
    pub reasoning: String,
    pub recommendations: Vec<String>,
    pub processing_time_seconds: f64,
    pub source: ClassificationSource,
    pub model: Option<String>,
    pub model_version: Option<String>,
    pub cache_hit: bool,
    pub created_at: DateTime<Utc>,
}

impl Classification {
    /// `confidence` is always clamped to `[0,1]` so the invariant in §4.E
    /// holds regardless of what an LLM response claims.
    pub fn clamp_confidence(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert() -> Alert {
        let mut labels = BTreeMap::new();
        labels.insert("namespace".to_string(), "payments".to_string());
        labels.insert("severity".to_string(), "critical".to_string());
        let now = Utc::now();
        Alert {
            fingerprint: "a".repeat(64),
            alert_name: "HighCPU".to_string(),
            status: AlertStatus::Firing,
            labels,
            annotations: BTreeMap::new(),
            starts_at: now,
            ends_at: None,
            generator_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn namespace_is_derived_from_labels() {
        let alert = sample_alert();
        assert_eq!(alert.namespace(), Some("payments"));
    }

    #[test]
    fn namespace_absent_when_label_missing() {
        let mut alert = sample_alert();
        alert.labels.remove("namespace");
        assert_eq!(alert.namespace(), None);
    }

    #[test]
    fn classification_confidence_is_clamped() {
        let c = Classification {
            fingerprint: "a".repeat(64),
            severity: Severity::Critical,
            confidence: 1.4,
            reasoning: "test".to_string(),
            recommendations: vec![],
            processing_time_seconds: 0.1,
            source: ClassificationSource::Fallback,
            model: None,
            model_version: None,
            cache_hit: false,
            created_at: Utc::now(),
        }
        .clamp_confidence();
        assert_eq!(c.confidence, 1.0);
    }
}
