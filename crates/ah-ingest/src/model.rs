//! Request/response DTOs for `POST /webhook` (§6). The inbound shape mirrors
//! the widely used alert-manager webhook payload; the outbound shape is
//! specific to this system's per-alert aggregation rule.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ah_common::{AlertStatus, Severity};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngestBatchRequest {
    pub alerts: Vec<IncomingAlert>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncomingAlert {
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub status: AlertStatus,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: Option<String>,
}

/// Per-alert outcome folded into the batch-level `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertOutcomeStatus {
    Ok,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestAlertDetail {
    pub fingerprint: String,
    pub status: AlertOutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub silenced: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub silence_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Ok,
    Partial,
    Error,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestResponse {
    pub status: BatchStatus,
    pub fingerprints: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<IngestAlertDetail>>,
}

impl IngestResponse {
    pub fn http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self.status {
            BatchStatus::Ok => StatusCode::OK,
            BatchStatus::Partial => StatusCode::MULTI_STATUS,
            BatchStatus::Error => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn from_details(details: Vec<IngestAlertDetail>) -> Self {
        let fingerprints = details.iter().map(|d| d.fingerprint.clone()).collect();
        let count = details.len();
        let status = if details.is_empty() {
            BatchStatus::Ok
        } else if details.iter().all(|d| d.status == AlertOutcomeStatus::Ok) {
            BatchStatus::Ok
        } else if details.iter().all(|d| d.status == AlertOutcomeStatus::Failed) {
            BatchStatus::Error
        } else {
            BatchStatus::Partial
        };
        IngestResponse { status, fingerprints, count, details: Some(details) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthState,
    pub time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(status: AlertOutcomeStatus) -> IngestAlertDetail {
        IngestAlertDetail {
            fingerprint: "a".repeat(64),
            status,
            severity: None,
            silenced: false,
            silence_ids: vec![],
            error: None,
        }
    }

    #[test]
    fn all_ok_yields_200() {
        let response = IngestResponse::from_details(vec![detail(AlertOutcomeStatus::Ok)]);
        assert_eq!(response.status, BatchStatus::Ok);
        assert_eq!(response.http_status(), axum::http::StatusCode::OK);
    }

    #[test]
    fn mixed_yields_207() {
        let response = IngestResponse::from_details(vec![
            detail(AlertOutcomeStatus::Ok),
            detail(AlertOutcomeStatus::Failed),
        ]);
        assert_eq!(response.status, BatchStatus::Partial);
        assert_eq!(response.http_status(), axum::http::StatusCode::MULTI_STATUS);
    }

    #[test]
    fn all_failed_yields_502() {
        let response = IngestResponse::from_details(vec![detail(AlertOutcomeStatus::Failed)]);
        assert_eq!(response.status, BatchStatus::Error);
        assert_eq!(response.http_status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn empty_batch_yields_200() {
        let response = IngestResponse::from_details(vec![]);
        assert_eq!(response.status, BatchStatus::Ok);
    }
}
