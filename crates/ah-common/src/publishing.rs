//! PublishingAttempt — the append-only audit log written by the Publishing
//! Fanout (§4.G) and owned through the Alert Store (§4.B).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Failed,
    Skipped,
}

/// One dispatch try; each retry of the same unit is its own row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PublishingAttempt {
    pub alert_fingerprint: String,
    pub target_name: String,
    pub target_type: String,
    pub status: AttemptStatus,
    pub attempt_number: u32,
    pub response_code: Option<i32>,
    pub response_message: Option<String>,
    pub payload_size: Option<i64>,
    pub processing_time_seconds: f64,
    pub error_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl PublishingAttempt {
    pub fn skipped(
        alert_fingerprint: impl Into<String>,
        target_name: impl Into<String>,
        target_type: impl Into<String>,
        reason: &str,
    ) -> Self {
        Self {
            alert_fingerprint: alert_fingerprint.into(),
            target_name: target_name.into(),
            target_type: target_type.into(),
            status: AttemptStatus::Skipped,
            attempt_number: 1,
            response_code: None,
            response_message: Some(reason.to_string()),
            payload_size: None,
            processing_time_seconds: 0.0,
            error_details: Some(serde_json::json!({ "reason": reason })),
            created_at: Utc::now(),
        }
    }
}
