//! Target-specific payload encoders (§6). Each dispatch unit is encoded
//! according to its `TargetType` before signing and transport.

use ah_common::{Alert, Classification, DispatchConfig, Severity, TargetType};
use serde_json::{json, Value};

fn severity_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Noise => "noise",
    }
}

/// Chat-webhook target: `{text, blocks?}`.
fn encode_chat(alert: &Alert, classification: &Classification) -> Value {
    let summary = alert
        .annotations
        .get("summary")
        .cloned()
        .unwrap_or_else(|| alert.alert_name.clone());
    json!({
        "text": format!("[{}] {}: {}", severity_str(classification.severity), alert.alert_name, summary),
        "blocks": [
            {
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": format!(
                        "*{}* — {}\nseverity: `{}` confidence: `{:.2}`\n{}",
                        alert.alert_name,
                        summary,
                        severity_str(classification.severity),
                        classification.confidence,
                        classification.reasoning,
                    ),
                },
            }
        ],
    })
}

/// Incident target: PagerDuty Events v2-style envelope.
fn encode_incident(alert: &Alert, classification: &Classification, config: &DispatchConfig) -> Value {
    let event_action = match alert.status {
        ah_common::AlertStatus::Resolved => "resolve",
        ah_common::AlertStatus::Firing | ah_common::AlertStatus::Pending => "trigger",
    };
    let routing_key = config.headers.get("X-Routing-Key").cloned().unwrap_or_default();
    json!({
        "routing_key": routing_key,
        "event_action": event_action,
        "dedup_key": alert.fingerprint,
        "payload": {
            "summary": alert.annotations.get("summary").cloned().unwrap_or_else(|| alert.alert_name.clone()),
            "severity": severity_str(classification.severity),
            "source": alert.generator_url.clone().unwrap_or_else(|| "alert-history".to_string()),
        },
    })
}

/// Incident-management target: JSON:API-ish envelope used by ITSM email-intake
/// gateways that `email_configs` route through (this system has no SMTP
/// transport of its own).
fn encode_incident_management(alert: &Alert, classification: &Classification) -> Value {
    json!({
        "data": {
            "type": "incidents",
            "attributes": {
                "title": alert.alert_name,
                "severity": severity_str(classification.severity),
                "summary": alert.annotations.get("summary").cloned().unwrap_or_default(),
                "status": match alert.status {
                    ah_common::AlertStatus::Resolved => "resolved",
                    _ => "open",
                },
                "environment": alert.namespace().unwrap_or("unknown"),
            },
        },
    })
}

/// Generic webhook target: the alert/classification as-is, signed with HMAC
/// when the dispatch unit carries a signing secret header.
fn encode_webhook(alert: &Alert, classification: &Classification) -> Value {
    json!({
        "alert": {
            "fingerprint": alert.fingerprint,
            "alert_name": alert.alert_name,
            "status": alert.status,
            "labels": alert.labels,
            "annotations": alert.annotations,
            "starts_at": alert.starts_at,
            "ends_at": alert.ends_at,
            "generator_url": alert.generator_url,
        },
        "classification": {
            "severity": classification.severity,
            "confidence": classification.confidence,
            "reasoning": classification.reasoning,
            "recommendations": classification.recommendations,
        },
    })
}

pub fn encode(
    target_type: TargetType,
    alert: &Alert,
    classification: &Classification,
    config: &DispatchConfig,
) -> Value {
    match target_type {
        TargetType::Chat => encode_chat(alert, classification),
        TargetType::Incident => encode_incident(alert, classification, config),
        TargetType::Email => encode_incident_management(alert, classification),
        TargetType::Webhook => encode_webhook(alert, classification),
    }
}
