//! Rule-based fallback classifier (§4.E): deterministic, used whenever the
//! LLM path times out, errors, or returns a 5xx.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use ah_common::{Alert, Classification, ClassificationSource, Severity};

static ALERT_NAME_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)down|crash|panic|oom").expect("fallback alert-name pattern is valid"));

/// First matching rule wins, in the order given by §4.E.
pub fn classify(alert: &Alert) -> Classification {
    let (severity, confidence, reasoning) = match alert.label_severity() {
        Some("critical") | Some("page") => (Severity::Critical, 0.6, "labels.severity indicates critical/page"),
        Some("warning") => (Severity::Warning, 0.6, "labels.severity is warning"),
        Some("info") => (Severity::Info, 0.6, "labels.severity is info"),
        _ if ALERT_NAME_RULE.is_match(&alert.alert_name) => {
            (Severity::Critical, 0.4, "alert name matches down/crash/panic/oom pattern")
        }
        _ => (Severity::Info, 0.2, "no rule matched"),
    };

    Classification {
        fingerprint: alert.fingerprint.clone(),
        severity,
        confidence,
        reasoning: reasoning.to_string(),
        recommendations: Vec::new(),
        processing_time_seconds: 0.0,
        source: ClassificationSource::Fallback,
        model: None,
        model_version: None,
        cache_hit: false,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn alert_with(name: &str, severity_label: Option<&str>) -> Alert {
        let mut labels = BTreeMap::new();
        if let Some(s) = severity_label {
            labels.insert("severity".to_string(), s.to_string());
        }
        let now = Utc::now();
        Alert {
            fingerprint: "a".repeat(64),
            alert_name: name.to_string(),
            status: ah_common::AlertStatus::Firing,
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
    fn severity_label_critical_or_page_wins_first() {
        for label in ["critical", "page"] {
            let c = classify(&alert_with("SomeAlert", Some(label)));
            assert_eq!(c.severity, Severity::Critical);
            assert_eq!(c.confidence, 0.6);
        }
    }

    #[test]
    fn severity_label_warning_and_info_pass_through() {
        assert_eq!(classify(&alert_with("SomeAlert", Some("warning"))).severity, Severity::Warning);
        assert_eq!(classify(&alert_with("SomeAlert", Some("info"))).severity, Severity::Info);
    }

    #[test]
    fn alert_name_pattern_wins_when_no_severity_label() {
        let c = classify(&alert_with("ServiceDown", None));
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.confidence, 0.4);
    }

    #[test]
    fn default_rule_is_low_confidence_info() {
        let c = classify(&alert_with("SomeUnrelatedAlert", None));
        assert_eq!(c.severity, Severity::Info);
        assert_eq!(c.confidence, 0.2);
        assert_eq!(c.reasoning, "no rule matched");
    }

    #[test]
    fn fallback_classification_always_has_source_fallback() {
        let c = classify(&alert_with("x", None));
        assert_eq!(c.source, ClassificationSource::Fallback);
        assert!(!c.cache_hit);
    }
}
