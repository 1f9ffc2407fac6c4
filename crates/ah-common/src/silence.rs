//! Silence and Matcher domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Prometheus-style matcher operator. Regex variants use full-string match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MatcherType {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "=~")]
    EqRegex,
    #[serde(rename = "!~")]
    NeqRegex,
}

/// `(name, value, type)`. Regex types require a compilable pattern in `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Matcher {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub matcher_type: MatcherType,
}

impl Matcher {
    /// `name` must match `[a-zA-Z_][a-zA-Z0-9_]*`.
    pub fn has_valid_name(&self) -> bool {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.matcher_type, MatcherType::EqRegex | MatcherType::NeqRegex)
    }
}

/// Derived from `(now, starts_at, ends_at)`, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SilenceStatus {
    Pending,
    Active,
    Expired,
}

/// Identity is `id`. Owned by an external admin subsystem; this system only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Silence {
    pub id: Uuid,
    pub created_by: String,
    pub comment: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub matchers: Vec<Matcher>,
}

impl Silence {
    pub fn status(&self, now: DateTime<Utc>) -> SilenceStatus {
        if now < self.starts_at {
            SilenceStatus::Pending
        } else if now >= self.ends_at {
            SilenceStatus::Expired
        } else {
            SilenceStatus::Active
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == SilenceStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(starts: DateTime<Utc>, ends: DateTime<Utc>) -> Silence {
        Silence {
            id: Uuid::new_v4(),
            created_by: "oncall".to_string(),
            comment: "maintenance window".to_string(),
            starts_at: starts,
            ends_at: ends,
            matchers: vec![Matcher {
                name: "alertname".to_string(),
                value: "HighCPU".to_string(),
                matcher_type: MatcherType::Eq,
            }],
        }
    }

    #[test]
    fn status_transitions() {
        let now = Utc::now();
        let s = sample(now - Duration::hours(1), now + Duration::hours(1));
        assert_eq!(s.status(now), SilenceStatus::Active);

        let pending = sample(now + Duration::hours(1), now + Duration::hours(2));
        assert_eq!(pending.status(now), SilenceStatus::Pending);

        let expired = sample(now - Duration::hours(2), now - Duration::hours(1));
        assert_eq!(expired.status(now), SilenceStatus::Expired);
    }

    #[test]
    fn matcher_name_validation() {
        let valid = Matcher { name: "_alert_name1".to_string(), value: "x".to_string(), matcher_type: MatcherType::Eq };
        assert!(valid.has_valid_name());

        let invalid = Matcher { name: "1alert".to_string(), value: "x".to_string(), matcher_type: MatcherType::Eq };
        assert!(!invalid.has_valid_name());
    }
}
