//! Query shapes for `ListAlerts` and `GetAlertStats`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Filters recognized by `ListAlerts`. `labels` uses JSON-subset containment:
/// every key/value pair supplied must match exactly on the stored alert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertFilter {
    pub status: Option<String>,
    pub severity: Option<String>,
    pub namespace: Option<String>,
    pub time_range: Option<TimeRange>,
    pub labels: BTreeMap<String, String>,
    pub limit: i64,
    pub offset: i64,
}

impl AlertFilter {
    /// Clamp limit to `[1,1000]` and offset to `>=0`, rejecting anything
    /// outside the bounds the spec allows rather than silently truncating.
    pub fn validated(mut self) -> Result<Self> {
        if self.limit == 0 {
            self.limit = 100;
        }
        if !(1..=1000).contains(&self.limit) {
            return Err(StoreError::InvalidFilter(format!(
                "limit must be in [1,1000], got {}",
                self.limit
            )));
        }
        if self.offset < 0 {
            return Err(StoreError::InvalidFilter(format!(
                "offset must be >= 0, got {}",
                self.offset
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_severity: BTreeMap<String, i64>,
    pub by_namespace: BTreeMap<String, i64>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_defaults_to_100() {
        let f = AlertFilter::default().validated().unwrap();
        assert_eq!(f.limit, 100);
    }

    #[test]
    fn limit_over_1000_rejected() {
        let f = AlertFilter { limit: 1001, ..Default::default() };
        assert!(f.validated().is_err());
    }

    #[test]
    fn negative_offset_rejected() {
        let f = AlertFilter { limit: 10, offset: -1, ..Default::default() };
        assert!(f.validated().is_err());
    }
}
