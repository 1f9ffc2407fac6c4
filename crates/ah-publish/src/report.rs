//! `PublishReport` (§4.G): per-unit outcomes plus the aggregation rule that
//! decides the ingest orchestrator's overall HTTP status.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnitResult {
    pub receiver_name: String,
    pub target_type: String,
    pub config_index: usize,
    pub outcome: UnitOutcome,
    pub attempts: u32,
    pub last_response_code: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishReport {
    pub units: Vec<UnitResult>,
}

/// Overall HTTP status implied by `units` per §4.G aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    AllSuccess,
    Mixed,
    AllFailed,
    Empty,
}

impl PublishReport {
    pub fn status(&self) -> ReportStatus {
        if self.units.is_empty() {
            return ReportStatus::Empty;
        }
        let success = self.units.iter().filter(|u| u.outcome == UnitOutcome::Success).count();
        if success == self.units.len() {
            ReportStatus::AllSuccess
        } else if success == 0 {
            ReportStatus::AllFailed
        } else {
            ReportStatus::Mixed
        }
    }

    pub fn http_status(&self) -> u16 {
        match self.status() {
            ReportStatus::Empty | ReportStatus::AllSuccess => 200,
            ReportStatus::Mixed => 207,
            ReportStatus::AllFailed => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(outcome: UnitOutcome) -> UnitResult {
        UnitResult {
            receiver_name: "slack".to_string(),
            target_type: "chat".to_string(),
            config_index: 0,
            outcome,
            attempts: 1,
            last_response_code: None,
            reason: None,
        }
    }

    #[test]
    fn empty_report_is_200() {
        let report = PublishReport { units: vec![] };
        assert_eq!(report.status(), ReportStatus::Empty);
        assert_eq!(report.http_status(), 200);
    }

    #[test]
    fn all_success_is_200() {
        let report = PublishReport { units: vec![unit(UnitOutcome::Success), unit(UnitOutcome::Success)] };
        assert_eq!(report.http_status(), 200);
    }

    #[test]
    fn mixed_is_207() {
        let report = PublishReport { units: vec![unit(UnitOutcome::Success), unit(UnitOutcome::Failed)] };
        assert_eq!(report.http_status(), 207);
    }

    #[test]
    fn all_failed_is_502() {
        let report = PublishReport { units: vec![unit(UnitOutcome::Failed), unit(UnitOutcome::Skipped)] };
        assert_eq!(report.http_status(), 502);
    }
}
