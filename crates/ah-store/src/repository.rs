//! Alert Store trait (§4.B): idempotent upsert, lookup, filtered listing,
//! retention cleanup, aggregate stats, and the classification / publishing
//! history tables it also owns.

use async_trait::async_trait;

use ah_common::{Alert, Classification, PublishingAttempt};

use crate::error::Result;
use crate::filters::{AlertFilter, AlertStats};

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Upsert by `alert.fingerprint`. On conflict, preserves `created_at` and
    /// refreshes `updated_at` to now.
    async fn save_alert(&self, alert: Alert) -> Result<Alert>;

    async fn get_alert_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Alert>>;

    /// Ordered `starts_at DESC, fingerprint ASC`. Returns the page plus the
    /// total row count matching the filter (ignoring limit/offset).
    async fn list_alerts(&self, filter: AlertFilter) -> Result<(Vec<Alert>, i64)>;

    /// Fails with `StoreError::NotFound` if no row has this fingerprint.
    async fn update_alert(&self, alert: Alert) -> Result<Alert>;

    /// `idempotent = true` makes a missing fingerprint a no-op instead of
    /// `StoreError::NotFound`.
    async fn delete_alert(&self, fingerprint: &str, idempotent: bool) -> Result<()>;

    async fn get_alert_stats(&self) -> Result<AlertStats>;

    /// Deletes alerts with `starts_at < now - retention_days` and cascades
    /// to their classifications and publishing history. Returns the count
    /// of alert rows removed.
    async fn cleanup_old_alerts(&self, retention_days: i64) -> Result<u64>;

    async fn save_classification(&self, classification: Classification) -> Result<Classification>;

    async fn get_classification(&self, fingerprint: &str) -> Result<Option<Classification>>;

    async fn append_publishing_attempt(&self, attempt: PublishingAttempt) -> Result<()>;

    /// Ordered newest first.
    async fn get_publishing_history(&self, fingerprint: &str) -> Result<Vec<PublishingAttempt>>;
}
