//! Postgres-backed `AlertStore` (§4.B). Goes through the Pool Façade
//! (`ah_pool::AlertPool`) for connection lifecycle and takes its raw
//! `sqlx::PgPool` handle for parameterized queries — the façade's own
//! `execute`/`query` helpers are positional-SQL only and have no room for
//! bound parameters, which every query here needs (fingerprint lookups,
//! JSONB labels, filter predicates).

use std::collections::BTreeMap;

use ah_common::{
    Alert, AlertStatus, Classification, ClassificationSource, PublishingAttempt, Severity,
};
use ah_common::publishing::AttemptStatus;
use ah_pool::{retry_executor, AlertPool, PoolError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::filters::{AlertFilter, AlertStats};
use crate::repository::AlertStore;

pub struct PgAlertStore {
    pool: PgPool,
    retry_policy: ah_common::RetryPolicy,
}

impl PgAlertStore {
    /// Borrows the raw Postgres handle out of an already-connected
    /// `AlertPool`. Returns `StoreError::Pool(ConnectionClosed)` if the pool
    /// has not connected yet.
    pub fn from_pool(pool: &AlertPool) -> Result<Self> {
        let raw = pool.raw().ok_or(PoolError::ConnectionClosed)?;
        Ok(Self {
            pool: raw,
            retry_policy: ah_common::RetryPolicy::pool_default(),
        })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool, retry_policy: ah_common::RetryPolicy::pool_default() }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| StoreError::Database(e.into()))?;
        info!("alert store migrations applied");
        Ok(())
    }

    async fn retrying<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        let cancel = CancellationToken::new();
        retry_executor::execute(&self.retry_policy, &cancel, op)
            .await
            .map_err(|e| match e {
                PoolError::Database(err) => StoreError::Database(err),
                other => StoreError::Pool(other),
            })
    }

    fn labels_of(row: &PgRow) -> std::result::Result<BTreeMap<String, String>, sqlx::Error> {
        let value: serde_json::Value = row.try_get("labels")?;
        serde_json::from_value(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    fn annotations_of(row: &PgRow) -> std::result::Result<BTreeMap<String, String>, sqlx::Error> {
        let value: serde_json::Value = row.try_get("annotations")?;
        serde_json::from_value(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    fn parse_alert(row: &PgRow) -> std::result::Result<Alert, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Alert {
            fingerprint: row.try_get("fingerprint")?,
            alert_name: row.try_get("alert_name")?,
            status: parse_status(&status)?,
            labels: Self::labels_of(row)?,
            annotations: Self::annotations_of(row)?,
            starts_at: row.try_get("starts_at")?,
            ends_at: row.try_get("ends_at")?,
            generator_url: row.try_get("generator_url")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn parse_classification(row: &PgRow) -> std::result::Result<Classification, sqlx::Error> {
        let severity: String = row.try_get("severity")?;
        let source: String = row.try_get("source")?;
        let recommendations: serde_json::Value = row.try_get("recommendations")?;
        Ok(Classification {
            fingerprint: row.try_get("alert_fingerprint")?,
            severity: parse_severity(&severity)?,
            confidence: row.try_get("confidence")?,
            reasoning: row.try_get("reasoning")?,
            recommendations: serde_json::from_value(recommendations)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            processing_time_seconds: row.try_get("processing_time_seconds")?,
            source: parse_source(&source)?,
            model: row.try_get("model")?,
            model_version: row.try_get("model_version")?,
            cache_hit: row.try_get("cache_hit")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_attempt(row: &PgRow) -> std::result::Result<PublishingAttempt, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(PublishingAttempt {
            alert_fingerprint: row.try_get("alert_fingerprint")?,
            target_name: row.try_get("target_name")?,
            target_type: row.try_get("target_type")?,
            status: parse_attempt_status(&status)?,
            attempt_number: row.try_get::<i32, _>("attempt_number")? as u32,
            response_code: row.try_get("response_code")?,
            response_message: row.try_get("response_message")?,
            payload_size: row.try_get("payload_size")?,
            processing_time_seconds: row.try_get("processing_time_seconds")?,
            error_details: row.try_get("error_details")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn parse_status(s: &str) -> std::result::Result<AlertStatus, sqlx::Error> {
    match s {
        "firing" => Ok(AlertStatus::Firing),
        "resolved" => Ok(AlertStatus::Resolved),
        "pending" => Ok(AlertStatus::Pending),
        other => Err(sqlx::Error::Decode(format!("unknown alert status {other}").into())),
    }
}

fn status_str(s: AlertStatus) -> &'static str {
    match s {
        AlertStatus::Firing => "firing",
        AlertStatus::Resolved => "resolved",
        AlertStatus::Pending => "pending",
    }
}

fn parse_severity(s: &str) -> std::result::Result<Severity, sqlx::Error> {
    match s {
        "critical" => Ok(Severity::Critical),
        "warning" => Ok(Severity::Warning),
        "info" => Ok(Severity::Info),
        "noise" => Ok(Severity::Noise),
        other => Err(sqlx::Error::Decode(format!("unknown severity {other}").into())),
    }
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Critical => "critical",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Noise => "noise",
    }
}

fn parse_source(s: &str) -> std::result::Result<ClassificationSource, sqlx::Error> {
    match s {
        "llm" => Ok(ClassificationSource::Llm),
        "fallback" => Ok(ClassificationSource::Fallback),
        "cache" => Ok(ClassificationSource::Cache),
        other => Err(sqlx::Error::Decode(format!("unknown classification source {other}").into())),
    }
}

fn source_str(s: ClassificationSource) -> &'static str {
    match s {
        ClassificationSource::Llm => "llm",
        ClassificationSource::Fallback => "fallback",
        ClassificationSource::Cache => "cache",
    }
}

fn parse_attempt_status(s: &str) -> std::result::Result<AttemptStatus, sqlx::Error> {
    match s {
        "success" => Ok(AttemptStatus::Success),
        "failed" => Ok(AttemptStatus::Failed),
        "skipped" => Ok(AttemptStatus::Skipped),
        other => Err(sqlx::Error::Decode(format!("unknown attempt status {other}").into())),
    }
}

fn attempt_status_str(s: AttemptStatus) -> &'static str {
    match s {
        AttemptStatus::Success => "success",
        AttemptStatus::Failed => "failed",
        AttemptStatus::Skipped => "skipped",
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn save_alert(&self, alert: Alert) -> Result<Alert> {
        let labels = serde_json::to_value(&alert.labels)?;
        let annotations = serde_json::to_value(&alert.annotations)?;
        let namespace = alert.namespace().map(str::to_string);
        let status = status_str(alert.status);

        let row = self
            .retrying(|| {
                sqlx::query(
                    r#"
                    INSERT INTO alerts
                        (fingerprint, alert_name, status, labels, annotations, namespace,
                         starts_at, ends_at, generator_url, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
                    ON CONFLICT (fingerprint) DO UPDATE SET
                        alert_name = EXCLUDED.alert_name,
                        status = EXCLUDED.status,
                        labels = EXCLUDED.labels,
                        annotations = EXCLUDED.annotations,
                        namespace = EXCLUDED.namespace,
                        starts_at = EXCLUDED.starts_at,
                        ends_at = EXCLUDED.ends_at,
                        generator_url = EXCLUDED.generator_url,
                        updated_at = now()
                    RETURNING fingerprint, alert_name, status, labels, annotations,
                              starts_at, ends_at, generator_url, created_at, updated_at
                    "#,
                )
                .bind(&alert.fingerprint)
                .bind(&alert.alert_name)
                .bind(status)
                .bind(&labels)
                .bind(&annotations)
                .bind(&namespace)
                .bind(alert.starts_at)
                .bind(alert.ends_at)
                .bind(&alert.generator_url)
                .fetch_one(&self.pool)
            })
            .await?;

        Self::parse_alert(&row).map_err(StoreError::Database)
    }

    async fn get_alert_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Alert>> {
        let row = self
            .retrying(|| {
                sqlx::query(
                    "SELECT fingerprint, alert_name, status, labels, annotations, starts_at, \
                     ends_at, generator_url, created_at, updated_at FROM alerts WHERE fingerprint = $1",
                )
                .bind(fingerprint)
                .fetch_optional(&self.pool)
            })
            .await?;

        row.as_ref().map(Self::parse_alert).transpose().map_err(StoreError::Database)
    }

    async fn list_alerts(&self, filter: AlertFilter) -> Result<(Vec<Alert>, i64)> {
        let filter = filter.validated()?;

        let build_where = |qb: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>| {
            let mut first = true;
            let mut and = |qb: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>| {
                qb.push(if first { " WHERE " } else { " AND " });
                first = false;
            };
            if let Some(status) = &filter.status {
                and(qb);
                qb.push("status = ").push_bind(status.clone());
            }
            if let Some(severity) = &filter.severity {
                and(qb);
                qb.push("labels->>'severity' = ").push_bind(severity.clone());
            }
            if let Some(namespace) = &filter.namespace {
                and(qb);
                qb.push("namespace = ").push_bind(namespace.clone());
            }
            if let Some(from) = filter.time_range.as_ref().and_then(|t| t.from) {
                and(qb);
                qb.push("starts_at >= ").push_bind(from);
            }
            if let Some(to) = filter.time_range.as_ref().and_then(|t| t.to) {
                and(qb);
                qb.push("starts_at <= ").push_bind(to);
            }
            if !filter.labels.is_empty() {
                and(qb);
                let labels_json = serde_json::to_value(&filter.labels).expect("label map serializes");
                qb.push("labels @> ").push_bind(labels_json);
            }
        };

        let total: i64 = self
            .retrying(|| {
                let mut qb = sqlx::QueryBuilder::new("SELECT count(*) AS total FROM alerts");
                build_where(&mut qb);
                async move { qb.build().fetch_one(&self.pool).await }
            })
            .await?
            .try_get("total")
            .map_err(StoreError::Database)?;

        let rows = self
            .retrying(|| {
                let mut qb = sqlx::QueryBuilder::new(
                    "SELECT fingerprint, alert_name, status, labels, annotations, starts_at, ends_at, \
                     generator_url, created_at, updated_at FROM alerts",
                );
                build_where(&mut qb);
                qb.push(" ORDER BY starts_at DESC, fingerprint ASC LIMIT ")
                    .push_bind(filter.limit)
                    .push(" OFFSET ")
                    .push_bind(filter.offset);
                async move { qb.build().fetch_all(&self.pool).await }
            })
            .await?;

        let alerts = rows.iter().map(Self::parse_alert).collect::<std::result::Result<Vec<_>, _>>().map_err(StoreError::Database)?;
        Ok((alerts, total))
    }

    async fn update_alert(&self, alert: Alert) -> Result<Alert> {
        let labels = serde_json::to_value(&alert.labels)?;
        let annotations = serde_json::to_value(&alert.annotations)?;
        let namespace = alert.namespace().map(str::to_string);
        let status = status_str(alert.status);

        let row = self
            .retrying(|| {
                sqlx::query(
                    r#"
                    UPDATE alerts SET
                        alert_name = $2, status = $3, labels = $4, annotations = $5,
                        namespace = $6, starts_at = $7, ends_at = $8, generator_url = $9,
                        updated_at = now()
                    WHERE fingerprint = $1
                    RETURNING fingerprint, alert_name, status, labels, annotations,
                              starts_at, ends_at, generator_url, created_at, updated_at
                    "#,
                )
                .bind(&alert.fingerprint)
                .bind(&alert.alert_name)
                .bind(status)
                .bind(&labels)
                .bind(&annotations)
                .bind(&namespace)
                .bind(alert.starts_at)
                .bind(alert.ends_at)
                .bind(&alert.generator_url)
                .fetch_optional(&self.pool)
            })
            .await?;

        match row {
            Some(row) => Self::parse_alert(&row).map_err(StoreError::Database),
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_alert(&self, fingerprint: &str, idempotent: bool) -> Result<()> {
        let result = self
            .retrying(|| sqlx::query("DELETE FROM alerts WHERE fingerprint = $1").bind(fingerprint).execute(&self.pool))
            .await?;

        if result.rows_affected() == 0 && !idempotent {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_alert_stats(&self) -> Result<AlertStats> {
        let total: i64 = self
            .retrying(|| sqlx::query("SELECT count(*) AS total FROM alerts").fetch_one(&self.pool))
            .await?
            .try_get("total")
            .map_err(StoreError::Database)?;

        let by_status_rows = self
            .retrying(|| sqlx::query("SELECT status, count(*) AS n FROM alerts GROUP BY status").fetch_all(&self.pool))
            .await?;
        let by_status = by_status_rows
            .iter()
            .map(|r| Ok((r.try_get::<String, _>("status")?, r.try_get::<i64, _>("n")?)))
            .collect::<std::result::Result<BTreeMap<_, _>, sqlx::Error>>()
            .map_err(StoreError::Database)?;

        let by_severity_rows = self
            .retrying(|| {
                sqlx::query(
                    "SELECT coalesce(labels->>'severity', 'unknown') AS severity, count(*) AS n \
                     FROM alerts GROUP BY severity",
                )
                .fetch_all(&self.pool)
            })
            .await?;
        let by_severity = by_severity_rows
            .iter()
            .map(|r| Ok((r.try_get::<String, _>("severity")?, r.try_get::<i64, _>("n")?)))
            .collect::<std::result::Result<BTreeMap<_, _>, sqlx::Error>>()
            .map_err(StoreError::Database)?;

        let by_namespace_rows = self
            .retrying(|| {
                sqlx::query("SELECT coalesce(namespace, 'unknown') AS namespace, count(*) AS n FROM alerts GROUP BY namespace")
                    .fetch_all(&self.pool)
            })
            .await?;
        let by_namespace = by_namespace_rows
            .iter()
            .map(|r| Ok((r.try_get::<String, _>("namespace")?, r.try_get::<i64, _>("n")?)))
            .collect::<std::result::Result<BTreeMap<_, _>, sqlx::Error>>()
            .map_err(StoreError::Database)?;

        let bounds = self
            .retrying(|| sqlx::query("SELECT min(starts_at) AS oldest, max(starts_at) AS newest FROM alerts").fetch_one(&self.pool))
            .await?;
        let oldest: Option<DateTime<Utc>> = bounds.try_get("oldest").map_err(StoreError::Database)?;
        let newest: Option<DateTime<Utc>> = bounds.try_get("newest").map_err(StoreError::Database)?;

        Ok(AlertStats { total, by_status, by_severity, by_namespace, oldest, newest })
    }

    async fn cleanup_old_alerts(&self, retention_days: i64) -> Result<u64> {
        let result = self
            .retrying(|| {
                sqlx::query("DELETE FROM alerts WHERE starts_at < now() - ($1 || ' days')::interval")
                    .bind(retention_days.to_string())
                    .execute(&self.pool)
            })
            .await?;
        Ok(result.rows_affected())
    }

    async fn save_classification(&self, classification: Classification) -> Result<Classification> {
        let recommendations = serde_json::to_value(&classification.recommendations)?;
        let severity = severity_str(classification.severity);
        let source = source_str(classification.source);

        let row = self
            .retrying(|| {
                sqlx::query(
                    r#"
                    INSERT INTO alert_classifications
                        (alert_fingerprint, severity, confidence, reasoning, recommendations,
                         processing_time_seconds, source, model, model_version, cache_hit, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
                    ON CONFLICT (alert_fingerprint) DO UPDATE SET
                        severity = EXCLUDED.severity,
                        confidence = EXCLUDED.confidence,
                        reasoning = EXCLUDED.reasoning,
                        recommendations = EXCLUDED.recommendations,
                        processing_time_seconds = EXCLUDED.processing_time_seconds,
                        source = EXCLUDED.source,
                        model = EXCLUDED.model,
                        model_version = EXCLUDED.model_version,
                        cache_hit = EXCLUDED.cache_hit,
                        created_at = now()
                    RETURNING alert_fingerprint, severity, confidence, reasoning, recommendations,
                              processing_time_seconds, source, model, model_version, cache_hit, created_at
                    "#,
                )
                .bind(&classification.fingerprint)
                .bind(severity)
                .bind(classification.confidence)
                .bind(&classification.reasoning)
                .bind(&recommendations)
                .bind(classification.processing_time_seconds)
                .bind(source)
                .bind(&classification.model)
                .bind(&classification.model_version)
                .bind(classification.cache_hit)
                .fetch_one(&self.pool)
            })
            .await?;

        Self::parse_classification(&row).map_err(StoreError::Database)
    }

    async fn get_classification(&self, fingerprint: &str) -> Result<Option<Classification>> {
        let row = self
            .retrying(|| {
                sqlx::query(
                    "SELECT alert_fingerprint, severity, confidence, reasoning, recommendations, \
                     processing_time_seconds, source, model, model_version, cache_hit, created_at \
                     FROM alert_classifications WHERE alert_fingerprint = $1",
                )
                .bind(fingerprint)
                .fetch_optional(&self.pool)
            })
            .await?;

        row.as_ref().map(Self::parse_classification).transpose().map_err(StoreError::Database)
    }

    async fn append_publishing_attempt(&self, attempt: PublishingAttempt) -> Result<()> {
        let status = attempt_status_str(attempt.status);
        self.retrying(|| {
            sqlx::query(
                r#"
                INSERT INTO alert_publishing_history
                    (alert_fingerprint, target_name, target_type, status, attempt_number,
                     response_code, response_message, payload_size, processing_time_seconds,
                     error_details, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
                "#,
            )
            .bind(&attempt.alert_fingerprint)
            .bind(&attempt.target_name)
            .bind(&attempt.target_type)
            .bind(status)
            .bind(attempt.attempt_number as i32)
            .bind(attempt.response_code)
            .bind(&attempt.response_message)
            .bind(attempt.payload_size)
            .bind(attempt.processing_time_seconds)
            .bind(&attempt.error_details)
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    async fn get_publishing_history(&self, fingerprint: &str) -> Result<Vec<PublishingAttempt>> {
        let rows = self
            .retrying(|| {
                sqlx::query(
                    "SELECT alert_fingerprint, target_name, target_type, status, attempt_number, \
                     response_code, response_message, payload_size, processing_time_seconds, \
                     error_details, created_at FROM alert_publishing_history \
                     WHERE alert_fingerprint = $1 ORDER BY created_at DESC",
                )
                .bind(fingerprint)
                .fetch_all(&self.pool)
            })
            .await?;

        rows.iter().map(Self::parse_attempt).collect::<std::result::Result<Vec<_>, _>>().map_err(StoreError::Database)
    }
}
