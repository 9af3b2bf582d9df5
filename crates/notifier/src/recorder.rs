//! Delivery recorder — the append-only audit trail of dispatches.
//!
//! Write discipline:
//! - a record is written once when its dispatch opens (all channels pending)
//!   and rewritten in place when the channel sends settle;
//! - only the dispatch that opened a record writes it, guarded by the
//!   dispatcher's in-flight lock on (alert, recipient);
//! - retries never touch earlier records, they open a new one with the next
//!   attempt number.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use sentinel_common::types::{Channel, DeliveryAttempt, DeliveryStatus, NotificationRecord};

use crate::error::NotifierError;

#[async_trait]
pub trait DeliveryRecorder: Send + Sync {
    /// Attempt number the next dispatch of this pair should use (1 for the first).
    async fn next_attempt_number(
        &self,
        alert_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<i32, NotifierError>;

    /// Insert the record, or update it in place if its id is already stored.
    async fn write(&self, record: &NotificationRecord) -> Result<(), NotifierError>;

    /// All records for an alert, oldest first.
    async fn query_by_alert(&self, alert_id: Uuid)
    -> Result<Vec<NotificationRecord>, NotifierError>;

    /// All records for a recipient, oldest first.
    async fn query_by_recipient(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, NotifierError>;
}

fn sort_records(records: &mut [NotificationRecord]) {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then(a.attempt_number.cmp(&b.attempt_number))
    });
}

/// Process-local recorder used for tests and single-node runs without Postgres.
#[derive(Default)]
pub struct InMemoryDeliveryRecorder {
    records: Mutex<Vec<NotificationRecord>>,
}

impl InMemoryDeliveryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<NotificationRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn select(&self, keep: impl Fn(&NotificationRecord) -> bool) -> Vec<NotificationRecord> {
        let mut matched: Vec<NotificationRecord> =
            self.lock().iter().filter(|r| keep(r)).cloned().collect();
        sort_records(&mut matched);
        matched
    }
}

#[async_trait]
impl DeliveryRecorder for InMemoryDeliveryRecorder {
    async fn next_attempt_number(
        &self,
        alert_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<i32, NotifierError> {
        let latest = self
            .lock()
            .iter()
            .filter(|r| r.alert_id == alert_id && r.recipient_id == recipient_id)
            .map(|r| r.attempt_number)
            .max()
            .unwrap_or(0);
        Ok(latest + 1)
    }

    async fn write(&self, record: &NotificationRecord) -> Result<(), NotifierError> {
        let mut records = self.lock();

        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            if existing.alert_id != record.alert_id
                || existing.recipient_id != record.recipient_id
                || existing.attempt_number != record.attempt_number
            {
                return Err(NotifierError::Recorder(format!(
                    "record {} cannot change its alert, recipient or attempt number",
                    record.id
                )));
            }
            *existing = record.clone();
            return Ok(());
        }

        let duplicate = records.iter().any(|r| {
            r.alert_id == record.alert_id
                && r.recipient_id == record.recipient_id
                && r.attempt_number == record.attempt_number
        });
        if duplicate {
            return Err(NotifierError::Recorder(format!(
                "attempt {} already recorded for alert {} / recipient {}",
                record.attempt_number, record.alert_id, record.recipient_id
            )));
        }

        records.push(record.clone());
        Ok(())
    }

    async fn query_by_alert(
        &self,
        alert_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, NotifierError> {
        Ok(self.select(|r| r.alert_id == alert_id))
    }

    async fn query_by_recipient(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, NotifierError> {
        Ok(self.select(|r| r.recipient_id == recipient_id))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    alert_id: Uuid,
    recipient_id: Uuid,
    attempt_number: i32,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    record_id: Uuid,
    channel: Channel,
    status: DeliveryStatus,
    error_detail: Option<String>,
    sent_at: Option<DateTime<Utc>>,
}

/// Postgres-backed recorder over `notification_records` + `delivery_attempts`.
#[derive(Clone)]
pub struct PgDeliveryRecorder {
    pool: PgPool,
}

impl PgDeliveryRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn storage_error(err: sqlx::Error) -> NotifierError {
        NotifierError::Recorder(err.to_string())
    }

    /// Attach attempt rows to their records.
    async fn hydrate(
        &self,
        rows: Vec<RecordRow>,
    ) -> Result<Vec<NotificationRecord>, NotifierError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let attempts: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT record_id, channel, status, error_detail, sent_at
            FROM delivery_attempts
            WHERE record_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        let mut by_record: HashMap<Uuid, Vec<AttemptRow>> = HashMap::new();
        for attempt in attempts {
            by_record.entry(attempt.record_id).or_default().push(attempt);
        }

        let mut records: Vec<NotificationRecord> = rows
            .into_iter()
            .map(|row| {
                let attempts = by_record
                    .remove(&row.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| {
                        (
                            a.channel,
                            DeliveryAttempt {
                                alert_id: row.alert_id,
                                recipient_id: row.recipient_id,
                                channel: a.channel,
                                status: a.status,
                                error_detail: a.error_detail,
                                sent_at: a.sent_at,
                            },
                        )
                    })
                    .collect();

                NotificationRecord {
                    id: row.id,
                    alert_id: row.alert_id,
                    recipient_id: row.recipient_id,
                    attempt_number: row.attempt_number,
                    attempts,
                    created_at: row.created_at,
                    completed_at: row.completed_at,
                }
            })
            .collect();

        sort_records(&mut records);
        Ok(records)
    }
}

#[async_trait]
impl DeliveryRecorder for PgDeliveryRecorder {
    async fn next_attempt_number(
        &self,
        alert_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<i32, NotifierError> {
        let (next,): (i32,) = sqlx::query_as(
            r#"
            SELECT COALESCE(MAX(attempt_number), 0) + 1
            FROM notification_records
            WHERE alert_id = $1 AND recipient_id = $2
            "#,
        )
        .bind(alert_id)
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        Ok(next)
    }

    async fn write(&self, record: &NotificationRecord) -> Result<(), NotifierError> {
        let mut tx = self.pool.begin().await.map_err(Self::storage_error)?;

        // The unique (alert_id, recipient_id, attempt_number) constraint rejects
        // a second record claiming an existing attempt.
        sqlx::query(
            r#"
            INSERT INTO notification_records (id, alert_id, recipient_id, attempt_number, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(record.id)
        .bind(record.alert_id)
        .bind(record.recipient_id)
        .bind(record.attempt_number)
        .bind(record.created_at)
        .bind(record.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(Self::storage_error)?;

        for attempt in record.attempts.values() {
            sqlx::query(
                r#"
                INSERT INTO delivery_attempts (record_id, channel, status, error_detail, sent_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (record_id, channel) DO UPDATE
                SET status = EXCLUDED.status,
                    error_detail = EXCLUDED.error_detail,
                    sent_at = EXCLUDED.sent_at
                "#,
            )
            .bind(record.id)
            .bind(attempt.channel.to_string())
            .bind(attempt.status.to_string())
            .bind(&attempt.error_detail)
            .bind(attempt.sent_at)
            .execute(&mut *tx)
            .await
            .map_err(Self::storage_error)?;
        }

        tx.commit().await.map_err(Self::storage_error)?;
        Ok(())
    }

    async fn query_by_alert(
        &self,
        alert_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, NotifierError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT * FROM notification_records WHERE alert_id = $1 ORDER BY created_at, attempt_number",
        )
        .bind(alert_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        self.hydrate(rows).await
    }

    async fn query_by_recipient(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, NotifierError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT * FROM notification_records WHERE recipient_id = $1 ORDER BY created_at, attempt_number",
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::storage_error)?;

        self.hydrate(rows).await
    }
}
