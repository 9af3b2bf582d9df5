//! Recipient directory — read-only lookup of recipients and their channel preferences.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use sentinel_common::types::{ChannelPreference, Recipient};

use crate::error::NotifierError;

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// `Ok(None)` when no recipient has this id.
    async fn find(&self, recipient_id: Uuid) -> Result<Option<Recipient>, NotifierError>;
}

/// Fixed set of recipients held in memory.
#[derive(Default)]
pub struct InMemoryRecipientDirectory {
    recipients: HashMap<Uuid, Recipient>,
}

impl InMemoryRecipientDirectory {
    pub fn new(recipients: impl IntoIterator<Item = Recipient>) -> Self {
        Self {
            recipients: recipients.into_iter().map(|r| (r.id, r)).collect(),
        }
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryRecipientDirectory {
    async fn find(&self, recipient_id: Uuid) -> Result<Option<Recipient>, NotifierError> {
        Ok(self.recipients.get(&recipient_id).cloned())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecipientRow {
    id: Uuid,
    push_enabled: bool,
    push_token: Option<String>,
    sms_enabled: bool,
    phone: Option<String>,
    email_enabled: bool,
    email: Option<String>,
}

impl From<RecipientRow> for Recipient {
    fn from(row: RecipientRow) -> Self {
        Recipient::new(
            row.id,
            ChannelPreference::new(row.push_enabled, row.push_token),
            ChannelPreference::new(row.sms_enabled, row.phone),
            ChannelPreference::new(row.email_enabled, row.email),
        )
    }
}

#[derive(Clone)]
pub struct PgRecipientDirectory {
    pool: PgPool,
}

impl PgRecipientDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientDirectory for PgRecipientDirectory {
    async fn find(&self, recipient_id: Uuid) -> Result<Option<Recipient>, NotifierError> {
        let row: Option<RecipientRow> = sqlx::query_as(
            r#"
            SELECT id, push_enabled, push_token, sms_enabled, phone, email_enabled, email
            FROM recipients
            WHERE id = $1
            "#,
        )
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| NotifierError::Directory(e.to_string()))?;

        Ok(row.map(Recipient::from))
    }
}
