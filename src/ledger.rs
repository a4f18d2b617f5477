//! Server-side record of currently-valid refresh tokens.
//!
//! Cryptographic validity alone never makes a refresh token live: a token is
//! accepted only while its record exists here. Rotation and sign-out remove
//! records through `remove`, an atomic conditional delete that reports
//! whether a row was actually removed -- under two racing calls with the
//! same token, exactly one caller wins and the other observes a revoked
//! token. Access tokens are never tracked.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::token::{TokenKind, TokenModel};

/// One row per currently-valid refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRecord {
    pub token_id: Uuid,
    pub subject_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl RevocationRecord {
    /// Mirror a freshly-minted refresh token into its ledger row.
    pub fn for_token(token: &TokenModel) -> Self {
        debug_assert_eq!(token.kind, TokenKind::Refresh);
        Self {
            token_id: token.id,
            subject_id: token.subject_id,
            expires_at: token.expires_at,
        }
    }
}

/// Backing-store contract for refresh-token tracking.
///
/// `remove` is the strongest consistency primitive required: a per-token-id
/// atomic conditional delete in a single round-trip. No multi-record
/// transactions are needed. `purge_expired` sweeps records whose expiry
/// passed without an explicit sign-out or rotation; the host schedules it,
/// the core runs no background tasks.
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    async fn insert(&self, record: RevocationRecord) -> Result<(), LedgerError>;

    async fn contains(&self, token_id: Uuid) -> Result<bool, LedgerError>;

    /// Delete-if-present; `true` when this call removed the row.
    async fn remove(&self, token_id: Uuid) -> Result<bool, LedgerError>;

    /// Bulk delete for sign-out-everywhere; returns the number of rows removed.
    async fn remove_all_for_subject(&self, subject_id: Uuid) -> Result<u64, LedgerError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, LedgerError>;
}

/// Postgres-backed ledger.
///
/// Expected schema:
/// ```sql
/// CREATE TABLE refresh_tokens (
///     id         UUID PRIMARY KEY,
///     subject_id UUID NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// CREATE INDEX refresh_tokens_subject_id_idx ON refresh_tokens (subject_id);
/// ```
pub struct PgRevocationLedger {
    pool: PgPool,
}

impl PgRevocationLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationLedger for PgRevocationLedger {
    async fn insert(&self, record: RevocationRecord) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, subject_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(record.token_id)
        .bind(record.subject_id)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn contains(&self, token_id: Uuid) -> Result<bool, LedgerError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE id = $1)",
        )
        .bind(token_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn remove(&self, token_id: Uuid) -> Result<bool, LedgerError> {
        // Single DELETE: the row count is the atomic "was it still live"
        // answer, so two racing callers cannot both win.
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_all_for_subject(&self, subject_id: Uuid) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE subject_id = $1")
            .bind(subject_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            subject_id = %subject_id,
            removed = result.rows_affected(),
            "All refresh tokens removed for subject"
        );
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Mutexed in-process ledger for tests and single-node embedders.
#[derive(Default)]
pub struct InMemoryLedger {
    records: Mutex<HashMap<Uuid, RevocationRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked records for a subject. Not part of the store
    /// contract; exists for assertions and diagnostics.
    pub fn tracked_for_subject(&self, subject_id: Uuid) -> usize {
        self.records
            .lock()
            .map(|records| {
                records
                    .values()
                    .filter(|r| r.subject_id == subject_id)
                    .count()
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl RevocationLedger for InMemoryLedger {
    async fn insert(&self, record: RevocationRecord) -> Result<(), LedgerError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        records.insert(record.token_id, record);
        Ok(())
    }

    async fn contains(&self, token_id: Uuid) -> Result<bool, LedgerError> {
        let records = self.records.lock().map_err(poisoned)?;
        Ok(records.contains_key(&token_id))
    }

    async fn remove(&self, token_id: Uuid) -> Result<bool, LedgerError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        Ok(records.remove(&token_id).is_some())
    }

    async fn remove_all_for_subject(&self, subject_id: Uuid) -> Result<u64, LedgerError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        let before = records.len();
        records.retain(|_, r| r.subject_id != subject_id);
        Ok((before - records.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        let before = records.len();
        records.retain(|_, r| r.expires_at >= now);
        Ok((before - records.len()) as u64)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> LedgerError {
    LedgerError::Unexpected("ledger mutex poisoned".to_string())
}
