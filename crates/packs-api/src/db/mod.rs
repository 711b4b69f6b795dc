//! # Database Persistence Layer
//!
//! Optional Postgres persistence via SQLx. When `DATABASE_URL` is set, every
//! in-memory mutation of escrows, journal entries, refund requests and fraud
//! records is written through in one transaction, and the stores are
//! hydrated on startup. When absent, the API runs in-memory only.
//!
//! Records are stored whole as JSONB next to a few indexed columns; the
//! domain crates remain the source of truth for their invariants.

pub mod escrows;
pub mod fraud;
pub mod ledger;
pub mod refunds;

use packs_ledger::{EscrowRecord, LedgerEntry};
use packs_refund::RefundRequest;
use packs_rules::FraudDetectionRecord;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only. State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Records changed by one operation.
#[derive(Debug, Default)]
pub struct WriteSet {
    /// Escrows to upsert.
    pub escrows: Vec<EscrowRecord>,
    /// Journal entries to append, in sequence order.
    pub entries: Vec<LedgerEntry>,
    /// Refund requests to upsert.
    pub refunds: Vec<RefundRequest>,
    /// Fraud records to append.
    pub fraud: Vec<FraudDetectionRecord>,
}

impl WriteSet {
    /// Whether there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.escrows.is_empty()
            && self.entries.is_empty()
            && self.refunds.is_empty()
            && self.fraud.is_empty()
    }
}

/// Write a [`WriteSet`] in one transaction.
pub async fn write(pool: &PgPool, set: &WriteSet) -> Result<(), sqlx::Error> {
    if set.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for entry in &set.entries {
        ledger::append(&mut *tx, entry).await?;
    }
    for escrow in &set.escrows {
        escrows::upsert(&mut *tx, escrow).await?;
    }
    for request in &set.refunds {
        refunds::upsert(&mut *tx, request).await?;
    }
    for record in &set.fraud {
        fraud::insert(&mut *tx, record).await?;
    }
    tx.commit().await
}

pub(crate) fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize {what}: {e}")))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    what: &str,
    value: serde_json::Value,
) -> Result<T, sqlx::Error> {
    serde_json::from_value(value)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to deserialize {what}: {e}")))
}
