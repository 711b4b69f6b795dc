//! Escrow persistence operations on the `escrows` table.

use packs_ledger::EscrowRecord;
use sqlx::{PgExecutor, PgPool};

use super::{from_json, to_json};

/// Insert or replace an escrow record.
pub async fn upsert<'e>(executor: impl PgExecutor<'e>, record: &EscrowRecord) -> Result<(), sqlx::Error> {
    let json = to_json("escrow record", record)?;
    let total = i64::try_from(record.total.value())
        .map_err(|_| sqlx::Error::Protocol(format!("escrow {} total out of range", record.id)))?;
    let updated_at = record
        .transitions
        .last()
        .map_or(record.created_at, |t| t.at);

    sqlx::query(
        "INSERT INTO escrows (id, payer, recipient, status, total, auto_release_at, record, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, record = EXCLUDED.record, updated_at = EXCLUDED.updated_at",
    )
    .bind(*record.id.as_uuid())
    .bind(*record.payer.as_uuid())
    .bind(*record.recipient.as_uuid())
    .bind(record.status.as_str())
    .bind(total)
    .bind(record.auto_release_at)
    .bind(&json)
    .bind(record.created_at)
    .bind(updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load every escrow on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<EscrowRecord>, sqlx::Error> {
    let rows: Vec<(serde_json::Value,)> =
        sqlx::query_as("SELECT record FROM escrows ORDER BY created_at")
            .fetch_all(pool)
            .await?;
    rows.into_iter()
        .map(|(record,)| from_json("escrow record", record))
        .collect()
}
