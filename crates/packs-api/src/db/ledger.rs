//! Journal persistence on the append-only `ledger_entries` table.

use packs_ledger::LedgerEntry;
use sqlx::{PgExecutor, PgPool};

use super::{from_json, to_json};

/// Append one journal entry. Entries are never updated.
pub async fn append<'e>(executor: impl PgExecutor<'e>, entry: &LedgerEntry) -> Result<(), sqlx::Error> {
    let json = to_json("ledger entry", entry)?;
    let sequence = i64::try_from(entry.sequence)
        .map_err(|_| sqlx::Error::Protocol(format!("sequence {} out of range", entry.sequence)))?;

    sqlx::query(
        "INSERT INTO ledger_entries (sequence, kind, escrow_id, prev_hash, hash, entry, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(sequence)
    .bind(entry.kind.as_str())
    .bind(entry.escrow_id)
    .bind(entry.prev_hash.as_str())
    .bind(entry.hash.as_str())
    .bind(&json)
    .bind(entry.recorded_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load the whole journal in sequence order for replay.
pub async fn load_all(pool: &PgPool) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let rows: Vec<(serde_json::Value,)> =
        sqlx::query_as("SELECT entry FROM ledger_entries ORDER BY sequence")
            .fetch_all(pool)
            .await?;
    rows.into_iter()
        .map(|(entry,)| from_json("ledger entry", entry))
        .collect()
}
