//! Fraud audit persistence on the append-only `fraud_records` table.

use packs_rules::FraudDetectionRecord;
use sqlx::{PgExecutor, PgPool};

use super::{from_json, to_json};

/// Append a fraud record.
pub async fn insert<'e>(
    executor: impl PgExecutor<'e>,
    record: &FraudDetectionRecord,
) -> Result<(), sqlx::Error> {
    let json = to_json("fraud record", record)?;

    sqlx::query(
        "INSERT INTO fraud_records (id, user_id, pattern, severity, refund_request_id, record, detected_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(record.id)
    .bind(*record.user.as_uuid())
    .bind(record.pattern.as_str())
    .bind(record.severity.as_str())
    .bind(record.refund_request_id)
    .bind(&json)
    .bind(record.detected_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load the fraud log on startup, oldest first.
pub async fn load_all(pool: &PgPool) -> Result<Vec<FraudDetectionRecord>, sqlx::Error> {
    let rows: Vec<(serde_json::Value,)> =
        sqlx::query_as("SELECT record FROM fraud_records ORDER BY detected_at")
            .fetch_all(pool)
            .await?;
    rows.into_iter()
        .map(|(record,)| from_json("fraud record", record))
        .collect()
}
