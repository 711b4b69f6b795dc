//! Refund request persistence on the `refund_requests` table.

use packs_refund::RefundRequest;
use sqlx::{PgExecutor, PgPool};

use super::{from_json, to_json};

/// Insert or replace a refund request.
pub async fn upsert<'e>(executor: impl PgExecutor<'e>, request: &RefundRequest) -> Result<(), sqlx::Error> {
    let json = to_json("refund request", request)?;

    sqlx::query(
        "INSERT INTO refund_requests (id, escrow_id, requester, tier, status, request, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (id) DO UPDATE SET tier = EXCLUDED.tier, status = EXCLUDED.status,
             request = EXCLUDED.request, updated_at = EXCLUDED.updated_at",
    )
    .bind(*request.id.as_uuid())
    .bind(*request.escrow_id.as_uuid())
    .bind(*request.requester.as_uuid())
    .bind(i16::from(request.tier.number()))
    .bind(request.status.as_str())
    .bind(&json)
    .bind(request.created_at)
    .bind(request.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load every refund request on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<RefundRequest>, sqlx::Error> {
    let rows: Vec<(serde_json::Value,)> =
        sqlx::query_as("SELECT request FROM refund_requests ORDER BY created_at")
            .fetch_all(pool)
            .await?;
    rows.into_iter()
        .map(|(request,)| from_json("refund request", request))
        .collect()
}
