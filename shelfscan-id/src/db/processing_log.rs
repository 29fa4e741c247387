//! Processing log: one row per identify request.

use crate::types::ProcessingOutcome;
use chrono::Utc;
use shelfscan_common::Result;
use sqlx::SqlitePool;

pub async fn insert_entry(pool: &SqlitePool, outcome: &ProcessingOutcome) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO processing_log (image_hash, elapsed_seconds, success, confidence, error, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&outcome.image_hash)
    .bind(outcome.elapsed_seconds)
    .bind(outcome.success)
    .bind(outcome.confidence)
    .bind(&outcome.error)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of log rows for an image hash
pub async fn count_for_hash(pool: &SqlitePool, image_hash: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processing_log WHERE image_hash = ?")
        .bind(image_hash)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
