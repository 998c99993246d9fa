//! Address record persistence
//!
//! Write-once rows, unique per (identity, msg_timestamp). Inserts use
//! `ON CONFLICT DO NOTHING` and report how many rows were actually new, so
//! re-processing an overlapping window never duplicates a record.

use chrono::Utc;
use coachlink_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::models::{AddressRecord, MessageKind};
use crate::utils::retry_on_lock;

/// Insert records that are not yet present, in one transaction
///
/// Returns the number of rows inserted; the rest already existed.
pub async fn insert_if_absent(
    pool: &SqlitePool,
    records: &[AddressRecord],
    max_lock_wait_ms: u64,
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let created_at = Utc::now().to_rfc3339();

    retry_on_lock("insert address records", max_lock_wait_ms, || async {
        let mut tx = pool.begin().await?;
        let mut inserted = 0u64;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO address_records (identity, msg_type, msg_timestamp, content, address, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(identity, msg_timestamp) DO NOTHING
                "#,
            )
            .bind(&record.identity)
            .bind(record.kind.code())
            .bind(record.timestamp)
            .bind(&record.source_body)
            .bind(&record.raw_address)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok::<usize, Error>(inserted as usize)
    })
    .await
}

/// Records whose originating message is at or after `since_ms`, oldest first
pub async fn load_since(pool: &SqlitePool, since_ms: i64) -> Result<Vec<AddressRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT identity, msg_type, msg_timestamp, content, address
        FROM address_records
        WHERE msg_timestamp >= ?
        ORDER BY msg_timestamp, id
        "#,
    )
    .bind(since_ms)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let code: i64 = row.get("msg_type");
            let kind = MessageKind::from_code(code)
                .ok_or_else(|| Error::Internal(format!("Unknown msg_type {}", code)))?;
            Ok(AddressRecord {
                identity: row.get("identity"),
                timestamp: row.get("msg_timestamp"),
                raw_address: row.get("address"),
                source_body: row.get("content"),
                kind,
            })
        })
        .collect()
}

/// Count all address records
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM address_records")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
