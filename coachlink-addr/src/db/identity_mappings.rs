//! Identity mapping persistence
//!
//! One row per identity, terminal once written. Inserts are
//! insert-if-absent on the `identity` primary key.

use chrono::Utc;
use coachlink_common::{Error, Result};
use sqlx::SqlitePool;

use crate::models::IdentityMapping;
use crate::utils::retry_on_lock;

/// Whether a mapping already exists for `identity`
pub async fn exists(pool: &SqlitePool, identity: &str) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM identity_mappings WHERE identity = ? LIMIT 1")
            .bind(identity)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Customer id mapped to `identity`, if any
pub async fn customer_for(pool: &SqlitePool, identity: &str) -> Result<Option<String>> {
    let customer_id: Option<String> =
        sqlx::query_scalar("SELECT customer_id FROM identity_mappings WHERE identity = ?")
            .bind(identity)
            .fetch_optional(pool)
            .await?;
    Ok(customer_id)
}

/// Insert mappings whose identity is not mapped yet, in one transaction
///
/// Returns the number of mappings created.
pub async fn insert_if_absent(
    pool: &SqlitePool,
    mappings: &[IdentityMapping],
    max_lock_wait_ms: u64,
) -> Result<usize> {
    if mappings.is_empty() {
        return Ok(0);
    }

    let created_at = Utc::now().to_rfc3339();

    retry_on_lock("insert identity mappings", max_lock_wait_ms, || async {
        let mut tx = pool.begin().await?;
        let mut inserted = 0u64;

        for mapping in mappings {
            let result = sqlx::query(
                r#"
                INSERT INTO identity_mappings (identity, customer_id, created_at)
                VALUES (?, ?, ?)
                ON CONFLICT(identity) DO NOTHING
                "#,
            )
            .bind(&mapping.identity)
            .bind(&mapping.customer_id)
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

/// Count all identity mappings
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identity_mappings")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn mapping(identity: &str, customer_id: &str) -> IdentityMapping {
        IdentityMapping {
            identity: identity.to_string(),
            customer_id: customer_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_mapping_is_terminal() {
        let pool = test_pool().await;

        assert_eq!(
            insert_if_absent(&pool, &[mapping("wx_1", "C100")], 1000).await.unwrap(),
            1
        );
        assert_eq!(
            insert_if_absent(&pool, &[mapping("wx_1", "C200"), mapping("wx_2", "C300")], 1000)
                .await
                .unwrap(),
            1
        );

        assert_eq!(customer_for(&pool, "wx_1").await.unwrap(), Some("C100".to_string()));
        assert!(exists(&pool, "wx_2").await.unwrap());
        assert!(!exists(&pool, "wx_3").await.unwrap());
        assert_eq!(count(&pool).await.unwrap(), 2);
    }
}
