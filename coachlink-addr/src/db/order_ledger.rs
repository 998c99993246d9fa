//! Order address ledger (read-only)
//!
//! Historical order addresses keyed by commerce customer id. The pipeline
//! only performs first-match substring lookups against it.

use coachlink_common::Result;
use sqlx::SqlitePool;

/// First customer id whose order address contains `key`
///
/// The key is embedded as `%key%` in a `LIKE` pattern; `%` characters inside
/// a canonical key act as wildcards between its parts. When several rows
/// match, the first row in query order wins.
pub async fn lookup_customer_id_by_address_substring(
    pool: &SqlitePool,
    key: &str,
) -> Result<Option<String>> {
    let pattern = format!("%{}%", key);
    let customer_id: Option<String> = sqlx::query_scalar(
        "SELECT customer_id FROM order_addresses WHERE address_text LIKE ? LIMIT 1",
    )
    .bind(pattern)
    .fetch_optional(pool)
    .await?;

    Ok(customer_id)
}

/// Add an order address (ledger imports and test fixtures)
pub async fn insert_order_address(
    pool: &SqlitePool,
    customer_id: &str,
    address_text: &str,
) -> Result<()> {
    sqlx::query("INSERT INTO order_addresses (customer_id, address_text) VALUES (?, ?)")
        .bind(customer_id)
        .bind(address_text)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_canonical_key_matches_full_address() {
        let pool = test_pool().await;
        insert_order_address(&pool, "C100", "江苏省无锡市江阴市顾山镇锡张路422号")
            .await
            .unwrap();

        let found = lookup_customer_id_by_address_substring(&pool, "江苏%无锡%江阴%顾山%2号")
            .await
            .unwrap();
        assert_eq!(found, Some("C100".to_string()));
    }

    #[tokio::test]
    async fn test_lookup_miss_returns_none() {
        let pool = test_pool().await;
        insert_order_address(&pool, "C100", "浙江省杭州市西湖区文三路478号")
            .await
            .unwrap();

        let found = lookup_customer_id_by_address_substring(&pool, "江苏%无锡%江阴%顾山%2号")
            .await
            .unwrap();
        assert_eq!(found, None);
    }
}
