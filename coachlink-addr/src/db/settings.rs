//! Settings database operations
//!
//! Key/value accessors over the `settings` table.

use coachlink_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Setting key holding the extraction oracle API key
pub const ORACLE_API_KEY: &str = "oracle_api_key";

/// Setting key bounding write retries on a locked database
pub const MAX_LOCK_WAIT_MS: &str = "db_max_lock_wait_ms";

const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Get oracle API key from database
///
/// **Returns:** Some(key) if exists, None if not set
pub async fn get_oracle_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, ORACLE_API_KEY).await
}

/// Set oracle API key in database
pub async fn set_oracle_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, ORACLE_API_KEY, key).await
}

/// Maximum time write operations keep retrying on "database is locked"
///
/// **Default:** 5000 ms
pub async fn get_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, MAX_LOCK_WAIT_MS)
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS))
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
