//! Database access for coachlink-addr
//!
//! SQLite holds the chat messages, extracted address records, identity
//! mappings and run history. The order ledger is read from the same
//! database unless a separate ledger file is configured.

pub mod address_records;
pub mod identity_mappings;
pub mod messages;
pub mod order_ledger;
pub mod pipeline_runs;
pub mod settings;

use coachlink_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the database file and pipeline tables if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Open an external order ledger database read-only
pub async fn open_ledger_pool(ledger_path: &Path) -> Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=ro", ledger_path.display());
    tracing::debug!("Connecting to order ledger: {}", db_url);

    Ok(SqlitePool::connect(&db_url).await?)
}

/// Create pipeline tables if they don't exist
///
/// The UNIQUE constraints on `address_records` and `identity_mappings` back
/// the insert-if-absent writes that keep both tables duplicate-free across
/// overlapping runs.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity TEXT NOT NULL,
            msg_timestamp INTEGER NOT NULL,
            body TEXT NOT NULL,
            sender_role TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_timestamp ON chat_messages (msg_timestamp)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS address_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity TEXT NOT NULL,
            msg_type INTEGER NOT NULL,
            msg_timestamp INTEGER NOT NULL,
            content TEXT NOT NULL,
            address TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (identity, msg_timestamp)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identity_mappings (
            identity TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS order_addresses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id TEXT NOT NULL,
            address_text TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id TEXT PRIMARY KEY,
            trigger TEXT NOT NULL,
            watermark_date TEXT NOT NULL,
            watermark_ms INTEGER NOT NULL,
            summary TEXT NOT NULL,
            success INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (settings, chat_messages, address_records, identity_mappings, order_addresses, pipeline_runs)"
    );

    Ok(())
}

/// Single-connection in-memory database with all tables, for unit tests
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_tables(&pool).await.unwrap();
    pool
}
