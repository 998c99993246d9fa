//! Database Test Utilities
//!
//! Temporary databases seeded with chat messages and ledger rows

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use coachlink_addr::db;
use coachlink_addr::models::{ChatMessage, SenderRole};
use coachlink_addr::services::{ExtractionOracle, PipelineOrchestrator};
use coachlink_common::config::TomlConfig;
use coachlink_common::time;

/// Watermark date used by the pipeline tests
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

/// Create temporary test database with pipeline tables
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_coachlink.db");
    let pool = db::init_database_pool(&db_path).await?;
    Ok((temp_dir, pool))
}

/// Default configuration with test-speed delays
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.pipeline.backoff_step_ms = 5;
    config.pipeline.pacing_ms = 0;
    config
}

/// Orchestrator over `pool` with the order ledger in the same database
pub fn test_orchestrator(
    pool: &SqlitePool,
    oracle: Arc<dyn ExtractionOracle>,
    cancel_token: CancellationToken,
) -> PipelineOrchestrator {
    coachlink_addr::build_orchestrator(pool.clone(), pool.clone(), oracle, &test_config(), cancel_token)
}

/// Watermark of `date` at the default business-day offset
pub fn watermark_ms(date: NaiveDate) -> i64 {
    time::start_of_day_ms(date, test_config().pipeline.utc_offset_minutes).unwrap()
}

/// Insert one address-bearing customer message per identity, one second
/// apart, starting at the [`test_date`] watermark
pub async fn seed_customer_messages(pool: &SqlitePool, identities: &[String]) -> Result<()> {
    let start = watermark_ms(test_date());
    for (i, identity) in identities.iter().enumerate() {
        db::messages::insert_message(
            pool,
            &ChatMessage {
                identity: identity.clone(),
                timestamp: start + (i as i64) * 1000,
                body: format!("老师好，快递寄到江苏省无锡市江阴市顾山镇锡张路{}号", 400 + i),
                sender_role: SenderRole::Customer,
            },
        )
        .await?;
    }
    Ok(())
}
