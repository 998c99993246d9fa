//! Configuration resolution for coachlink-addr
//!
//! Oracle API key resolution with Database → ENV → TOML priority.

use coachlink_common::config::TomlConfig;
use coachlink_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Environment variable carrying the oracle API key
pub const ORACLE_API_KEY_ENV: &str = "COACHLINK_ORACLE_API_KEY";

/// Resolve the extraction oracle API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_oracle_api_key(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<String> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = crate::db::settings::get_oracle_api_key(db).await?;
    if let Some(key) = &db_key {
        if is_valid_key(key) {
            sources.push("database");
        }
    }

    // Tier 2: Environment variable
    let env_key = std::env::var(ORACLE_API_KEY_ENV).ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    // Tier 3: TOML config
    let toml_key = toml_config.oracle.api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    if sources.len() > 1 {
        warn!(
            "Oracle API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("Oracle API key loaded from database");
            return Ok(key);
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("Oracle API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("Oracle API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    Err(Error::Config(format!(
        "Oracle API key not configured. Please configure using one of:\n\
         1. Database: settings key \"{}\"\n\
         2. Environment: {}=your-key-here\n\
         3. TOML config: ~/.config/coachlink/coachlink-addr.toml ([oracle] api_key = \"your-key\")",
        crate::db::settings::ORACLE_API_KEY,
        ORACLE_API_KEY_ENV
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use serial_test::serial;

    fn toml_with_key(key: Option<&str>) -> TomlConfig {
        let mut config = TomlConfig::default();
        config.oracle.api_key = key.map(str::to_string);
        config
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("sk-123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[tokio::test]
    #[serial]
    async fn test_database_key_wins() {
        let pool = test_pool().await;
        crate::db::settings::set_oracle_api_key(&pool, "db-key".to_string())
            .await
            .unwrap();
        std::env::set_var(ORACLE_API_KEY_ENV, "env-key");

        let key = resolve_oracle_api_key(&pool, &toml_with_key(Some("toml-key")))
            .await
            .unwrap();

        std::env::remove_var(ORACLE_API_KEY_ENV);
        assert_eq!(key, "db-key");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_key_before_toml() {
        let pool = test_pool().await;
        std::env::set_var(ORACLE_API_KEY_ENV, "env-key");

        let key = resolve_oracle_api_key(&pool, &toml_with_key(Some("toml-key")))
            .await
            .unwrap();

        std::env::remove_var(ORACLE_API_KEY_ENV);
        assert_eq!(key, "env-key");
    }

    #[tokio::test]
    #[serial]
    async fn test_toml_key_and_missing_key() {
        let pool = test_pool().await;
        std::env::remove_var(ORACLE_API_KEY_ENV);

        let key = resolve_oracle_api_key(&pool, &toml_with_key(Some("toml-key")))
            .await
            .unwrap();
        assert_eq!(key, "toml-key");

        let missing = resolve_oracle_api_key(&pool, &toml_with_key(Some("  "))).await;
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
