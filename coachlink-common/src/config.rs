//! Configuration loading and root folder resolution
//!
//! Missing or partial TOML files never stop a service from starting: absent
//! sections fall back to compiled defaults and a warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "COACHLINK_ROOT";

/// Database file created inside the root folder
pub const DATABASE_FILE_NAME: &str = "coachlink.db";

/// Complete TOML configuration for a coachlink service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the service database
    pub root_folder: Option<PathBuf>,
    /// Separate order ledger database (defaults to the service database)
    pub ledger_database: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub oracle: OracleConfig,
    pub pipeline: PipelineConfig,
    pub address: AddressConfig,
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive ("info", "coachlink_addr=debug", ...)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// HTTP server section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5731".to_string(),
        }
    }
}

/// Extraction oracle section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Per-call timeout; the run as a whole has none
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 60,
            requests_per_minute: 30,
        }
    }
}

/// Pipeline batching, retry and scheduling section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub max_attempts: u32,
    /// Backoff before attempt `n + 1` is `n * backoff_step_ms`
    pub backoff_step_ms: u64,
    /// Pause between successful batches
    pub pacing_ms: u64,
    /// Offset of the business day from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Local time ("HH:MM") of the daily run
    pub daily_run_at: String,
    pub cron_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_attempts: 3,
            backoff_step_ms: 2000,
            pacing_ms: 1000,
            utc_offset_minutes: 8 * 60,
            daily_run_at: "02:00".to_string(),
            cron_enabled: true,
        }
    }
}

/// Address handling section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    /// Terms masked out of an address before it is canonicalized
    pub sensitive_terms: Vec<String>,
    pub sensitive_replacement: String,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            sensitive_terms: ["收货人", "收件人", "联系电话", "手机号", "电话", "手机"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sensitive_replacement: String::new(),
        }
    }
}

/// Default configuration file path for a module
/// (`~/.config/coachlink/<module>.toml` on Linux)
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("coachlink").join(format!("{}.toml", module_name)))
}

/// Load TOML configuration
///
/// A missing file yields defaults with a warning; a file that exists but
/// cannot be read or parsed is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("coachlink"))
        .unwrap_or_else(|| PathBuf::from("./coachlink_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn ensure_root_folder(root_folder: &Path) -> Result<PathBuf> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(root_folder.join(DATABASE_FILE_NAME))
}
