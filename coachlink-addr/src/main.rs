//! coachlink-addr - Address resolution & identity-linking service
//!
//! **Module Identity:**
//! - Name: coachlink-addr
//! - Port: 5731 (configurable)
//!
//! Extracts postal addresses from customer chat messages, stores them as
//! address records and links messaging identities to commerce customers
//! through the order ledger. Runs daily on a schedule, on demand over HTTP,
//! or once from the command line.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use coachlink_addr::models::RunTrigger;
use coachlink_addr::scheduler::DailyScheduler;
use coachlink_addr::services::ChatCompletionOracle;
use coachlink_addr::AppState;
use coachlink_common::config::{self, TomlConfig, ROOT_FOLDER_ENV};
use coachlink_common::time;

const MODULE_NAME: &str = "coachlink-addr";

#[derive(Debug, Parser)]
#[command(name = "coachlink-addr", version, about = "Address resolution & identity-linking service")]
struct Args {
    /// TOML configuration file (default: ~/.config/coachlink/coachlink-addr.toml)
    #[arg(long, env = "COACHLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the service database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// HTTP bind address, overrides [server] bind_address
    #[arg(long)]
    bind: Option<String>,

    /// Run the pipeline once for DATE (YYYY-MM-DD, default previous day) and exit
    #[arg(long, value_name = "DATE", num_args = 0..=1, default_missing_value = "")]
    run_once: Option<String>,
}

fn load_config(args: &Args) -> Result<TomlConfig> {
    match args
        .config
        .clone()
        .or_else(|| config::default_config_path(MODULE_NAME))
    {
        Some(path) => config::load_toml_config(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(TomlConfig::default()),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid logging level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        token.cancelled().await;
        return;
    }
    info!("Shutdown requested");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_config(&args)?;
    init_tracing(&toml_config.logging.level)?;

    info!("Starting {} (Address Resolution) service", MODULE_NAME);
    info!(
        "Version: {} ({} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    // Step 1: Resolve root folder (CLI → ENV → TOML → default)
    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    let db_path = config::ensure_root_folder(&root_folder)
        .with_context(|| format!("Failed to initialize root folder {}", root_folder.display()))?;
    info!("Database: {}", db_path.display());

    // Step 2: Open service database and order ledger
    let db_pool = coachlink_addr::db::init_database_pool(&db_path).await?;
    let ledger_pool = match &toml_config.ledger_database {
        Some(path) => {
            info!("Order ledger: {}", path.display());
            coachlink_addr::db::open_ledger_pool(path).await?
        }
        None => db_pool.clone(),
    };
    info!("Database connection established");

    // Step 3: Extraction oracle
    let api_key = coachlink_addr::config::resolve_oracle_api_key(&db_pool, &toml_config).await?;
    let oracle = ChatCompletionOracle::new(&toml_config.oracle, api_key)
        .context("Failed to create extraction oracle client")?;
    info!(
        "Extraction oracle: {} (model {})",
        oracle.url(),
        toml_config.oracle.model
    );

    // Step 4: Pipeline
    let shutdown = CancellationToken::new();
    let orchestrator = Arc::new(coachlink_addr::build_orchestrator(
        db_pool.clone(),
        ledger_pool,
        Arc::new(oracle),
        &toml_config,
        shutdown.clone(),
    ));

    if let Some(date) = args.run_once.as_deref() {
        return run_once(&orchestrator, date, &toml_config, shutdown).await;
    }

    // Step 5: Daily scheduler
    let scheduler_handle = if toml_config.pipeline.cron_enabled {
        let run_at = time::parse_time_of_day(&toml_config.pipeline.daily_run_at)?;
        let scheduler = DailyScheduler::new(
            Arc::clone(&orchestrator),
            run_at,
            toml_config.pipeline.utc_offset_minutes,
        );
        Some(tokio::spawn(scheduler.run(shutdown.clone())))
    } else {
        warn!("Daily pipeline schedule disabled");
        None
    };

    // Step 6: HTTP server
    let state = AppState::new(db_pool, orchestrator);
    let app = coachlink_addr::build_router(state);

    let bind = args
        .bind
        .unwrap_or_else(|| toml_config.server.bind_address.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    info!("{} stopped", MODULE_NAME);
    Ok(())
}

async fn run_once(
    orchestrator: &coachlink_addr::services::PipelineOrchestrator,
    date: &str,
    toml_config: &TomlConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let watermark_date = if date.trim().is_empty() {
        time::previous_day(time::now(), toml_config.pipeline.utc_offset_minutes)?
    } else {
        NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid --run-once date '{}' (expected YYYY-MM-DD)", date))?
    };

    tokio::spawn(shutdown_signal(shutdown));

    let summary = orchestrator.run(watermark_date, RunTrigger::Cli).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.success {
        anyhow::bail!("Pipeline run for {} did not succeed", watermark_date);
    }
    Ok(())
}
