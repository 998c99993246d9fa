//! coachlink-addr library interface
//!
//! Exposes the pipeline components, persistence and HTTP router for the
//! binary and for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use coachlink_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::services::{
    AddressCanonicalizer, AddressClassifier, ExtractionBatchRunner, ExtractionOracle,
    IdentityResolver, PipelineOrchestrator, RunnerConfig, SensitiveTermFilter,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Service database connection pool
    pub db: SqlitePool,
    /// Pipeline shared by HTTP trigger and scheduler
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self {
            db,
            orchestrator,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Assemble the pipeline from configuration
///
/// `ledger_db` may be the service pool itself when the order ledger lives in
/// the service database.
pub fn build_orchestrator(
    db: SqlitePool,
    ledger_db: SqlitePool,
    oracle: Arc<dyn ExtractionOracle>,
    config: &TomlConfig,
    cancel_token: CancellationToken,
) -> PipelineOrchestrator {
    let classifier = AddressClassifier::default();
    let runner = ExtractionBatchRunner::new(db.clone(), oracle, RunnerConfig::from(&config.pipeline));
    let resolver = IdentityResolver::new(
        db.clone(),
        ledger_db,
        classifier.clone(),
        AddressCanonicalizer::default(),
        SensitiveTermFilter::from_config(&config.address),
    );

    PipelineOrchestrator::new(
        db,
        classifier,
        runner,
        resolver,
        config.pipeline.utc_offset_minutes,
        cancel_token,
    )
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::pipeline_routes())
        .merge(api::health_routes())
        .with_state(state)
}
