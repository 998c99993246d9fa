//! Pipeline orchestrator
//!
//! One run for a watermark date:
//!
//! LOADING → EXTRACTING → RESOLVING → RECORDED
//!
//! - **LOADING**: customer messages at or after the watermark that look like
//!   they carry an address
//! - **EXTRACTING**: [`ExtractionBatchRunner`] over those messages
//! - **RESOLVING**: [`IdentityResolver`] over every address record at or
//!   after the watermark, including records saved by earlier runs
//! - **RECORDED**: the [`PipelineRun`] row is written whatever the outcome
//!
//! Runs are serialized by a run guard. [`PipelineOrchestrator::run`] waits
//! for the guard, [`PipelineOrchestrator::try_run`] gives up immediately when
//! a run is active.

use chrono::NaiveDate;
use coachlink_common::{time, Result};
use sqlx::SqlitePool;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::db;
use crate::models::{PipelineRun, PipelineSummary, RunTrigger};
use crate::services::address_classifier::AddressClassifier;
use crate::services::extraction_runner::ExtractionBatchRunner;
use crate::services::identity_resolver::IdentityResolver;

/// Pipeline orchestrator service
pub struct PipelineOrchestrator {
    db: SqlitePool,
    classifier: AddressClassifier,
    runner: ExtractionBatchRunner,
    resolver: IdentityResolver,
    utc_offset_minutes: i32,
    run_guard: Mutex<()>,
    cancel_token: CancellationToken,
}

impl PipelineOrchestrator {
    /// Create an orchestrator
    ///
    /// `cancel_token` is the service shutdown token; cancelling it stops an
    /// active run at the next batch boundary or delay.
    pub fn new(
        db: SqlitePool,
        classifier: AddressClassifier,
        runner: ExtractionBatchRunner,
        resolver: IdentityResolver,
        utc_offset_minutes: i32,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            db,
            classifier,
            runner,
            resolver,
            utc_offset_minutes,
            run_guard: Mutex::new(()),
            cancel_token,
        }
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.utc_offset_minutes
    }

    /// Whether a run currently holds the run guard
    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }

    /// Run for `watermark_date`, waiting for any active run to finish first
    pub async fn run(&self, watermark_date: NaiveDate, trigger: RunTrigger) -> Result<PipelineSummary> {
        let guard = self.run_guard.lock().await;
        self.run_guarded(guard, watermark_date, trigger).await
    }

    /// Run for `watermark_date` unless a run is already active
    ///
    /// Returns `Ok(None)` when busy.
    pub async fn try_run(
        &self,
        watermark_date: NaiveDate,
        trigger: RunTrigger,
    ) -> Result<Option<PipelineSummary>> {
        let Ok(guard) = self.run_guard.try_lock() else {
            tracing::info!(trigger = trigger.as_str(), "Pipeline run already active, not starting another");
            return Ok(None);
        };
        self.run_guarded(guard, watermark_date, trigger).await.map(Some)
    }

    async fn run_guarded(
        &self,
        _guard: MutexGuard<'_, ()>,
        watermark_date: NaiveDate,
        trigger: RunTrigger,
    ) -> Result<PipelineSummary> {
        let watermark_ms = time::start_of_day_ms(watermark_date, self.utc_offset_minutes)?;
        let mut run = PipelineRun::start(trigger, watermark_date, watermark_ms);

        tracing::info!(
            run_id = %run.run_id,
            trigger = trigger.as_str(),
            watermark_date = %watermark_date,
            watermark_ms,
            "Pipeline run started"
        );

        let mut summary = PipelineSummary::default();
        let outcome = self.execute(watermark_ms, &mut summary).await;
        summary.success = match outcome {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(run_id = %run.run_id, error = %e, "Pipeline run aborted");
                false
            }
        };

        run.finish(summary.clone());

        if let Err(e) = db::pipeline_runs::save_run(&self.db, &run).await {
            tracing::error!(run_id = %run.run_id, error = %e, "Failed to record pipeline run");
            summary.success = false;
        }

        tracing::info!(
            run_id = %run.run_id,
            messages_found = summary.messages_found,
            batches_run = summary.batches_run,
            batches_failed = summary.batches_failed,
            records_extracted = summary.records_extracted,
            records_saved = summary.records_saved,
            mappings_created = summary.mappings_created,
            cancelled = summary.cancelled,
            success = summary.success,
            "Pipeline run finished"
        );

        Ok(summary)
    }

    /// Run the stages, filling `summary` as they complete
    async fn execute(&self, watermark_ms: i64, summary: &mut PipelineSummary) -> Result<()> {
        // LOADING
        let messages: Vec<_> = db::messages::load_customer_messages_since(&self.db, watermark_ms)
            .await?
            .into_iter()
            .filter(|m| self.classifier.looks_address_like(&m.body))
            .collect();
        summary.messages_found = messages.len();

        // EXTRACTING
        let extraction = self.runner.run(&messages, &self.cancel_token).await?;
        summary.batches_run = extraction.batches_run;
        summary.batches_failed = extraction.batches_failed;
        summary.records_extracted = extraction.records_extracted;
        summary.records_saved = extraction.records_saved;

        if extraction.cancelled {
            tracing::warn!("Pipeline run cancelled, identity resolution skipped");
            summary.cancelled = true;
            return Ok(());
        }

        // RESOLVING
        let records = db::address_records::load_since(&self.db, watermark_ms).await?;
        let resolution = self.resolver.resolve(&records).await?;
        summary.mappings_created = resolution.mappings_created;

        Ok(())
    }
}
