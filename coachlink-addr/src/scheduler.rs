//! Daily pipeline scheduler
//!
//! Sleeps until the configured local time, then runs the pipeline for the
//! previous business day. A run still active from another trigger is waited
//! for, not skipped. The loop ends when the shutdown token is cancelled.

use chrono::NaiveTime;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use coachlink_common::time;

use crate::models::RunTrigger;
use crate::services::PipelineOrchestrator;
use crate::utils::pause;

/// Daily run scheduler
pub struct DailyScheduler {
    orchestrator: Arc<PipelineOrchestrator>,
    run_at: NaiveTime,
    utc_offset_minutes: i32,
}

impl DailyScheduler {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, run_at: NaiveTime, utc_offset_minutes: i32) -> Self {
        Self {
            orchestrator,
            run_at,
            utc_offset_minutes,
        }
    }

    /// Scheduler loop
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            run_at = %self.run_at,
            utc_offset_minutes = self.utc_offset_minutes,
            "Daily pipeline scheduler started"
        );

        loop {
            let now = time::now();
            let next = match time::next_daily_run(now, self.run_at, self.utc_offset_minutes) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(error = %e, "Cannot compute next run time, scheduler stopped");
                    return;
                }
            };

            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(next_run = %next, wait_secs = wait.as_secs(), "Waiting for next daily run");

            if !pause(wait, &shutdown).await {
                break;
            }

            let date = match time::previous_day(time::now(), self.utc_offset_minutes) {
                Ok(date) => date,
                Err(e) => {
                    tracing::error!(error = %e, "Cannot compute watermark date, run skipped");
                    continue;
                }
            };

            match self.orchestrator.run(date, RunTrigger::Cron).await {
                Ok(summary) if !summary.success => {
                    tracing::warn!(watermark_date = %date, "Scheduled pipeline run did not succeed");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(watermark_date = %date, error = %e, "Scheduled pipeline run failed");
                }
            }

            if shutdown.is_cancelled() {
                break;
            }
        }

        tracing::info!("Daily pipeline scheduler stopped");
    }
}
