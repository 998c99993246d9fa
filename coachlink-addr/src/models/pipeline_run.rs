//! Pipeline run summaries
//!
//! Partial failures surface only as lower counts. `success` is false only
//! when a persistence error aborted the run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What started a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    /// Daily scheduler
    Cron,
    /// HTTP endpoint
    Manual,
    /// `--run-once` command-line flag
    Cli,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunTrigger::Cron => "cron",
            RunTrigger::Manual => "manual",
            RunTrigger::Cli => "cli",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cron" => Some(RunTrigger::Cron),
            "manual" => Some(RunTrigger::Manual),
            "cli" => Some(RunTrigger::Cli),
            _ => None,
        }
    }
}

/// Counts returned to the caller of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Address-like customer messages at or after the watermark
    pub messages_found: usize,
    /// Batches sent to the extraction oracle
    pub batches_run: usize,
    /// Batches abandoned after exhausting retries
    pub batches_failed: usize,
    /// Oracle answers matched back to a message
    pub records_extracted: usize,
    /// Address records newly inserted
    pub records_saved: usize,
    /// Identity mappings newly inserted
    pub mappings_created: usize,
    /// Run stopped early by shutdown
    pub cancelled: bool,
    pub success: bool,
}

/// Persisted record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub trigger: RunTrigger,
    pub watermark_date: NaiveDate,
    /// Watermark as epoch milliseconds
    pub watermark_ms: i64,
    pub summary: PipelineSummary,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn start(trigger: RunTrigger, watermark_date: NaiveDate, watermark_ms: i64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trigger,
            watermark_date,
            watermark_ms,
            summary: PipelineSummary::default(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn finish(&mut self, summary: PipelineSummary) {
        self.summary = summary;
        self.ended_at = Some(Utc::now());
    }
}
