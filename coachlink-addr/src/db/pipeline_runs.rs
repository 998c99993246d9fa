//! Pipeline run history

use chrono::{DateTime, NaiveDate, Utc};
use coachlink_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{PipelineRun, PipelineSummary, RunTrigger};

/// Insert or update a run
pub async fn save_run(pool: &SqlitePool, run: &PipelineRun) -> Result<()> {
    let summary = serde_json::to_string(&run.summary)
        .map_err(|e| Error::Internal(format!("Failed to serialize summary: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO pipeline_runs (
            run_id, trigger, watermark_date, watermark_ms, summary, success, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id) DO UPDATE SET
            summary = excluded.summary,
            success = excluded.success,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(run.run_id.to_string())
    .bind(run.trigger.as_str())
    .bind(run.watermark_date.to_string())
    .bind(run.watermark_ms)
    .bind(summary)
    .bind(run.summary.success)
    .bind(run.started_at.to_rfc3339())
    .bind(run.ended_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent runs, newest first
pub async fn load_recent(pool: &SqlitePool, limit: u32) -> Result<Vec<PipelineRun>> {
    let rows = sqlx::query(
        r#"
        SELECT run_id, trigger, watermark_date, watermark_ms, summary, started_at, ended_at
        FROM pipeline_runs
        ORDER BY started_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let run_id: String = row.get("run_id");
            let trigger: String = row.get("trigger");
            let watermark_date: String = row.get("watermark_date");
            let summary: String = row.get("summary");
            let started_at: String = row.get("started_at");
            let ended_at: Option<String> = row.get("ended_at");

            Ok(PipelineRun {
                run_id: Uuid::parse_str(&run_id)
                    .map_err(|e| Error::Internal(format!("Invalid run id: {}", e)))?,
                trigger: RunTrigger::parse(&trigger)
                    .ok_or_else(|| Error::Internal(format!("Unknown trigger: {}", trigger)))?,
                watermark_date: NaiveDate::parse_from_str(&watermark_date, "%Y-%m-%d")
                    .map_err(|e| Error::Internal(format!("Invalid watermark date: {}", e)))?,
                watermark_ms: row.get("watermark_ms"),
                summary: serde_json::from_str::<PipelineSummary>(&summary)
                    .map_err(|e| Error::Internal(format!("Invalid summary: {}", e)))?,
                started_at: parse_timestamp(&started_at)?,
                ended_at: ended_at.as_deref().map(parse_timestamp).transpose()?,
            })
        })
        .collect()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp {}: {}", value, e)))
}
