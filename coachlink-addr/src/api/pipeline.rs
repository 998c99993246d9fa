//! Pipeline trigger API handlers
//!
//! POST /pipeline/run, GET /pipeline/runs

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use coachlink_common::time;

use crate::{
    error::{ApiError, ApiResult},
    models::{PipelineRun, PipelineSummary, RunTrigger},
    AppState,
};

const DEFAULT_RUNS_LIMIT: u32 = 20;
const MAX_RUNS_LIMIT: u32 = 200;

/// POST /pipeline/run request
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// Watermark date "YYYY-MM-DD"; previous business day when absent
    #[serde(default)]
    pub date: Option<String>,
}

/// POST /pipeline/run response
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub watermark_date: NaiveDate,
    #[serde(flatten)]
    pub summary: PipelineSummary,
}

/// GET /pipeline/runs query
#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<u32>,
}

/// GET /pipeline/runs response
#[derive(Debug, Serialize)]
pub struct RunsResponse {
    pub runs: Vec<PipelineRun>,
}

fn parse_date(value: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        ApiError::BadRequest(format!("Invalid date '{}' (expected YYYY-MM-DD): {}", value, e))
    })
}

/// POST /pipeline/run
///
/// Runs the pipeline in its own task and returns its summary once done. The
/// run completes and is recorded even if the client goes away first. The
/// body is optional. Answers 409 Conflict while another run is active.
pub async fn run_pipeline(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<RunResponse>> {
    let request: RunRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let watermark_date = match request.date.as_deref() {
        Some(date) => parse_date(date)?,
        None => time::previous_day(time::now(), state.orchestrator.utc_offset_minutes())?,
    };

    // Detached from the request so a dropped client cannot abandon the run
    let orchestrator = Arc::clone(&state.orchestrator);
    let handle = tokio::spawn(async move {
        orchestrator
            .try_run(watermark_date, RunTrigger::Manual)
            .await
    });

    let summary = handle
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline run task failed: {}", e)))??
        .ok_or_else(|| ApiError::Conflict("Pipeline run already active".to_string()))?;

    if !summary.success {
        *state.last_error.write().await = Some(format!(
            "Pipeline run for {} aborted by a persistence error",
            watermark_date
        ));
    }

    Ok(Json(RunResponse {
        watermark_date,
        summary,
    }))
}

/// GET /pipeline/runs?limit=N
///
/// Most recent runs, newest first.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<Json<RunsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_RUNS_LIMIT);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }

    let runs = crate::db::pipeline_runs::load_recent(&state.db, limit.min(MAX_RUNS_LIMIT)).await?;
    Ok(Json(RunsResponse { runs }))
}

/// Build pipeline routes
pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/run", post(run_pipeline))
        .route("/pipeline/runs", get(list_runs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(matches!(parse_date("03/01/2024"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_date("2024-02-30"), Err(ApiError::BadRequest(_))));
    }
}
