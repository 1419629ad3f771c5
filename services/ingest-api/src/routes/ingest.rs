use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use benchwatch_collector::BenchmarkFailure;
use benchwatch_core::{BenchmarkPayload, RunPayload};
use benchwatch_report::{export_all, OutcomeExport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::ReqContext;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub request_id: String,
    pub received_at: DateTime<Utc>,
    pub tool: String,
    pub commit_id: String,
    pub regressions: usize,
    pub outcomes: Vec<OutcomeExport>,
    pub failures: Vec<BenchmarkFailure>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/runs", post(ingest_run))
        .route("/api/v1/measurements", post(ingest_measurement))
}

/// Ingest a whole run. Responds `200` when every benchmark completed and
/// `207` when some were rejected or faulted; the failures are listed.
async fn ingest_run(
    State(state): State<Arc<AppState>>,
    ctx: ReqContext,
    payload: Result<Json<RunPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<RunResponse>), ApiError> {
    let Json(run) = payload?;
    let report = state.coordinator.ingest_run(&run).await?;

    info!(
        request_id = %ctx.request_id,
        tool = %report.tool,
        commit = %report.commit_id,
        completed = report.outcomes.len(),
        failed = report.failures.len(),
        elapsed_ms = (Utc::now() - ctx.received_at).num_milliseconds(),
        "Run received"
    );

    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };

    Ok((
        status,
        Json(RunResponse {
            request_id: ctx.request_id.clone(),
            received_at: ctx.received_at,
            regressions: report.regressions().count(),
            outcomes: export_all(&report.outcomes),
            tool: report.tool,
            commit_id: report.commit_id,
            failures: report.failures,
        }),
    ))
}

async fn ingest_measurement(
    State(state): State<Arc<AppState>>,
    ctx: ReqContext,
    payload: Result<Json<BenchmarkPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<OutcomeExport>), ApiError> {
    let Json(payload) = payload?;
    let outcome = state.coordinator.ingest(&payload).await?;

    info!(
        request_id = %ctx.request_id,
        series = %outcome.key(),
        classification = %outcome.classification,
        "Measurement received"
    );

    Ok((StatusCode::CREATED, Json(OutcomeExport::from(outcome))))
}
