//! Handlers for job submission.
//!
//! Each request becomes exactly one job. The handler enqueues it for the
//! simulation thread and then blocks on the result table until the job's
//! result arrives or the kind-specific timeout elapses.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use simgate_core::job::{
    JobDescriptor, JobPayload, JobResult, JobStatus, ResultData, SubmitConversion,
    SubmitSimulation,
};
use simgate_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Body of a successful job response.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub status: JobStatus,
    pub job_id: JobId,
    #[serde(flatten)]
    pub data: ResultData,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(input)| input)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Enqueue `payload` and wait up to `timeout` for its result.
async fn submit_and_wait(
    state: &AppState,
    payload: JobPayload,
    timeout: Duration,
) -> AppResult<Json<JobResponse>> {
    let job = JobDescriptor::new(payload);
    let job_id = job.id;
    let kind = job.kind();

    state.queue.enqueue(job)?;
    tracing::info!(
        %job_id,
        %kind,
        queue_depth = state.queue.depth(),
        "Job submitted, waiting for result",
    );

    let JobResult { status, data, .. } = state.results.await_result(job_id, timeout).await;

    match status {
        JobStatus::Completed => {
            tracing::info!(%job_id, %kind, "Job completed");
            Ok(Json(JobResponse {
                status,
                job_id,
                data,
            }))
        }
        JobStatus::Failed => {
            let error = data
                .error
                .unwrap_or_else(|| "job failed without an error description".to_string());
            tracing::warn!(%job_id, %kind, %error, "Job failed");
            Err(AppError::JobFailed { job_id, error })
        }
        JobStatus::TimedOut => {
            tracing::warn!(
                %job_id,
                %kind,
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for job result",
            );
            Err(AppError::JobTimedOut { job_id })
        }
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /convert
///
/// Convert a mesh into a simulation-ready asset with the given mass.
pub async fn submit_conversion(
    State(state): State<AppState>,
    body: Result<Json<SubmitConversion>, JsonRejection>,
) -> AppResult<Json<JobResponse>> {
    let payload = parse_body(body)?.into_payload()?;
    let timeout = state.config.convert_timeout();
    submit_and_wait(&state, JobPayload::Convert(payload), timeout).await
}

/// POST /simulate
///
/// Throw the asset at the block pyramid and record the result.
pub async fn submit_simulation(
    State(state): State<AppState>,
    body: Result<Json<SubmitSimulation>, JsonRejection>,
) -> AppResult<Json<JobResponse>> {
    let payload = parse_body(body)?.into_payload()?;
    let timeout = state.config.simulate_timeout();
    submit_and_wait(&state, JobPayload::Simulate(payload), timeout).await
}
