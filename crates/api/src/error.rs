use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use simgate_core::error::CoreError;
use simgate_core::types::JobId;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `simgate_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The simulation thread ran the job and it failed.
    #[error("Job {job_id} failed: {error}")]
    JobFailed { job_id: JobId, error: String },

    /// No result arrived before the request's deadline. The job itself may
    /// still complete later.
    #[error("Job {job_id} timed out")]
    JobTimedOut { job_id: JobId },
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::AlreadyPublished(_) | CoreError::Internal(_) => {
                    tracing::error!(error = %core, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Job outcomes ---
            AppError::JobFailed { job_id, error } => {
                let body = json!({
                    "status": "failed",
                    "job_id": job_id,
                    "error": error,
                    "code": "JOB_FAILED",
                });
                return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
            }
            AppError::JobTimedOut { job_id } => {
                let body = json!({
                    "status": "timeout",
                    "job_id": job_id,
                    "error": "Timed out waiting for the simulation thread",
                    "code": "JOB_TIMEOUT",
                });
                return (StatusCode::GATEWAY_TIMEOUT, axum::Json(body)).into_response();
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
