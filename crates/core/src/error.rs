use crate::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Result for job {0} was already published")]
    AlreadyPublished(JobId),

    #[error("Internal error: {0}")]
    Internal(String),
}
