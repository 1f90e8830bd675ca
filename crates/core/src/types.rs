/// Jobs are identified by random v4 UUIDs minted by the gateway.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Mint a fresh, unique job identifier.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4()
}
