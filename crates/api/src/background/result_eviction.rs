//! Periodic eviction of uncollected job results.
//!
//! A request that times out does not cancel its job, so the simulation
//! thread eventually publishes a result nobody will read. This task drops
//! such results once they are older than the retention period.

use std::sync::Arc;
use std::time::Duration;

use simgate_core::results::ResultTable;
use tokio_util::sync::CancellationToken;

/// Run the eviction loop until `cancel` is triggered.
pub async fn run(
    results: Arc<ResultTable>,
    retention: Duration,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = every.as_secs(),
        "Result eviction job started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Result eviction job stopping");
                break;
            }
            _ = interval.tick() => {
                let evicted = results.evict_older_than(retention);
                if evicted > 0 {
                    tracing::info!(evicted, remaining = results.len(), "Result eviction: dropped stale results");
                } else {
                    tracing::debug!("Result eviction: nothing to drop");
                }
            }
        }
    }
}
