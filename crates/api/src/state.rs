use std::sync::Arc;

use simgate_core::queue::JobQueue;
use simgate_core::results::ResultTable;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the queue is a channel handle and everything else is
/// behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Producer side of the job queue feeding the simulation thread.
    pub queue: JobQueue,
    /// Completed results, published by the simulation thread.
    pub results: Arc<ResultTable>,
    pub config: Arc<ServerConfig>,
}
