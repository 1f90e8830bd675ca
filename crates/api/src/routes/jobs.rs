//! Route definitions for job submission.

use axum::routing::post;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Job routes, mounted at the root.
///
/// ```text
/// POST   /convert     -> submit_conversion
/// POST   /simulate    -> submit_simulation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/convert", post(jobs::submit_conversion))
        .route("/simulate", post(jobs::submit_simulation))
}
