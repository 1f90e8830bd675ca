//! Shared building blocks for the simgate job broker.
//!
//! Holds the job/result data model, the error type shared by every layer,
//! and the two structures that cross the boundary between request tasks and
//! the simulation thread: [`queue::JobQueue`] and [`results::ResultTable`].

pub mod config;
pub mod error;
pub mod job;
pub mod queue;
pub mod results;
pub mod types;
