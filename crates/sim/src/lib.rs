//! The simulation side of simgate.
//!
//! Everything in this crate runs on the single simulation thread. The
//! [`driver::SimulationDriver`] owns the [`host::SimulationHost`] and pulls
//! jobs from the queue one at a time; [`protocol`] runs the simulate-job
//! state machine on top of [`scene`] and the capture/encode pipeline.

pub mod capture;
pub mod config;
pub mod convert;
pub mod driver;
pub mod error;
pub mod ffmpeg;
pub mod headless;
pub mod host;
pub mod protocol;
pub mod scene;
