use std::path::PathBuf;

use crate::convert::ConvertError;
use crate::ffmpeg::EncodeError;

/// Errors raised by a [`crate::host::SimulationHost`].
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("scene node already exists: {0}")]
    NodeExists(String),

    #[error("scene node not found: {0}")]
    NodeNotFound(String),

    #[error("parent of scene node does not exist: {0}")]
    ParentMissing(String),

    #[error("asset file not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error("scene node is not a rigid body: {0}")]
    NotRigidBody(String),

    #[error("frame capture failed: {0}")]
    Capture(String),

    #[error("simulation host has stopped")]
    Stopped,
}

/// Errors that fail a job on the simulation thread.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job panicked: {0}")]
    Panicked(String),
}
