//! The narrow interface the driver uses to talk to the simulation engine.
//!
//! The engine is a black box that can only be driven from the thread that
//! owns it. Scene content is addressed by slash-separated node paths
//! (`/World/Objects/custom_obj`); removing a node removes its subtree.

use std::path::{Path, PathBuf};

use crate::config::{CaptureConfig, Quat, Vec3};
use crate::error::HostError;

/// Identity quaternion.
pub const IDENTITY: Quat = [1.0, 0.0, 0.0, 0.0];

/// What to create at a node path.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    /// Empty transform used to group children.
    Xform,
    GroundPlane,
    DistantLight { intensity: f64, color: Vec3 },
    /// Rigid, collidable box.
    Cuboid { size: f64, mass: f64, color: Vec3 },
    /// Rigid body loaded from a converted asset file.
    Asset { source: PathBuf, scale: f64 },
}

/// Where a node is placed relative to the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub translation: Vec3,
    pub orientation: Quat,
}

impl Placement {
    pub fn at(translation: Vec3) -> Self {
        Self {
            translation,
            orientation: IDENTITY,
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::at([0.0, 0.0, 0.0])
    }
}

/// Handle to the persistent capture device (a camera plus render target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// Handle to an initialized rigid body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigidBodyHandle {
    pub path: String,
}

/// Snapshot of a rigid body's dynamic state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodyState {
    pub position: Vec3,
    pub linear_velocity: Vec3,
    pub mass: f64,
}

/// A single-threaded simulation/render engine.
///
/// Implementations are owned by the simulation driver and are never
/// touched from any other thread.
pub trait SimulationHost {
    /// Whether the host's main loop is still alive.
    fn is_running(&self) -> bool;

    /// Advance the host application by one frame: process events and
    /// refresh the rendered image.
    fn update(&mut self) -> Result<(), HostError>;

    /// Advance physics by one fixed step.
    fn step_physics(&mut self) -> Result<(), HostError>;

    /// Clear cached contact and velocity state.
    fn reset_physics(&mut self) -> Result<(), HostError>;

    /// Create a node at `path`. The parent path must already exist.
    fn spawn(&mut self, path: &str, spec: &NodeSpec, placement: Placement)
        -> Result<(), HostError>;

    /// Remove the node at `path` and its subtree. Returns whether anything
    /// was removed.
    fn remove(&mut self, path: &str) -> bool;

    /// Names of the direct children of the world root, sorted.
    fn top_level_nodes(&self) -> Vec<String>;

    /// Create the capture camera at `path`. Expensive; callers keep the
    /// returned device for the rest of the process lifetime.
    fn create_capture_device(
        &mut self,
        path: &str,
        config: &CaptureConfig,
    ) -> Result<CaptureDevice, HostError>;

    /// Write the device's current image to `path`.
    fn capture_frame(&mut self, device: &CaptureDevice, path: &Path) -> Result<(), HostError>;

    /// Start simulating the body at `path` and return a handle to it.
    fn init_rigid_body(&mut self, path: &str) -> Result<RigidBodyHandle, HostError>;

    fn read_rigid_body(&self, handle: &RigidBodyHandle) -> Result<RigidBodyState, HostError>;

    fn write_rigid_body(
        &mut self,
        handle: &RigidBodyHandle,
        state: &RigidBodyState,
    ) -> Result<(), HostError>;
}
