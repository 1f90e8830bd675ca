//! Scene lifecycle: teardown, deterministic rebuild, and cleanup of the
//! per-job transient content.
//!
//! Only the nodes in [`TRANSIENT_NODES`] are ever removed. The capture camera
//! lives outside that set and survives every job.

use std::path::Path;

use crate::config::SimulationConfig;
use crate::error::HostError;
use crate::host::{NodeSpec, Placement, RigidBodyHandle, RigidBodyState, SimulationHost};

pub const GROUND_PATH: &str = "/World/defaultGroundPlane";
pub const LIGHT_PATH: &str = "/World/lightDistant";
pub const OBJECTS_PATH: &str = "/World/Objects";
pub const ASSET_PATH: &str = "/World/Objects/custom_obj";
pub const PYRAMID_PATH: &str = "/World/Objects/Pyramid";
pub const CAPTURE_DEVICE_PATH: &str = "/World/CaptureCamera";

/// Top-level nodes created by [`build`] and removed by [`teardown`].
pub const TRANSIENT_NODES: [&str; 3] = [GROUND_PATH, LIGHT_PATH, OBJECTS_PATH];

/// Names of transient nodes still present under the world root.
pub fn remaining_transient<H: SimulationHost + ?Sized>(host: &H) -> Vec<String> {
    let top = host.top_level_nodes();
    TRANSIENT_NODES
        .iter()
        .filter_map(|p| p.rsplit_once('/').map(|(_, name)| name))
        .filter(|name| top.iter().any(|t| t == name))
        .map(str::to_string)
        .collect()
}

/// Remove every transient node. Returns how many were present.
pub fn remove_transient<H: SimulationHost + ?Sized>(host: &mut H) -> usize {
    TRANSIENT_NODES
        .iter()
        .filter(|path| host.remove(path))
        .count()
}

/// Remove the previous job's content and clear physics state.
pub fn teardown<H: SimulationHost + ?Sized>(host: &mut H) -> Result<(), HostError> {
    let removed = remove_transient(host);
    host.reset_physics()?;
    tracing::debug!(removed, "Scene torn down");
    Ok(())
}

/// Advance physics `steps` times.
pub fn settle<H: SimulationHost + ?Sized>(host: &mut H, steps: u32) -> Result<(), HostError> {
    for _ in 0..steps {
        host.step_physics()?;
    }
    Ok(())
}

/// Populate the scene: ground, light, the asset and the block pyramid.
pub fn build<H: SimulationHost + ?Sized>(
    host: &mut H,
    config: &SimulationConfig,
    asset: &Path,
    scale_factor: f64,
) -> Result<(), HostError> {
    host.spawn(GROUND_PATH, &NodeSpec::GroundPlane, Placement::default())?;
    host.spawn(
        LIGHT_PATH,
        &NodeSpec::DistantLight {
            intensity: config.light_intensity,
            color: config.light_color,
        },
        Placement::at(config.light_translation),
    )?;
    host.spawn(OBJECTS_PATH, &NodeSpec::Xform, Placement::default())?;
    host.spawn(
        ASSET_PATH,
        &NodeSpec::Asset {
            source: asset.to_path_buf(),
            scale: scale_factor,
        },
        Placement {
            translation: [0.0, 0.0, config.drop_height],
            orientation: config.asset_orientation,
        },
    )?;
    let blocks = build_pyramid(host, config)?;

    tracing::debug!(asset = %asset.display(), scale_factor, blocks, "Scene built");
    Ok(())
}

/// Stack `levels` rows of cubes, each row one shorter than the one below and
/// centred on it. Returns the number of blocks spawned.
pub fn build_pyramid<H: SimulationHost + ?Sized>(
    host: &mut H,
    config: &SimulationConfig,
) -> Result<u32, HostError> {
    let p = &config.pyramid;
    host.spawn(PYRAMID_PATH, &NodeSpec::Xform, Placement::default())?;

    let pitch = p.cube_size + p.gap;
    let cube = NodeSpec::Cuboid {
        size: p.cube_size,
        mass: p.cube_mass,
        color: p.color,
    };

    let mut spawned = 0;
    for level in 0..p.levels {
        let row = p.levels - level;
        let x0 = p.base_xy[0] - f64::from(row - 1) * pitch / 2.0;
        let z = p.z0 + f64::from(level) * pitch;
        for j in 0..row {
            let path = format!("{PYRAMID_PATH}/cube_{level}_{j}");
            let translation = [x0 + f64::from(j) * pitch, p.base_xy[1], z];
            host.spawn(&path, &cube, Placement::at(translation))?;
            spawned += 1;
        }
    }
    Ok(spawned)
}

/// Initialize the asset's rigid body, let it settle for `init_steps`, then
/// overwrite its linear velocity with the configured throw.
pub fn launch<H: SimulationHost + ?Sized>(
    host: &mut H,
    config: &SimulationConfig,
) -> Result<RigidBodyState, HostError> {
    let handle: RigidBodyHandle = host.init_rigid_body(ASSET_PATH)?;
    settle(host, config.init_steps)?;

    let mut state = host.read_rigid_body(&handle)?;
    state.linear_velocity = config.throw.velocity(state.mass);
    host.write_rigid_body(&handle, &state)?;

    tracing::debug!(
        mass = state.mass,
        velocity = ?state.linear_velocity,
        "Asset launched",
    );
    Ok(state)
}

/// Remove transient content after a job. Safe to call on an already clean
/// scene; never touches the capture device.
pub fn cleanup<H: SimulationHost + ?Sized>(host: &mut H) {
    let removed = remove_transient(host);
    if let Err(e) = host.reset_physics() {
        tracing::warn!(error = %e, "Physics reset failed during cleanup");
    }
    tracing::debug!(removed, "Scene cleaned up");
}
