//! In-process reference host.
//!
//! Keeps the scene graph in a sorted map, integrates rigid bodies with
//! gravity and a ground plane, and renders a flat side view into PNG frames.
//! Good enough to exercise the whole job protocol without a GPU engine; it
//! makes no attempt at physical accuracy.

use std::collections::BTreeMap;
use std::path::Path;

use image::{Rgb, RgbImage};

use crate::config::{CaptureConfig, Vec3};
use crate::convert::PhysicsSidecar;
use crate::error::HostError;
use crate::host::{
    CaptureDevice, NodeSpec, Placement, RigidBodyHandle, RigidBodyState, SimulationHost,
};

/// Root of every scene path.
pub const WORLD_ROOT: &str = "/World";

const GRAVITY: f64 = -9.81;
const GROUND_RESTITUTION: f64 = 0.2;
const GROUND_FRICTION: f64 = 0.98;
/// Half-size of an imported asset at scale 1.0.
const ASSET_HALF_EXTENT: f64 = 0.1;
/// Vertical field of view of the side camera, in metres.
const VIEW_HEIGHT_M: f64 = 8.0;

const SKY: Rgb<u8> = Rgb([200, 214, 229]);
const GROUND: Rgb<u8> = Rgb([96, 96, 96]);
const ASSET_COLOR: Rgb<u8> = Rgb([230, 120, 40]);

#[derive(Debug, Clone)]
enum NodeKind {
    Xform,
    GroundPlane,
    Light,
    Body { color: Rgb<u8> },
    Camera,
}

#[derive(Debug, Clone)]
struct Body {
    position: Vec3,
    velocity: Vec3,
    mass: f64,
    half_extent: f64,
    /// Sleeping bodies hold still until something hits them.
    asleep: bool,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    body: Option<Body>,
}

pub struct HeadlessHost {
    nodes: BTreeMap<String, Node>,
    physics_dt: f64,
    running: bool,
    frames: u64,
    physics_steps: u64,
    capture_devices_created: u32,
}

impl HeadlessHost {
    pub fn new(physics_dt: f64) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            WORLD_ROOT.to_string(),
            Node {
                kind: NodeKind::Xform,
                body: None,
            },
        );
        Self {
            nodes,
            physics_dt,
            running: true,
            frames: 0,
            physics_steps: 0,
            capture_devices_created: 0,
        }
    }

    /// Make [`SimulationHost::is_running`] report false.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Host frames advanced so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn physics_steps(&self) -> u64 {
        self.physics_steps
    }

    /// How many capture devices were ever created on this host.
    pub fn capture_devices_created(&self) -> u32 {
        self.capture_devices_created
    }

    /// Every node path currently in the scene, sorted.
    pub fn node_paths(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    fn has_ground(&self) -> bool {
        self.nodes
            .values()
            .any(|n| matches!(n.kind, NodeKind::GroundPlane))
    }

    fn body(&self, path: &str) -> Result<&Body, HostError> {
        self.nodes
            .get(path)
            .ok_or_else(|| HostError::NodeNotFound(path.to_string()))?
            .body
            .as_ref()
            .ok_or_else(|| HostError::NotRigidBody(path.to_string()))
    }

    fn body_mut(&mut self, path: &str) -> Result<&mut Body, HostError> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| HostError::NodeNotFound(path.to_string()))?
            .body
            .as_mut()
            .ok_or_else(|| HostError::NotRigidBody(path.to_string()))
    }

    /// Wake sleeping bodies that overlap a moving one and hand them part of
    /// its momentum.
    fn resolve_contacts(&mut self) {
        let movers: Vec<(Vec3, Vec3, f64)> = self
            .nodes
            .values()
            .filter_map(|n| n.body.as_ref())
            .filter(|b| !b.asleep)
            .map(|b| (b.position, b.velocity, b.half_extent))
            .collect();

        for body in self.nodes.values_mut().filter_map(|n| n.body.as_mut()) {
            if !body.asleep {
                continue;
            }
            for (position, velocity, half) in &movers {
                let reach = half + body.half_extent;
                let overlaps = (0..3).all(|i| (position[i] - body.position[i]).abs() < reach);
                if overlaps {
                    body.asleep = false;
                    body.velocity = velocity.map(|v| v * 0.5);
                    break;
                }
            }
        }
    }

    fn render(&self, device: &CaptureDevice) -> RgbImage {
        let (w, h) = (device.width, device.height);
        let metres_per_px = VIEW_HEIGHT_M / f64::from(h);
        let (cx, cz) = (0.0, VIEW_HEIGHT_M / 2.0 - 1.0);
        let to_px = |x: f64, z: f64| -> (f64, f64) {
            (
                (x - cx) / metres_per_px + f64::from(w) / 2.0,
                f64::from(h) / 2.0 - (z - cz) / metres_per_px,
            )
        };

        let mut img = RgbImage::from_pixel(w, h, SKY);

        if self.has_ground() {
            let (_, horizon) = to_px(0.0, 0.0);
            let top = horizon.clamp(0.0, f64::from(h)) as u32;
            for y in top..h {
                for x in 0..w {
                    img.put_pixel(x, y, GROUND);
                }
            }
        }

        for node in self.nodes.values() {
            let (NodeKind::Body { color }, Some(body)) = (&node.kind, &node.body) else {
                continue;
            };
            let (px, py) = to_px(body.position[0], body.position[2]);
            let half_px = (body.half_extent / metres_per_px).max(1.0);
            let x0 = (px - half_px).max(0.0) as u32;
            let x1 = (px + half_px).min(f64::from(w)) as u32;
            let y0 = (py - half_px).max(0.0) as u32;
            let y1 = (py + half_px).min(f64::from(h)) as u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    img.put_pixel(x, y, *color);
                }
            }
        }

        img
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(0.01)
    }
}

fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

fn to_rgb(color: Vec3) -> Rgb<u8> {
    Rgb(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
}

impl SimulationHost for HeadlessHost {
    fn is_running(&self) -> bool {
        self.running
    }

    fn update(&mut self) -> Result<(), HostError> {
        if !self.running {
            return Err(HostError::Stopped);
        }
        self.frames += 1;
        Ok(())
    }

    fn step_physics(&mut self) -> Result<(), HostError> {
        if !self.running {
            return Err(HostError::Stopped);
        }
        let dt = self.physics_dt;
        let ground = self.has_ground();

        for body in self.nodes.values_mut().filter_map(|n| n.body.as_mut()) {
            if body.asleep {
                continue;
            }
            body.velocity[2] += GRAVITY * dt;
            for i in 0..3 {
                body.position[i] += body.velocity[i] * dt;
            }
            if ground && body.position[2] < body.half_extent {
                body.position[2] = body.half_extent;
                body.velocity[2] = -body.velocity[2] * GROUND_RESTITUTION;
                body.velocity[0] *= GROUND_FRICTION;
                body.velocity[1] *= GROUND_FRICTION;
            }
        }

        self.resolve_contacts();
        self.physics_steps += 1;
        Ok(())
    }

    fn reset_physics(&mut self) -> Result<(), HostError> {
        for body in self.nodes.values_mut().filter_map(|n| n.body.as_mut()) {
            body.velocity = [0.0; 3];
        }
        Ok(())
    }

    fn spawn(
        &mut self,
        path: &str,
        spec: &NodeSpec,
        placement: Placement,
    ) -> Result<(), HostError> {
        if self.nodes.contains_key(path) {
            return Err(HostError::NodeExists(path.to_string()));
        }
        match parent_of(path) {
            Some(parent) if self.nodes.contains_key(parent) => {}
            _ => return Err(HostError::ParentMissing(path.to_string())),
        }

        let node = match spec {
            NodeSpec::Xform => Node {
                kind: NodeKind::Xform,
                body: None,
            },
            NodeSpec::GroundPlane => Node {
                kind: NodeKind::GroundPlane,
                body: None,
            },
            NodeSpec::DistantLight { .. } => Node {
                kind: NodeKind::Light,
                body: None,
            },
            NodeSpec::Cuboid { size, mass, color } => Node {
                kind: NodeKind::Body {
                    color: to_rgb(*color),
                },
                body: Some(Body {
                    position: placement.translation,
                    velocity: [0.0; 3],
                    mass: *mass,
                    half_extent: size / 2.0,
                    asleep: true,
                }),
            },
            NodeSpec::Asset { source, scale } => {
                if !source.is_file() {
                    return Err(HostError::AssetNotFound(source.clone()));
                }
                let mass = PhysicsSidecar::load_for(source)
                    .map(|s| s.mass)
                    .unwrap_or(1.0);
                Node {
                    kind: NodeKind::Body { color: ASSET_COLOR },
                    body: Some(Body {
                        position: placement.translation,
                        velocity: [0.0; 3],
                        mass,
                        half_extent: ASSET_HALF_EXTENT * scale,
                        // Held in place until its rigid body is initialized.
                        asleep: true,
                    }),
                }
            }
        };

        self.nodes.insert(path.to_string(), node);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> bool {
        if path == WORLD_ROOT {
            return false;
        }
        let prefix = format!("{path}/");
        let before = self.nodes.len();
        self.nodes
            .retain(|p, _| p.as_str() != path && !p.starts_with(&prefix));
        self.nodes.len() != before
    }

    fn top_level_nodes(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|p| parent_of(p) == Some(WORLD_ROOT))
            .filter_map(|p| p.rsplit_once('/').map(|(_, name)| name.to_string()))
            .collect()
    }

    fn create_capture_device(
        &mut self,
        path: &str,
        config: &CaptureConfig,
    ) -> Result<CaptureDevice, HostError> {
        self.spawn(path, &NodeSpec::Xform, Placement::at(config.eye))?;
        if let Some(node) = self.nodes.get_mut(path) {
            node.kind = NodeKind::Camera;
        }
        self.capture_devices_created += 1;
        Ok(CaptureDevice {
            path: path.to_string(),
            width: config.width,
            height: config.height,
        })
    }

    fn capture_frame(&mut self, device: &CaptureDevice, path: &Path) -> Result<(), HostError> {
        match self.nodes.get(&device.path) {
            Some(Node {
                kind: NodeKind::Camera,
                ..
            }) => {}
            _ => return Err(HostError::NodeNotFound(device.path.clone())),
        }
        self.render(device)
            .save(path)
            .map_err(|e| HostError::Capture(format!("{}: {e}", path.display())))
    }

    fn init_rigid_body(&mut self, path: &str) -> Result<RigidBodyHandle, HostError> {
        self.body_mut(path)?.asleep = false;
        Ok(RigidBodyHandle {
            path: path.to_string(),
        })
    }

    fn read_rigid_body(&self, handle: &RigidBodyHandle) -> Result<RigidBodyState, HostError> {
        let body = self.body(&handle.path)?;
        Ok(RigidBodyState {
            position: body.position,
            linear_velocity: body.velocity,
            mass: body.mass,
        })
    }

    fn write_rigid_body(
        &mut self,
        handle: &RigidBodyHandle,
        state: &RigidBodyState,
    ) -> Result<(), HostError> {
        let body = self.body_mut(&handle.path)?;
        body.position = state.position;
        body.velocity = state.linear_velocity;
        body.asleep = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn cube() -> NodeSpec {
        NodeSpec::Cuboid {
            size: 0.2,
            mass: 0.15,
            color: [0.2, 0.4, 0.9],
        }
    }

    #[test]
    fn spawn_requires_existing_parent() {
        let mut host = HeadlessHost::default();
        let err = host
            .spawn("/World/Objects/box", &cube(), Placement::default())
            .unwrap_err();
        assert_matches!(err, HostError::ParentMissing(_));
    }

    #[test]
    fn spawn_rejects_duplicates() {
        let mut host = HeadlessHost::default();
        host.spawn("/World/ground", &NodeSpec::GroundPlane, Placement::default())
            .unwrap();
        assert_matches!(
            host.spawn("/World/ground", &NodeSpec::GroundPlane, Placement::default()),
            Err(HostError::NodeExists(_))
        );
    }

    #[test]
    fn remove_drops_whole_subtree() {
        let mut host = HeadlessHost::default();
        host.spawn("/World/Objects", &NodeSpec::Xform, Placement::default())
            .unwrap();
        host.spawn("/World/Objects/a", &cube(), Placement::default())
            .unwrap();
        host.spawn("/World/ObjectsExtra", &NodeSpec::Xform, Placement::default())
            .unwrap();

        assert!(host.remove("/World/Objects"));
        assert!(!host.contains("/World/Objects/a"));
        assert!(host.contains("/World/ObjectsExtra"), "sibling with shared prefix survives");
        assert!(!host.remove("/World/Objects"));
        assert!(!host.remove(WORLD_ROOT));
    }

    #[test]
    fn top_level_lists_direct_children_only() {
        let mut host = HeadlessHost::default();
        host.spawn("/World/Objects", &NodeSpec::Xform, Placement::default())
            .unwrap();
        host.spawn("/World/Objects/a", &cube(), Placement::default())
            .unwrap();
        host.spawn("/World/light", &NodeSpec::Xform, Placement::default())
            .unwrap();

        assert_eq!(host.top_level_nodes(), vec!["Objects", "light"]);
    }

    #[test]
    fn thrown_body_falls_and_lands_on_ground() {
        let mut host = HeadlessHost::default();
        host.spawn("/World/ground", &NodeSpec::GroundPlane, Placement::default())
            .unwrap();
        host.spawn("/World/box", &cube(), Placement::at([0.0, 0.0, 2.0]))
            .unwrap();
        let handle = host.init_rigid_body("/World/box").unwrap();

        for _ in 0..500 {
            host.step_physics().unwrap();
        }

        let state = host.read_rigid_body(&handle).unwrap();
        assert!((state.position[2] - 0.1).abs() < 1e-6, "rests on the ground");
        assert_eq!(host.physics_steps(), 500);
    }

    #[test]
    fn sleeping_body_holds_still() {
        let mut host = HeadlessHost::default();
        host.spawn("/World/box", &cube(), Placement::at([0.0, 0.0, 1.0]))
            .unwrap();
        host.step_physics().unwrap();

        let state = host
            .read_rigid_body(&RigidBodyHandle {
                path: "/World/box".into(),
            })
            .unwrap();
        assert_eq!(state.position, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn capture_writes_png_of_device_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = HeadlessHost::default();
        let device = host
            .create_capture_device(
                "/World/CaptureCamera",
                &CaptureConfig {
                    width: 32,
                    height: 18,
                    ..CaptureConfig::default()
                },
            )
            .unwrap();

        let frame = dir.path().join("rgb_00000.png");
        host.capture_frame(&device, &frame).unwrap();

        let img = image::open(&frame).unwrap();
        assert_eq!((img.width(), img.height()), (32, 18));
        assert_eq!(host.capture_devices_created(), 1);
    }

    #[test]
    fn capture_fails_once_camera_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = HeadlessHost::default();
        let device = host
            .create_capture_device("/World/CaptureCamera", &CaptureConfig::default())
            .unwrap();
        host.remove("/World/CaptureCamera");

        assert_matches!(
            host.capture_frame(&device, &dir.path().join("x.png")),
            Err(HostError::NodeNotFound(_))
        );
    }

    #[test]
    fn missing_asset_file_is_rejected() {
        let mut host = HeadlessHost::default();
        let err = host
            .spawn(
                "/World/obj",
                &NodeSpec::Asset {
                    source: "/nonexistent/cube.usd".into(),
                    scale: 1.0,
                },
                Placement::default(),
            )
            .unwrap_err();
        assert_matches!(err, HostError::AssetNotFound(_));
    }

    #[test]
    fn stopped_host_refuses_to_tick() {
        let mut host = HeadlessHost::default();
        host.stop();
        assert!(!host.is_running());
        assert_matches!(host.update(), Err(HostError::Stopped));
    }
}
