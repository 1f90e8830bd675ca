use std::time::Duration;

use simgate_core::config::{env_opt, env_or};

/// A 3-vector in world space (metres, Z up).
pub type Vec3 = [f64; 3];

/// A unit quaternion `(w, x, y, z)`.
pub type Quat = [f64; 4];

/// How the launched asset's initial linear velocity is chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum ThrowPolicy {
    /// Same velocity for every asset regardless of mass or shape.
    Constant { direction: Vec3, speed: f64 },
    /// A fixed impulse: heavier assets leave slower.
    Impulse { direction: Vec3, impulse: f64 },
}

impl ThrowPolicy {
    /// Initial linear velocity for a body of the given mass.
    pub fn velocity(&self, mass: f64) -> Vec3 {
        let (direction, speed) = match *self {
            Self::Constant { direction, speed } => (direction, speed),
            Self::Impulse { direction, impulse } => (direction, impulse / mass.max(1e-6)),
        };
        let norm = direction.iter().map(|c| c * c).sum::<f64>().sqrt() + 1e-8;
        [
            direction[0] / norm * speed,
            direction[1] / norm * speed,
            direction[2] / norm * speed,
        ]
    }
}

impl Default for ThrowPolicy {
    fn default() -> Self {
        Self::Constant {
            direction: [0.0, 1.0, 0.1],
            speed: 17.0,
        }
    }
}

/// Fixed resolution and pose of the persistent capture device.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub eye: Vec3,
    pub target: Vec3,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            eye: [0.0, -4.0, 4.0],
            target: [0.0, 0.0, 3.0],
        }
    }
}

/// The stacked block pyramid used as a fixed obstacle in every run.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidConfig {
    pub levels: u32,
    pub cube_size: f64,
    pub gap: f64,
    pub base_xy: [f64; 2],
    pub z0: f64,
    pub cube_mass: f64,
    pub color: Vec3,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            levels: 20,
            cube_size: 0.15,
            gap: 0.0,
            base_xy: [0.0, 10.0],
            z0: 0.075,
            cube_mass: 0.15,
            color: [0.25, 0.6, 0.95],
        }
    }
}

/// Simulation-thread configuration.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Physics step length in seconds.
    pub physics_dt: f64,
    /// Steps run after a physics reset before anything is measured.
    pub settle_steps: u32,
    /// Steps run after rigid-body initialization, before the throw.
    pub init_steps: u32,
    /// Height the asset is dropped from.
    pub drop_height: f64,
    pub asset_orientation: Quat,
    pub throw: ThrowPolicy,
    pub light_intensity: f64,
    pub light_color: Vec3,
    pub light_translation: Vec3,
    pub pyramid: PyramidConfig,
    pub capture: CaptureConfig,
    /// Capture every Nth step.
    pub capture_every_n: u32,
    /// Frames dropped from the start of the encoded video.
    pub skip_first_frames: u32,
    /// Base video name; each job writes `<stem>_<job id>.<ext>`.
    pub video_file_name: String,
    /// Driver ticks between heartbeat log lines.
    pub heartbeat_ticks: u64,
    /// Sleep after an idle tick so an empty queue does not spin the CPU.
    pub idle_sleep: Duration,
    pub ffmpeg_bin: String,
    /// External conversion tool; the built-in converter is used when unset.
    pub converter_cmd: Option<String>,
    pub collision_approximation: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            physics_dt: 0.01,
            settle_steps: 5,
            init_steps: 3,
            drop_height: 2.0,
            asset_orientation: [0.4207, 0.5609, 0.5609, 0.4370],
            throw: ThrowPolicy::default(),
            light_intensity: 5000.0,
            light_color: [0.75, 0.75, 0.75],
            light_translation: [1.0, 0.0, 10.0],
            pyramid: PyramidConfig::default(),
            capture: CaptureConfig::default(),
            capture_every_n: 1,
            skip_first_frames: 0,
            video_file_name: "sim_run.mp4".to_string(),
            heartbeat_ticks: 600,
            idle_sleep: Duration::from_millis(5),
            ffmpeg_bin: "ffmpeg".to_string(),
            converter_cmd: None,
            collision_approximation: "convexDecomposition".to_string(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default               |
    /// |---------------------------|-----------------------|
    /// | `PHYSICS_DT`              | `0.01`                |
    /// | `SETTLE_STEPS`            | `5`                   |
    /// | `INIT_STEPS`              | `3`                   |
    /// | `THROW_MODE`              | `constant`            |
    /// | `THROW_SPEED`             | `17.0`                |
    /// | `THROW_IMPULSE`           | `17.0`                |
    /// | `CAPTURE_WIDTH`           | `1920`                |
    /// | `CAPTURE_HEIGHT`          | `1080`                |
    /// | `CAPTURE_EVERY_N`         | `1`                   |
    /// | `PYRAMID_LEVELS`          | `20`                  |
    /// | `SKIP_FIRST_FRAMES`       | `0`                   |
    /// | `VIDEO_FILE_NAME`         | `sim_run.mp4`         |
    /// | `HEARTBEAT_TICKS`         | `600`                 |
    /// | `IDLE_SLEEP_MS`           | `5`                   |
    /// | `FFMPEG_BIN`              | `ffmpeg`              |
    /// | `ASSET_CONVERTER_CMD`     | unset (built-in)      |
    /// | `COLLISION_APPROXIMATION` | `convexDecomposition` |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let direction = match defaults.throw {
            ThrowPolicy::Constant { direction, .. } | ThrowPolicy::Impulse { direction, .. } => {
                direction
            }
        };
        let throw = match env_opt("THROW_MODE").as_deref() {
            Some("impulse") => ThrowPolicy::Impulse {
                direction,
                impulse: env_or("THROW_IMPULSE", 17.0),
            },
            Some("constant") | None => ThrowPolicy::Constant {
                direction,
                speed: env_or("THROW_SPEED", 17.0),
            },
            Some(other) => {
                tracing::warn!(mode = other, "Unknown THROW_MODE, using constant");
                defaults.throw.clone()
            }
        };

        let mut video_file_name =
            env_opt("VIDEO_FILE_NAME").unwrap_or_else(|| defaults.video_file_name.clone());
        if !video_file_name.ends_with(".mp4") {
            video_file_name.push_str(".mp4");
        }

        Self {
            physics_dt: env_or("PHYSICS_DT", defaults.physics_dt),
            settle_steps: env_or("SETTLE_STEPS", defaults.settle_steps),
            init_steps: env_or("INIT_STEPS", defaults.init_steps),
            throw,
            pyramid: PyramidConfig {
                levels: env_or("PYRAMID_LEVELS", defaults.pyramid.levels),
                ..defaults.pyramid.clone()
            },
            capture: CaptureConfig {
                width: env_or("CAPTURE_WIDTH", defaults.capture.width).max(1),
                height: env_or("CAPTURE_HEIGHT", defaults.capture.height).max(1),
                ..defaults.capture.clone()
            },
            capture_every_n: env_or("CAPTURE_EVERY_N", defaults.capture_every_n).max(1),
            skip_first_frames: env_or("SKIP_FIRST_FRAMES", defaults.skip_first_frames),
            video_file_name,
            heartbeat_ticks: env_or("HEARTBEAT_TICKS", defaults.heartbeat_ticks).max(1),
            idle_sleep: Duration::from_millis(env_or("IDLE_SLEEP_MS", 5)),
            ffmpeg_bin: env_opt("FFMPEG_BIN").unwrap_or_else(|| defaults.ffmpeg_bin.clone()),
            converter_cmd: env_opt("ASSET_CONVERTER_CMD"),
            collision_approximation: env_opt("COLLISION_APPROXIMATION")
                .unwrap_or_else(|| defaults.collision_approximation.clone()),
            ..defaults
        }
    }
}
