//! Asset conversion collaborators.
//!
//! A conversion turns a generated mesh into an asset the simulation host can
//! load, tagged with its mass. It never touches the live scene, so a failed
//! conversion cannot corrupt the simulation context.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

/// Mesh formats accepted by the built-in converter.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["obj", "stl", "fbx", "glb", "gltf", "usd", "usda", "usdc"];

/// Suffix of the physics sidecar written next to a converted asset.
pub const SIDECAR_SUFFIX: &str = "physics.json";

/// Error type for asset conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("source asset not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("unsupported asset format: {0}")]
    UnsupportedFormat(String),

    #[error("conversion tool not found: {0}")]
    ToolNotFound(std::io::Error),

    #[error("conversion tool failed (exit code {exit_code:?}): {stderr}")]
    ToolFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("invalid physics sidecar: {0}")]
    Sidecar(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Physical properties stored alongside a converted asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsSidecar {
    pub mass: f64,
    pub collision_approximation: String,
    pub source: PathBuf,
}

impl PhysicsSidecar {
    /// Sidecar location for an asset: `<dir>/<stem>.physics.json`.
    pub fn path_for(asset: &Path) -> PathBuf {
        let stem = asset
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        asset.with_file_name(format!("{stem}.{SIDECAR_SUFFIX}"))
    }

    /// Load the sidecar for `asset`, if one exists and parses.
    pub fn load_for(asset: &Path) -> Option<Self> {
        let raw = std::fs::read(Self::path_for(asset)).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    pub fn write_for(&self, asset: &Path) -> Result<(), ConvertError> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(Self::path_for(asset), json)?;
        Ok(())
    }
}

/// Turns a source mesh into a loadable asset in `destination`.
pub trait AssetConverter: Send {
    /// Convert `source` into `destination` with the given mass. Returns the
    /// directory holding the produced asset.
    fn convert_asset(
        &self,
        source: &Path,
        destination: &Path,
        mass: f64,
    ) -> Result<PathBuf, ConvertError>;
}

fn check_source(source: &Path) -> Result<(), ConvertError> {
    if !source.is_file() {
        return Err(ConvertError::SourceNotFound(source.to_path_buf()));
    }
    let ext = source
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ConvertError::UnsupportedFormat(ext));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Built-in converter
// ---------------------------------------------------------------------------

/// Copies the mesh into the destination directory and writes a physics
/// sidecar carrying the mass.
pub struct LocalAssetConverter {
    collision_approximation: String,
}

impl LocalAssetConverter {
    pub fn new(collision_approximation: impl Into<String>) -> Self {
        Self {
            collision_approximation: collision_approximation.into(),
        }
    }
}

impl AssetConverter for LocalAssetConverter {
    fn convert_asset(
        &self,
        source: &Path,
        destination: &Path,
        mass: f64,
    ) -> Result<PathBuf, ConvertError> {
        check_source(source)?;
        std::fs::create_dir_all(destination)?;

        let file_name = source
            .file_name()
            .ok_or_else(|| ConvertError::SourceNotFound(source.to_path_buf()))?;
        let asset = destination.join(file_name);
        std::fs::copy(source, &asset)?;

        PhysicsSidecar {
            mass,
            collision_approximation: self.collision_approximation.clone(),
            source: source.to_path_buf(),
        }
        .write_for(&asset)?;

        tracing::debug!(
            source = %source.display(),
            asset = %asset.display(),
            mass,
            "Asset converted",
        );
        Ok(destination.to_path_buf())
    }
}

// ---------------------------------------------------------------------------
// External tool
// ---------------------------------------------------------------------------

/// Delegates to an external conversion tool invoked as
/// `<cmd> <input> <output.usd> --mass M --collision-approximation A`.
pub struct CommandConverter {
    program: String,
    base_args: Vec<String>,
    collision_approximation: String,
}

impl CommandConverter {
    /// `command` may carry leading arguments, e.g. `"python convert_mesh.py"`.
    pub fn new(command: &str, collision_approximation: impl Into<String>) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            base_args: parts.collect(),
            collision_approximation: collision_approximation.into(),
        }
    }

    /// Full argument list for converting `source` into `output`.
    pub fn args(&self, source: &Path, output: &Path, mass: f64) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            source.display().to_string(),
            output.display().to_string(),
            "--mass".to_string(),
            mass.to_string(),
            "--collision-approximation".to_string(),
            self.collision_approximation.clone(),
        ]);
        args
    }
}

impl AssetConverter for CommandConverter {
    fn convert_asset(
        &self,
        source: &Path,
        destination: &Path,
        mass: f64,
    ) -> Result<PathBuf, ConvertError> {
        check_source(source)?;
        std::fs::create_dir_all(destination)?;

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string());
        let output_file = destination.join(format!("{stem}.usd"));

        let output = Command::new(&self.program)
            .args(self.args(source, &output_file, mass))
            .output()
            .map_err(ConvertError::ToolNotFound)?;

        if !output.status.success() {
            return Err(ConvertError::ToolFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(destination.to_path_buf())
    }
}
