//! Per-job staging of captured frames.

use std::io;
use std::path::{Path, PathBuf};

use simgate_core::types::JobId;

/// printf-style pattern matching [`frame_file_name`], as the encoder expects.
pub const FRAME_PATTERN: &str = "rgb_%05d.png";

/// File name of the `index`-th captured frame.
pub fn frame_file_name(index: u32) -> String {
    format!("rgb_{index:05}.png")
}

/// Per-job video file name: `sim_run.mp4` becomes `sim_run_<job>.mp4`.
pub fn video_file_name(base: &str, job_id: JobId) -> String {
    let base = Path::new(base);
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sim_run".to_string());
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    format!("{stem}_{}.{ext}", job_id.simple())
}

/// How many leading frames to drop from the encoded video.
///
/// Clamped so at least one frame is always encoded.
pub fn effective_skip(requested: u32, captured: u32) -> u32 {
    if requested >= captured {
        captured.saturating_sub(1)
    } else {
        requested
    }
}

/// A job's private frame directory under its output directory.
///
/// Dropped without [`StagingDir::into_path`], the directory is deleted, so a
/// job that errors or panics mid-capture leaves nothing behind.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    keep: bool,
}

impl StagingDir {
    /// Create a clean `frames_<job>` directory under `output_dir`, wiping
    /// any leftovers from an earlier run with the same id.
    pub fn prepare(output_dir: &Path, job_id: JobId) -> io::Result<Self> {
        let path = output_dir.join(format!("frames_{}", job_id.simple()));
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        Ok(Self { path, keep: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.path.join(frame_file_name(index))
    }

    /// Delete the directory and every staged frame.
    pub fn remove(mut self) -> io::Result<()> {
        self.keep = true;
        std::fs::remove_dir_all(&self.path)
    }

    /// Keep the frames on disk and hand back their location.
    pub fn into_path(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged frames");
        }
    }
}
