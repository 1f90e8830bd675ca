//! Video encoding of captured frame sequences.
//!
//! The simulation thread is synchronous, so the encoder runs `ffmpeg` as a
//! blocking child process. A missing binary is not an error: the caller keeps
//! the staged frames and reports where they are.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

/// Error type for encoder invocations.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("no frames to encode in {0}")]
    NoFrames(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One encoder invocation: a numbered image sequence in, a video out.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub frames_dir: &'a Path,
    /// printf-style file pattern, e.g. `rgb_%05d.png`.
    pub pattern: &'a str,
    pub fps: u32,
    /// Index of the first frame to include.
    pub start_number: u32,
    pub output: &'a Path,
}

/// Assembles a frame sequence into a video file.
pub trait VideoEncoder: Send {
    /// Returns `Ok(false)` when the encoding tool is not installed.
    fn encode_video(&self, request: &EncodeRequest<'_>) -> Result<bool, EncodeError>;
}

/// Encoder backed by the `ffmpeg` binary (H.264, yuv420p, faststart).
pub struct FfmpegEncoder {
    binary: String,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Build the ffmpeg argument list for an encode request.
pub fn encode_args(request: &EncodeRequest<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-framerate",
        request.fps.to_string().as_str(),
        "-start_number",
        request.start_number.to_string().as_str(),
        "-pattern_type",
        "sequence",
        "-i",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(request.frames_dir.join(request.pattern).into_os_string());
    args.extend(
        ["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"]
            .iter()
            .map(OsString::from),
    );
    args.push(request.output.as_os_str().to_os_string());
    args
}

impl VideoEncoder for FfmpegEncoder {
    fn encode_video(&self, request: &EncodeRequest<'_>) -> Result<bool, EncodeError> {
        if !request.frames_dir.is_dir() {
            return Err(EncodeError::NoFrames(
                request.frames_dir.to_string_lossy().to_string(),
            ));
        }

        let output = match Command::new(&self.binary).args(encode_args(request)).output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(binary = %self.binary, "ffmpeg not found; keeping image sequence only");
                return Ok(false);
            }
            Err(e) => return Err(EncodeError::IoError(e)),
        };

        if !output.status.success() {
            return Err(EncodeError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        tracing::info!(
            output = %request.output.display(),
            fps = request.fps,
            start_number = request.start_number,
            "Video encoded",
        );
        Ok(true)
    }
}
