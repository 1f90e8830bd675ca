//! Job descriptors, job results, and inbound request validation.
//!
//! A [`JobDescriptor`] is created by the gateway, consumed exactly once by
//! the simulation driver, and answered with exactly one [`JobResult`].

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{new_job_id, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Mass assigned to a converted asset when the request omits it.
pub const DEFAULT_MASS_KG: f64 = 1.0;

/// Number of simulation steps when the request omits `frame_count`.
pub const DEFAULT_FRAME_COUNT: u32 = 200;

/// Playback rate when the request omits `frames_per_second`.
pub const DEFAULT_FPS: u32 = 50;

/// Upper bound on steps per simulate job.
pub const MAX_FRAME_COUNT: u32 = 100_000;

/// Upper bound on playback rate.
pub const MAX_FPS: u32 = 240;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Discriminant of a job, used for timeouts and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Convert,
    Simulate,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convert => f.write_str("convert"),
            Self::Simulate => f.write_str("simulate"),
        }
    }
}

/// Parameters of an asset conversion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertPayload {
    pub source_asset_path: PathBuf,
    pub destination_directory: PathBuf,
    pub mass: f64,
}

/// Parameters of a scene simulation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatePayload {
    pub asset_path: PathBuf,
    pub output_directory: PathBuf,
    pub render_video: bool,
    pub frame_count: u32,
    pub frames_per_second: u32,
    pub scale_factor: f64,
}

/// Kind-specific job parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Convert(ConvertPayload),
    Simulate(SimulatePayload),
}

/// An immutable unit of work handed from the gateway to the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub payload: JobPayload,
    /// When the gateway accepted the request.
    pub submitted_at: Timestamp,
}

impl JobDescriptor {
    /// Wrap a payload in a descriptor with a freshly minted id.
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: new_job_id(),
            payload,
            submitted_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self.payload {
            JobPayload::Convert(_) => JobKind::Convert,
            JobPayload::Simulate(_) => JobKind::Simulate,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Terminal state of a job as observed by its waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed,
    #[serde(rename = "timeout")]
    TimedOut,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
            Self::TimedOut => f.write_str("timeout"),
        }
    }
}

/// Outcome of a completed simulate job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    /// Number of simulation steps executed.
    pub frame_count: u32,
    /// Number of frames written to the staging directory.
    pub frames_captured: u32,
    /// Encoded video, when the encoder ran.
    pub video_path: Option<PathBuf>,
    /// Staged frames left on disk because no encoder was available.
    pub frames_directory: Option<PathBuf>,
    /// Playback duration of the encoded video.
    pub duration_secs: Option<f64>,
}

/// Status-specific result fields. Only the fields relevant to the status
/// and job kind are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_captured: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The single answer to a [`JobDescriptor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub id: JobId,
    pub status: JobStatus,
    pub data: ResultData,
}

impl JobResult {
    pub fn converted(id: JobId, destination_directory: PathBuf) -> Self {
        Self {
            id,
            status: JobStatus::Completed,
            data: ResultData {
                destination_directory: Some(destination_directory),
                ..ResultData::default()
            },
        }
    }

    pub fn simulated(id: JobId, summary: SimulationSummary) -> Self {
        Self {
            id,
            status: JobStatus::Completed,
            data: ResultData {
                frame_count: Some(summary.frame_count),
                frames_captured: Some(summary.frames_captured),
                video_path: summary.video_path,
                frames_directory: summary.frames_directory,
                duration_secs: summary.duration_secs,
                ..ResultData::default()
            },
        }
    }

    pub fn failed(id: JobId, error: impl Into<String>) -> Self {
        Self {
            id,
            status: JobStatus::Failed,
            data: ResultData {
                error: Some(error.into()),
                ..ResultData::default()
            },
        }
    }

    pub fn timed_out(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::TimedOut,
            data: ResultData::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound requests
// ---------------------------------------------------------------------------

/// Body of a conversion request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitConversion {
    pub source_asset_path: Option<String>,
    pub destination_directory: Option<String>,
    pub mass: Option<f64>,
}

impl SubmitConversion {
    /// Check every field and produce a validated payload.
    pub fn into_payload(self) -> Result<ConvertPayload, CoreError> {
        let source = required_path("source_asset_path", self.source_asset_path)?;
        let destination = required_path("destination_directory", self.destination_directory)?;
        let mass = self.mass.unwrap_or(DEFAULT_MASS_KG);
        validate_positive_finite("mass", mass)?;

        Ok(ConvertPayload {
            source_asset_path: source,
            destination_directory: destination,
            mass,
        })
    }
}

/// Body of a simulation request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitSimulation {
    pub asset_path: Option<String>,
    pub output_directory: Option<String>,
    pub render_video: Option<bool>,
    pub frame_count: Option<i64>,
    pub frames_per_second: Option<i64>,
    pub scale_factor: Option<f64>,
}

impl SubmitSimulation {
    /// Check every field and produce a validated payload.
    pub fn into_payload(self) -> Result<SimulatePayload, CoreError> {
        let asset_path = required_path("asset_path", self.asset_path)?;
        let output_directory = required_path("output_directory", self.output_directory)?;
        let frame_count = validate_count_range(
            "frame_count",
            self.frame_count.unwrap_or(i64::from(DEFAULT_FRAME_COUNT)),
            1,
            MAX_FRAME_COUNT,
        )?;
        let frames_per_second = validate_count_range(
            "frames_per_second",
            self.frames_per_second.unwrap_or(i64::from(DEFAULT_FPS)),
            1,
            MAX_FPS,
        )?;
        let scale_factor = self.scale_factor.unwrap_or(1.0);
        validate_positive_finite("scale_factor", scale_factor)?;

        Ok(SimulatePayload {
            asset_path,
            output_directory,
            render_video: self.render_video.unwrap_or(true),
            frame_count,
            frames_per_second,
            scale_factor,
        })
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn required_path(field: &str, value: Option<String>) -> Result<PathBuf, CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(PathBuf::from(v.trim())),
        Some(_) => Err(CoreError::Validation(format!("{field} must not be empty"))),
        None => Err(CoreError::Validation(format!("{field} is required"))),
    }
}

fn validate_positive_finite(field: &str, value: f64) -> Result<(), CoreError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be a positive number, got {value}"
        )))
    }
}

fn validate_count_range(field: &str, value: i64, min: u32, max: u32) -> Result<u32, CoreError> {
    if value < i64::from(min) || value > i64::from(max) {
        return Err(CoreError::Validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )));
    }
    // Range-checked above.
    Ok(value as u32)
}
