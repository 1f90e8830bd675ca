//! The simulate job, start to finish.
//!
//! Steps run in a fixed order: teardown, settle, capture-device provisioning,
//! build, launch, stepped capture, encode. Transient scene content is removed
//! afterwards whether or not any step failed.

use std::path::PathBuf;

use simgate_core::job::{SimulatePayload, SimulationSummary};
use simgate_core::types::JobId;

use crate::capture::{effective_skip, video_file_name, StagingDir, FRAME_PATTERN};
use crate::config::SimulationConfig;
use crate::driver::SimulationContext;
use crate::error::SimError;
use crate::ffmpeg::{EncodeRequest, VideoEncoder};
use crate::host::SimulationHost;
use crate::scene;

/// Run one simulate job against the context's scene.
pub fn run_simulation<H: SimulationHost>(
    ctx: &mut SimulationContext<H>,
    encoder: &dyn VideoEncoder,
    config: &SimulationConfig,
    job_id: JobId,
    payload: &SimulatePayload,
) -> Result<SimulationSummary, SimError> {
    let outcome = simulate(ctx, encoder, config, job_id, payload);
    scene::cleanup(&mut ctx.host);
    outcome
}

fn simulate<H: SimulationHost>(
    ctx: &mut SimulationContext<H>,
    encoder: &dyn VideoEncoder,
    config: &SimulationConfig,
    job_id: JobId,
    payload: &SimulatePayload,
) -> Result<SimulationSummary, SimError> {
    scene::teardown(&mut ctx.host)?;
    scene::settle(&mut ctx.host, config.settle_steps)?;

    let device = ctx.provision_capture_device(&config.capture)?;

    scene::build(
        &mut ctx.host,
        config,
        &payload.asset_path,
        payload.scale_factor,
    )?;
    scene::launch(&mut ctx.host, config)?;

    let steps = payload.frame_count.max(1);
    let every_n = config.capture_every_n.max(1);

    // Staged frames are removed on every early return below; only the
    // missing-encoder path keeps them.
    let staging = if payload.render_video {
        std::fs::create_dir_all(&payload.output_directory)?;
        Some(StagingDir::prepare(&payload.output_directory, job_id)?)
    } else {
        None
    };

    let mut captured: u32 = 0;
    for step in 0..steps {
        ctx.host.step_physics()?;
        let Some(staging) = &staging else {
            continue;
        };
        // The last step is always captured so a run never ends with no frames.
        if step % every_n == 0 || (captured == 0 && step + 1 == steps) {
            ctx.host.update()?;
            ctx.host
                .capture_frame(&device, &staging.frame_path(captured))?;
            captured += 1;
        }
    }

    tracing::info!(%job_id, steps, captured, "Simulation stepped");

    let mut summary = SimulationSummary {
        frame_count: steps,
        frames_captured: captured,
        video_path: None,
        frames_directory: None,
        duration_secs: None,
    };

    let Some(staging) = staging else {
        return Ok(summary);
    };

    let skip = effective_skip(config.skip_first_frames, captured);
    let video_path: PathBuf = payload
        .output_directory
        .join(video_file_name(&config.video_file_name, job_id));
    let encoded = encoder.encode_video(&EncodeRequest {
        frames_dir: staging.path(),
        pattern: FRAME_PATTERN,
        fps: payload.frames_per_second,
        start_number: skip,
        output: &video_path,
    });

    match encoded {
        Ok(true) => {
            if let Err(e) = staging.remove() {
                tracing::warn!(%job_id, error = %e, "Failed to remove staged frames");
            }
            summary.video_path = Some(video_path);
            summary.duration_secs =
                Some(f64::from(captured - skip) / f64::from(payload.frames_per_second));
        }
        Ok(false) => {
            summary.frames_directory = Some(staging.into_path());
        }
        Err(e) => {
            if let Err(rm) = staging.remove() {
                tracing::warn!(%job_id, error = %rm, "Failed to remove staged frames");
            }
            return Err(e.into());
        }
    }

    Ok(summary)
}
