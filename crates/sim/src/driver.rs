//! The simulation driver loop.
//!
//! Runs on the thread that owns the host. Each tick takes at most one job
//! from the inbox, executes it to completion, publishes its result, and then
//! advances the host by one frame whether or not a job ran.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use simgate_core::job::{JobDescriptor, JobPayload, JobResult};
use simgate_core::queue::JobInbox;
use simgate_core::results::ResultTable;
use simgate_core::types::JobId;

use crate::config::{CaptureConfig, SimulationConfig};
use crate::convert::{AssetConverter, CommandConverter, LocalAssetConverter};
use crate::error::{HostError, SimError};
use crate::ffmpeg::{FfmpegEncoder, VideoEncoder};
use crate::host::{CaptureDevice, SimulationHost};
use crate::{protocol, scene};

/// The host plus the state that must outlive individual jobs.
pub struct SimulationContext<H> {
    pub host: H,
    capture_device: Option<CaptureDevice>,
}

impl<H: SimulationHost> SimulationContext<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            capture_device: None,
        }
    }

    pub fn capture_device(&self) -> Option<&CaptureDevice> {
        self.capture_device.as_ref()
    }

    /// Return the capture device, creating it on first use.
    pub fn provision_capture_device(
        &mut self,
        config: &CaptureConfig,
    ) -> Result<CaptureDevice, HostError> {
        if let Some(device) = &self.capture_device {
            return Ok(device.clone());
        }
        let device = self
            .host
            .create_capture_device(scene::CAPTURE_DEVICE_PATH, config)?;
        tracing::info!(
            path = %device.path,
            width = device.width,
            height = device.height,
            "Capture device created",
        );
        self.capture_device = Some(device.clone());
        Ok(device)
    }

    pub fn into_host(self) -> H {
        self.host
    }
}

pub struct SimulationDriver<H> {
    context: SimulationContext<H>,
    inbox: JobInbox,
    results: Arc<ResultTable>,
    converter: Box<dyn AssetConverter>,
    encoder: Box<dyn VideoEncoder>,
    config: SimulationConfig,
    shutdown: Arc<AtomicBool>,
    ticks: u64,
    jobs_processed: u64,
}

impl<H: SimulationHost> SimulationDriver<H> {
    /// Build a driver with the converter and encoder selected by `config`.
    pub fn new(
        host: H,
        inbox: JobInbox,
        results: Arc<ResultTable>,
        config: SimulationConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let converter: Box<dyn AssetConverter> = match &config.converter_cmd {
            Some(cmd) => Box::new(CommandConverter::new(cmd, &config.collision_approximation)),
            None => Box::new(LocalAssetConverter::new(&config.collision_approximation)),
        };
        let encoder = Box::new(FfmpegEncoder::new(&config.ffmpeg_bin));
        Self {
            context: SimulationContext::new(host),
            inbox,
            results,
            converter,
            encoder,
            config,
            shutdown,
            ticks: 0,
            jobs_processed: 0,
        }
    }

    pub fn with_encoder(mut self, encoder: impl VideoEncoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn context(&self) -> &SimulationContext<H> {
        &self.context
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn jobs_processed(&self) -> u64 {
        self.jobs_processed
    }

    fn should_stop(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed) || !self.context.host.is_running()
    }

    /// Loop until shutdown is requested or the host stops, then hand the
    /// context back.
    pub fn run(mut self) -> SimulationContext<H> {
        tracing::info!(
            heartbeat_ticks = self.config.heartbeat_ticks,
            "Simulation driver started",
        );

        while !self.should_stop() {
            if self.run_once().is_none() {
                std::thread::sleep(self.config.idle_sleep);
            }
        }

        tracing::info!(
            ticks = self.ticks,
            jobs = self.jobs_processed,
            pending = self.inbox.depth(),
            "Simulation driver stopped",
        );
        self.context
    }

    /// One driver tick. Returns the id of the job executed, if any.
    pub fn run_once(&mut self) -> Option<JobId> {
        let executed = self.inbox.try_dequeue().map(|job| {
            let id = job.id;
            self.execute(job);
            id
        });

        if let Err(e) = self.context.host.update() {
            tracing::warn!(error = %e, "Host update failed");
        }

        self.ticks += 1;
        if self.ticks % self.config.heartbeat_ticks.max(1) == 0 {
            tracing::info!(
                ticks = self.ticks,
                jobs = self.jobs_processed,
                queue_depth = self.inbox.depth(),
                pending_results = self.results.len(),
                "Simulation heartbeat",
            );
        }

        executed
    }

    fn execute(&mut self, job: JobDescriptor) {
        let id = job.id;
        let kind = job.kind();
        let started = Instant::now();
        let queued_ms = (Utc::now() - job.submitted_at).num_milliseconds();
        tracing::info!(job_id = %id, %kind, queued_ms, "Job started");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            dispatch(
                &mut self.context,
                self.converter.as_ref(),
                self.encoder.as_ref(),
                &self.config,
                &job,
            )
        }));

        let result = match outcome {
            Ok(Ok(result)) => {
                tracing::info!(
                    job_id = %id,
                    %kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed",
                );
                result
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = %id, %kind, error = %e, "Job failed");
                JobResult::failed(id, e.to_string())
            }
            Err(payload) => {
                let e = SimError::Panicked(panic_message(payload.as_ref()));
                tracing::error!(job_id = %id, %kind, error = %e, "Job panicked");
                scene::cleanup(&mut self.context.host);
                JobResult::failed(id, e.to_string())
            }
        };

        self.jobs_processed += 1;
        if let Err(e) = self.results.publish(id, result) {
            tracing::error!(job_id = %id, error = %e, "Failed to publish job result");
        }
    }
}

fn dispatch<H: SimulationHost>(
    context: &mut SimulationContext<H>,
    converter: &dyn AssetConverter,
    encoder: &dyn VideoEncoder,
    config: &SimulationConfig,
    job: &JobDescriptor,
) -> Result<JobResult, SimError> {
    match &job.payload {
        JobPayload::Convert(p) => {
            let dir =
                converter.convert_asset(&p.source_asset_path, &p.destination_directory, p.mass)?;
            Ok(JobResult::converted(job.id, dir))
        }
        JobPayload::Simulate(p) => {
            let summary = protocol::run_simulation(context, encoder, config, job.id, p)?;
            Ok(JobResult::simulated(job.id, summary))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
