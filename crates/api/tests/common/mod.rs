#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use simgate_api::config::ServerConfig;
use simgate_api::router::build_app_router;
use simgate_api::state::AppState;
use simgate_core::queue::{job_queue, JobInbox};
use simgate_core::results::ResultTable;
use simgate_sim::config::{CaptureConfig, PyramidConfig, SimulationConfig};
use simgate_sim::driver::{SimulationContext, SimulationDriver};
use simgate_sim::ffmpeg::{EncodeError, EncodeRequest, VideoEncoder};
use simgate_sim::headless::HeadlessHost;

/// Build a test `ServerConfig` with safe defaults and short timeouts.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        convert_timeout_secs: 10,
        simulate_timeout_secs: 30,
        ..ServerConfig::default()
    }
}

/// Simulation config with a tiny capture resolution and pyramid.
pub fn test_sim_config() -> SimulationConfig {
    SimulationConfig {
        pyramid: PyramidConfig {
            levels: 3,
            ..PyramidConfig::default()
        },
        capture: CaptureConfig {
            width: 64,
            height: 36,
            ..CaptureConfig::default()
        },
        idle_sleep: Duration::from_millis(1),
        ..SimulationConfig::default()
    }
}

/// Encoder that writes an empty output file instead of running ffmpeg.
pub struct TouchEncoder;

impl VideoEncoder for TouchEncoder {
    fn encode_video(&self, request: &EncodeRequest<'_>) -> Result<bool, EncodeError> {
        std::fs::write(request.output, b"")?;
        Ok(true)
    }
}

/// The application router plus the simulation thread behind it.
pub struct TestApp {
    pub app: Router,
    pub results: Arc<ResultTable>,
    shutdown: Arc<AtomicBool>,
    driver: Option<JoinHandle<SimulationContext<HeadlessHost>>>,
    /// Held when no driver runs, so enqueues still succeed.
    idle_inbox: Option<JobInbox>,
}

impl TestApp {
    /// Stop the driver thread and return its simulation context.
    pub fn stop(&mut self) -> Option<SimulationContext<HeadlessHost>> {
        self.shutdown.store(true, Ordering::Relaxed);
        self.driver.take().map(|handle| handle.join().unwrap())
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Build the full application router with all middleware layers.
///
/// With `run_driver`, a headless simulation driver runs on its own thread;
/// without it, jobs are accepted but never processed.
pub fn build_test_app(config: ServerConfig, run_driver: bool) -> TestApp {
    let (queue, inbox) = job_queue(config.queue_warn_depth);
    let results = Arc::new(ResultTable::new(config.result_table_warn_size));
    let shutdown = Arc::new(AtomicBool::new(false));

    let state = AppState {
        queue,
        results: Arc::clone(&results),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    let (driver, idle_inbox) = if run_driver {
        let sim_config = test_sim_config();
        let driver = SimulationDriver::new(
            HeadlessHost::new(sim_config.physics_dt),
            inbox,
            Arc::clone(&results),
            sim_config,
            Arc::clone(&shutdown),
        )
        .with_encoder(TouchEncoder);
        (Some(std::thread::spawn(move || driver.run())), None)
    } else {
        (None, Some(inbox))
    };

    TestApp {
        app,
        results,
        shutdown,
        driver,
        idle_inbox,
    }
}

/// Write a small mesh file the headless host can load.
pub fn write_asset(dir: &Path) -> PathBuf {
    let asset = dir.join("pen.obj");
    std::fs::write(&asset, b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
    asset
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
