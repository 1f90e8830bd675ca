use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simgate_api::background::result_eviction;
use simgate_api::config::ServerConfig;
use simgate_api::router::build_app_router;
use simgate_api::state::AppState;
use simgate_core::queue::job_queue;
use simgate_core::results::ResultTable;
use simgate_sim::config::SimulationConfig;
use simgate_sim::driver::SimulationDriver;
use simgate_sim::headless::HeadlessHost;

/// How long to wait for the HTTP server and background tasks after the
/// driver loop exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The simulation host must be driven from the process main thread, so the
/// async runtime is built by hand and the HTTP side runs on its workers while
/// `main` runs the driver loop.
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "simgate_api=debug,simgate_sim=debug,simgate_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let sim_config = SimulationConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        convert_timeout_secs = config.convert_timeout_secs,
        simulate_timeout_secs = config.simulate_timeout_secs,
        "Loaded server configuration"
    );

    // --- Broker ---
    let (queue, inbox) = job_queue(config.queue_warn_depth);
    let results = Arc::new(ResultTable::new(config.result_table_warn_size));
    let shutdown = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("simgate-http")
        .build()
        .context("failed to build async runtime")?;

    // --- Background tasks ---
    let eviction_handle = runtime.spawn(result_eviction::run(
        Arc::clone(&results),
        Duration::from_secs(config.result_retention_secs),
        Duration::from_secs(config.eviction_interval_secs),
        cancel.clone(),
    ));

    let signal_handle = runtime.spawn({
        let shutdown = Arc::clone(&shutdown);
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                () = shutdown_signal() => {}
                () = cancel.cancelled() => return,
            }
            shutdown.store(true, Ordering::Relaxed);
            cancel.cancel();
        }
    });

    // --- Router ---
    let state = AppState {
        queue,
        results: Arc::clone(&results),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("invalid HOST address: {}", config.host))?,
        config.port,
    );
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind(addr))
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    let server_handle = runtime.spawn({
        let cancel = cancel.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
        }
    });

    // --- Simulation driver (main thread) ---
    let driver = SimulationDriver::new(
        HeadlessHost::new(sim_config.physics_dt),
        inbox,
        Arc::clone(&results),
        sim_config,
        Arc::clone(&shutdown),
    );
    let context = driver.run();
    tracing::info!(
        capture_device = context.capture_device().is_some(),
        "Simulation context released"
    );

    // --- Post-shutdown cleanup ---
    cancel.cancel();
    runtime.block_on(async {
        match tokio::time::timeout(SHUTDOWN_GRACE, server_handle).await {
            Ok(Ok(Ok(()))) => tracing::info!("Server stopped"),
            Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server error"),
            Ok(Err(e)) => tracing::error!(error = %e, "Server task failed"),
            Err(_) => tracing::warn!("Server did not drain in time, dropping connections"),
        }
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, eviction_handle).await;
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, signal_handle).await;
    });
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
