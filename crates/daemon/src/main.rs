//! DeviceHub - Main Entry Point
//! Print job and scale monitoring agent

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use devicehub_core::application::{
    JobRouter, Monitor, MonitorSupervisor, PrintJobMonitor, ScaleMonitor,
};
use devicehub_core::domain::Health;
use devicehub_core::DeviceHubConfig;
use devicehub_daemon::{settings, telemetry};
use devicehub_infra_backend::{Endpoint, HttpJobFeed, ScreenConnector};
use devicehub_infra_system::{CupsSpooler, PlatformHidEnumerator};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_DIR_ENV: &str = "DEVICEHUB_LOG_DIR";

/// Upper bound on waiting for monitors to log out and release devices
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Console output (json|pretty) plus an optional daily rolling JSON file
fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format =
        std::env::var("DEVICEHUB_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("devicehub=info"))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) => {
            let dir = shellexpand::tilde(&dir).into_owned();
            let appender = tracing_appender::rolling::daily(dir, "devicehub.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(telemetry::otel_layer::<Registry>())
        .with(env_filter)
        .with(file_layer);

    match log_format.as_str() {
        // Production: JSON structured logging
        "json" => registry.with(fmt::layer().json()).init(),
        // Development: Pretty formatting with colors
        _ => registry.with(fmt::layer().pretty()).init(),
    }
    Ok(guard)
}

/// Wire adapters into the monitors (composition root)
fn build_monitors(config: &DeviceHubConfig) -> Result<Vec<Box<dyn Monitor>>> {
    let endpoint = Endpoint::new(&config.backend);
    let connector = Arc::new(ScreenConnector::new(endpoint.clone()));
    let feed = Arc::new(HttpJobFeed::new(endpoint).context("creating job feed")?);
    let spooler = Arc::new(CupsSpooler::default());

    let printing = PrintJobMonitor::new(
        config,
        connector.clone(),
        feed,
        JobRouter::new(spooler.clone(), spooler),
    );
    let scale = ScaleMonitor::new(
        config,
        connector,
        Arc::new(PlatformHidEnumerator::default()),
    );
    Ok(vec![Box::new(printing) as Box<dyn Monitor>, Box::new(scale)])
}

/// Log health transitions
fn watch_health(supervisor: &MonitorSupervisor) {
    let mut health = supervisor.health();
    tokio::spawn(async move {
        while health.changed().await.is_ok() {
            let current = *health.borrow_and_update();
            match current {
                Health::Green => info!("Agent health: green"),
                Health::Red => warn!("Agent health: red"),
            }
        }
    });
}

async fn reload(supervisor: &mut MonitorSupervisor, path: &Path) {
    info!(path = %path.display(), "Reloading configuration");
    let monitors = match settings::load(path).and_then(|config| build_monitors(&config)) {
        Ok(monitors) => monitors,
        Err(e) => {
            error!(error = ?e, "Configuration reload failed; keeping current monitors");
            return;
        }
    };
    if let Err(e) = supervisor.restart(monitors).await {
        error!(error = %e, "Monitor restart failed");
    }
}

#[cfg(unix)]
async fn run_until_stopped(supervisor: &mut MonitorSupervisor, path: &Path) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate.recv() => break,
            _ = hangup.recv() => reload(supervisor, path).await,
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn run_until_stopped(_supervisor: &mut MonitorSupervisor, _path: &Path) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = init_logging()?;
    info!("DeviceHub v{} starting...", VERSION);

    // 2. Load configuration
    let path = settings::config_path(std::env::args().nth(1));
    info!(path = %path.display(), "Loading configuration");
    let config = settings::load(&path)?;

    // 3. Start monitors
    let mut supervisor = MonitorSupervisor::new();
    watch_health(&supervisor);
    supervisor.start(build_monitors(&config)?)?;

    info!("System ready. Send SIGHUP to reload configuration, Ctrl+C to stop");

    // 4. Serve until a stop signal
    run_until_stopped(&mut supervisor, &path).await?;

    // 5. Graceful shutdown: sessions logged out, devices released
    info!("Shutdown signal received. Stopping monitors...");
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, supervisor.stop())
        .await
        .is_err()
    {
        warn!("Monitors did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }

    info!("Shutdown complete.");
    Ok(())
}
