//! C-Measure control panel - Main Entry Point
//!
//! Runs a headless session against the configured bridge and logs every
//! session event. A graphical front end drives the same `SessionHandle`.

use anyhow::Context;
use cmeasure_rs::{
    backend::{wait_until_healthy, HttpInstrumentApi, InstrumentApi, MockInstrument},
    config::ClientConfig,
    session::{SessionController, SessionEvent, SessionHandle},
};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often the event log drains the session queue
const EVENT_DRAIN_INTERVAL: Duration = Duration::from_millis(100);

fn init_logging(config: &ClientConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cmeasure_rs=debug"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "cmeasure.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn build_api(config: &ClientConfig) -> anyhow::Result<Box<dyn InstrumentApi>> {
    if config.simulate {
        tracing::info!("Simulating {} cells", config.simulated_cells);
        return Ok(Box::new(MockInstrument::new(config.simulated_cells)));
    }
    let api = HttpInstrumentApi::new(&config.backend_url, config.request_timeout())
        .with_context(|| format!("Invalid backend URL {}", config.backend_url))?;
    Ok(Box::new(api))
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Notification(n) => tracing::info!("[{:?}] {}", n.level, n.message),
        SessionEvent::StatusUpdated { summary, .. } => {
            tracing::info!("Cells: {}", summary.headline())
        }
        SessionEvent::PollingChanged(task) => tracing::debug!("Polling: {:?}", task),
        other => tracing::trace!("{:?}", other),
    }
}

async fn log_events(handle: &SessionHandle) {
    let mut interval = tokio::time::interval(EVENT_DRAIN_INTERVAL);
    loop {
        interval.tick().await;
        for event in handle.drain() {
            log_event(&event);
            if matches!(event, SessionEvent::Stopped) {
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::load_or_default().with_env_overrides();
    let _log_guard = init_logging(&config);

    tracing::info!("Starting C-Measure client against {}", config.backend_url);

    let api = build_api(&config)?;
    wait_until_healthy(
        api.as_ref(),
        config.health_retries,
        config.health_retry_delay(),
    )
    .await
    .context("Backend not reachable")?;

    let (controller, handle) = SessionController::new(api, &config);
    let session = tokio::spawn(controller.run());
    handle.start();

    tokio::select! {
        _ = log_events(&handle) => {
            tracing::warn!("Session ended on its own");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            tracing::info!("Shutting down...");
            handle.shutdown();
        }
    }

    session.await.context("Session task panicked")?;
    for event in handle.drain() {
        log_event(&event);
    }
    Ok(())
}
