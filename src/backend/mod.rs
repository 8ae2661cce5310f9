//! Backend module: the seam between the session and the instrument bridge
//!
//! The bridge is an HTTP service that relays to the physical sensors. The
//! session never talks to it directly; every request goes through the
//! [`InstrumentApi`] trait so that the same controller can run against the
//! real bridge, the in-memory simulator, or a mock in tests.
//!
//! # Components
//!
//! - [`InstrumentApi`] - Async trait covering every bridge endpoint
//! - [`HttpInstrumentApi`] - reqwest implementation against a base URL
//! - [`MockInstrument`] - Scripted in-memory instrument, used for simulation
//!   mode and scenario tests
//!
//! # Example
//!
//! ```ignore
//! use cmeasure_rs::backend::{HttpInstrumentApi, InstrumentApi};
//! use std::time::Duration;
//!
//! let api = HttpInstrumentApi::new("http://127.0.0.1:8123/", Duration::from_secs(5))?;
//! let report = api.status().await?;
//! println!("{} cells", report.statuses.len());
//! ```

pub mod http_api;
pub mod mock_api;

pub use http_api::HttpInstrumentApi;
pub use mock_api::{Endpoint, MockInstrument};

use crate::error::{PanelError, Result};
use crate::types::{
    CalibrationImport, CalibrationImportReply, CalibrationRow, ComparisonReply, ConnectReply,
    Measurement, SavedMeasurement, Settings, SettingsUpdate, SingleReportReply, StatusReport,
    SystemInfo, WifiCredentials, WifiNetwork,
};
use async_trait::async_trait;
use std::time::Duration;

/// Every operation the bridge exposes
///
/// Implementations must be cheap to call repeatedly; polling loops invoke
/// `status` and `measurements` every second or two for the lifetime of a
/// session. Failures are reported as [`crate::error::PanelError`] and never
/// retried here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstrumentApi: Send + Sync {
    /// Liveness probe
    async fn health(&self) -> Result<()>;

    /// Per-cell statuses, bridge reachability and calibration presence
    async fn status(&self) -> Result<StatusReport>;

    /// Latest reading of every cell
    async fn measurements(&self) -> Result<Vec<Measurement>>;

    /// Record the current readings as a test file
    async fn save_measurement(&self, name: Option<String>) -> Result<SavedMeasurement>;

    /// Ask the bridge to attach to the cells
    async fn connect(&self) -> Result<ConnectReply>;

    /// Detach from the cells
    async fn disconnect(&self) -> Result<ConnectReply>;

    /// Tare the current readings
    async fn zero(&self) -> Result<()>;

    async fn calibration(&self) -> Result<Vec<CalibrationRow>>;

    /// Replace the full calibration table
    async fn save_calibration(&self, rows: &[CalibrationRow]) -> Result<Vec<CalibrationRow>>;

    /// Measure and store zero offsets for every cell
    async fn calibrate_zero(&self) -> Result<Vec<CalibrationRow>>;

    /// Derive the gain of one cell from a reference weight
    async fn calibrate_gain(&self, cell: usize, weight: f64) -> Result<Vec<CalibrationRow>>;

    /// Import a calibration file; may ask for confirmation
    async fn import_calibration(
        &self,
        request: &CalibrationImport,
    ) -> Result<CalibrationImportReply>;

    /// Current calibration file as CSV text
    async fn export_calibration(&self) -> Result<String>;

    async fn settings(&self) -> Result<Settings>;

    async fn save_settings(&self, update: &SettingsUpdate) -> Result<Settings>;

    async fn system_info(&self) -> Result<SystemInfo>;

    async fn set_serial(&self, serial: &str) -> Result<SystemInfo>;

    /// Store the Wi-Fi credentials the system should join
    async fn set_system_wifi(&self, credentials: &WifiCredentials) -> Result<SystemInfo>;

    /// Networks visible to the hub, strongest first
    async fn wifi_networks(&self) -> Result<Vec<WifiNetwork>>;

    /// Join a Wi-Fi network now
    async fn connect_wifi(&self, credentials: &WifiCredentials) -> Result<()>;

    /// Identifiers of saved test files
    async fn saved_tests(&self) -> Result<Vec<String>>;

    /// Read two saved tests for comparison
    async fn compare_reports(&self, file_a: &str, file_b: &str) -> Result<ComparisonReply>;

    /// Read one saved test
    async fn single_report(&self, file: &str) -> Result<SingleReportReply>;
}

/// Probe `health` until it answers, at most `retries` times
///
/// Sleeps `delay` between probes. Gives up with [`PanelError::Startup`].
pub async fn wait_until_healthy(
    api: &dyn InstrumentApi,
    retries: u32,
    delay: Duration,
) -> Result<()> {
    let attempts = retries.max(1);
    for attempt in 1..=attempts {
        match api.health().await {
            Ok(()) => {
                tracing::info!("Backend healthy after {} probe(s)", attempt);
                return Ok(());
            }
            Err(err) => {
                tracing::debug!("Health probe {}/{} failed: {}", attempt, attempts, err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(PanelError::Startup(format!(
        "Backend did not become healthy after {} attempts",
        attempts
    )))
}
