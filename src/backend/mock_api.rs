//! In-memory instrument for simulation and testing
//!
//! [`MockInstrument`] behaves like a small bridge with a fixed number of
//! cells. It is used by the host binary when simulation is enabled and by
//! scenario tests, which can script its responses and inject failures.
//!
//! # Features
//!
//! - **Connect sequencing**: after `connect`, cells report `Connecting` for a
//!   configurable number of status polls before turning `Connected`
//! - **Calibration math**: zero uses the current raw values as offsets; gain
//!   is `weight / (raw - offset)`
//! - **Saved tests**: `save_measurement` stores the current values under a
//!   generated file name so reports can be compared later
//! - **Failure injection**: any [`Endpoint`] can be made to fail with a 503
//! - **Call counting**: per-endpoint counters for assertions
//!
//! Clones share state, so a test can keep one clone while the controller
//! owns another.
//!
//! # Example
//!
//! ```ignore
//! use cmeasure_rs::backend::{Endpoint, MockInstrument};
//!
//! let instrument = MockInstrument::connected(3).with_values(&[10.1, 9.8, 10.0]);
//! instrument.fail(Endpoint::Measurements);
//! let (controller, handle) = SessionController::new(Box::new(instrument.clone()), config);
//! assert_eq!(instrument.calls(Endpoint::Measurements), 0);
//! ```

use super::InstrumentApi;
use crate::error::{ConfirmReason, PanelError, Result};
use crate::types::{
    BridgeStatus, CalibrationImport, CalibrationImportReply, CalibrationRow, CellStatus,
    ComparisonReply, ConnectReply, Measurement, SavedMeasurement, Settings, SettingsUpdate,
    SingleReportReply, StatusReport, SystemInfo, WifiCredentials, WifiNetwork,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Bridge endpoints, used for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    Status,
    Measurements,
    SaveMeasurement,
    Connect,
    Disconnect,
    Zero,
    Calibration,
    SaveCalibration,
    CalibrateZero,
    CalibrateGain,
    ImportCalibration,
    ExportCalibration,
    Settings,
    SaveSettings,
    System,
    SetSerial,
    SetSystemWifi,
    WifiNetworks,
    ConnectWifi,
    SavedTests,
    CompareReports,
    SingleReport,
}

impl Endpoint {
    /// Path of the endpoint on the real bridge
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Health => "/api/health",
            Endpoint::Status => "/api/status",
            Endpoint::Measurements | Endpoint::SaveMeasurement => "/api/measurements",
            Endpoint::Connect => "/api/connect",
            Endpoint::Disconnect => "/api/disconnect",
            Endpoint::Zero => "/api/zero",
            Endpoint::Calibration | Endpoint::SaveCalibration => "/api/calibration",
            Endpoint::CalibrateZero => "/api/calibration/zero",
            Endpoint::CalibrateGain => "/api/calibration/gain",
            Endpoint::ImportCalibration => "/api/calibration/import",
            Endpoint::ExportCalibration => "/api/calibration/export",
            Endpoint::Settings | Endpoint::SaveSettings => "/api/settings",
            Endpoint::System => "/api/system",
            Endpoint::SetSerial => "/api/system/serial",
            Endpoint::SetSystemWifi => "/api/system/wifi",
            Endpoint::WifiNetworks => "/api/wifi/networks",
            Endpoint::ConnectWifi => "/api/wifi/connect",
            Endpoint::SavedTests => "/api/tests",
            Endpoint::CompareReports => "/api/reports/compare",
            Endpoint::SingleReport => "/api/reports/single",
        }
    }
}

#[derive(Debug)]
struct MockState {
    statuses: Vec<CellStatus>,
    /// Scripted status responses, consumed before `statuses`
    status_script: VecDeque<Vec<String>>,
    /// Status polls left before connecting cells turn connected
    connecting_polls: usize,
    connect_delay: usize,
    bridge: BridgeStatus,
    calibration_missing: bool,
    values: Vec<f64>,
    raw: Vec<f64>,
    calibration: Vec<CalibrationRow>,
    settings: Settings,
    system: SystemInfo,
    networks: Vec<WifiNetwork>,
    tests: Vec<String>,
    test_data: HashMap<String, Vec<f64>>,
    next_test: usize,
    import_confirm: Option<ConfirmReason>,
    failing: HashSet<Endpoint>,
    calls: HashMap<Endpoint, usize>,
}

/// Scripted in-memory instrument
#[derive(Debug, Clone)]
pub struct MockInstrument {
    state: Arc<Mutex<MockState>>,
}

impl MockInstrument {
    /// Create an instrument with `cells` disconnected cells
    pub fn new(cells: usize) -> Self {
        let state = MockState {
            statuses: vec![CellStatus::Disconnected; cells],
            status_script: VecDeque::new(),
            connecting_polls: 0,
            connect_delay: 2,
            bridge: BridgeStatus {
                reachable: true,
                simulated: true,
                host: None,
                port: None,
            },
            calibration_missing: false,
            values: (0..cells).map(|i| 10.0 + i as f64 * 0.5).collect(),
            raw: (0..cells).map(|i| 1000.0 + i as f64 * 10.0).collect(),
            calibration: (0..cells).map(|i| CalibrationRow::new(i, 0.0, 1.0)).collect(),
            settings: Settings {
                data_dir: "backend/data".to_string(),
                plot_max_x: None,
                simulate: true,
            },
            system: SystemInfo {
                system_serial: Some("SIM-0001".to_string()),
                ..Default::default()
            },
            networks: Vec::new(),
            tests: Vec::new(),
            test_data: HashMap::new(),
            next_test: 1,
            import_confirm: None,
            failing: HashSet::new(),
            calls: HashMap::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Create an instrument whose cells are already connected
    pub fn connected(cells: usize) -> Self {
        let instrument = Self::new(cells);
        instrument.lock().statuses = vec![CellStatus::Connected; cells];
        instrument
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set calibrated values, one per cell
    pub fn with_values(self, values: &[f64]) -> Self {
        self.set_values(values);
        self
    }

    /// Number of status polls a connect takes to settle
    pub fn with_connect_delay(self, polls: usize) -> Self {
        self.lock().connect_delay = polls;
        self
    }

    /// Report real hardware rather than simulation
    pub fn with_bridge(self, bridge: BridgeStatus) -> Self {
        self.lock().bridge = bridge;
        self
    }

    pub fn set_values(&self, values: &[f64]) {
        self.lock().values = values.to_vec();
    }

    pub fn set_raw(&self, raw: &[f64]) {
        self.lock().raw = raw.to_vec();
    }

    pub fn set_statuses(&self, statuses: &[CellStatus]) {
        self.lock().statuses = statuses.to_vec();
    }

    /// Queue raw status strings returned by the next status polls
    pub fn script_statuses(&self, statuses: &[&str]) {
        self.lock()
            .status_script
            .push_back(statuses.iter().map(|s| s.to_string()).collect());
    }

    pub fn set_calibration_missing(&self, missing: bool) {
        self.lock().calibration_missing = missing;
    }

    pub fn set_calibration(&self, rows: Vec<CalibrationRow>) {
        self.lock().calibration = rows;
    }

    pub fn set_networks(&self, networks: Vec<WifiNetwork>) {
        self.lock().networks = networks;
    }

    /// Add a saved test with the given readings
    pub fn add_test(&self, file: &str, values: &[f64]) {
        let mut state = self.lock();
        state.tests.push(file.to_string());
        state.test_data.insert(file.to_string(), values.to_vec());
    }

    /// Make the next imports ask for confirmation unless forced
    pub fn require_import_confirm(&self, reason: Option<ConfirmReason>) {
        self.lock().import_confirm = reason;
    }

    /// Make an endpoint fail with a 503 until [`MockInstrument::recover`]
    pub fn fail(&self, endpoint: Endpoint) {
        self.lock().failing.insert(endpoint);
    }

    pub fn recover(&self, endpoint: Endpoint) {
        self.lock().failing.remove(&endpoint);
    }

    /// Number of calls made to an endpoint
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.get(&endpoint).copied().unwrap_or(0)
    }

    /// Total number of calls to any endpoint
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn calibration_rows(&self) -> Vec<CalibrationRow> {
        self.lock().calibration.clone()
    }

    pub fn settings_snapshot(&self) -> Settings {
        self.lock().settings.clone()
    }

    pub fn system_snapshot(&self) -> SystemInfo {
        self.lock().system.clone()
    }

    /// Count the call and fail if the endpoint is broken
    fn enter(&self, endpoint: Endpoint) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        *state.calls.entry(endpoint).or_insert(0) += 1;
        if state.failing.contains(&endpoint) {
            return Err(PanelError::HttpStatus {
                path: endpoint.path().to_string(),
                status: 503,
            });
        }
        Ok(state)
    }

    fn bad_request(endpoint: Endpoint) -> PanelError {
        PanelError::HttpStatus {
            path: endpoint.path().to_string(),
            status: 400,
        }
    }
}

impl MockState {
    fn status_strings(&self) -> Vec<String> {
        self.statuses.iter().map(|s| s.as_str().to_string()).collect()
    }

    fn advance_connect(&mut self) {
        if self.connecting_polls > 0 {
            self.connecting_polls -= 1;
            if self.connecting_polls == 0 {
                for status in self.statuses.iter_mut() {
                    if *status == CellStatus::Connecting {
                        *status = CellStatus::Connected;
                    }
                }
            }
        }
    }

    fn offline(&self) -> bool {
        self.bridge.is_offline()
    }
}

#[async_trait]
impl InstrumentApi for MockInstrument {
    async fn health(&self) -> Result<()> {
        self.enter(Endpoint::Health)?;
        Ok(())
    }

    async fn status(&self) -> Result<StatusReport> {
        let mut state = self.enter(Endpoint::Status)?;
        let statuses = match state.status_script.pop_front() {
            Some(scripted) => scripted,
            None => {
                state.advance_connect();
                if state.offline() {
                    vec![CellStatus::Disconnected.as_str().to_string(); state.statuses.len()]
                } else {
                    state.status_strings()
                }
            }
        };
        Ok(StatusReport {
            statuses,
            bridge: Some(state.bridge.clone()),
            calibration_missing: state.calibration_missing,
        })
    }

    async fn measurements(&self) -> Result<Vec<Measurement>> {
        let state = self.enter(Endpoint::Measurements)?;
        let offline = state.offline();
        Ok(state
            .values
            .iter()
            .enumerate()
            .map(|(idx, &value)| {
                let status = if offline {
                    CellStatus::Disconnected
                } else {
                    state.statuses.get(idx).copied().unwrap_or_default()
                };
                let mut measurement = Measurement::new(idx, value).with_status(status);
                measurement.raw_value = state.raw.get(idx).copied();
                measurement.unit = Some("N".to_string());
                measurement
            })
            .collect())
    }

    async fn save_measurement(&self, name: Option<String>) -> Result<SavedMeasurement> {
        let mut state = self.enter(Endpoint::SaveMeasurement)?;
        let file = match name.filter(|n| !n.trim().is_empty()) {
            Some(name) => format!("{}.csv", name.trim()),
            None => format!("test_{:03}.csv", state.next_test),
        };
        state.next_test += 1;
        let values = state.values.clone();
        state.tests.push(file.clone());
        state.test_data.insert(file.clone(), values);
        Ok(SavedMeasurement { file: Some(file) })
    }

    async fn connect(&self) -> Result<ConnectReply> {
        let mut state = self.enter(Endpoint::Connect)?;
        let delay = state.connect_delay;
        let target = if delay == 0 {
            CellStatus::Connected
        } else {
            CellStatus::Connecting
        };
        for status in state.statuses.iter_mut() {
            if *status != CellStatus::Connected {
                *status = target;
            }
        }
        state.connecting_polls = delay;
        Ok(ConnectReply {
            connected: delay == 0,
            statuses: state.status_strings(),
        })
    }

    async fn disconnect(&self) -> Result<ConnectReply> {
        let mut state = self.enter(Endpoint::Disconnect)?;
        for status in state.statuses.iter_mut() {
            *status = CellStatus::Disconnected;
        }
        state.connecting_polls = 0;
        Ok(ConnectReply {
            connected: false,
            statuses: state.status_strings(),
        })
    }

    async fn zero(&self) -> Result<()> {
        let mut state = self.enter(Endpoint::Zero)?;
        for value in state.values.iter_mut() {
            *value = 0.0;
        }
        Ok(())
    }

    async fn calibration(&self) -> Result<Vec<CalibrationRow>> {
        Ok(self.enter(Endpoint::Calibration)?.calibration.clone())
    }

    async fn save_calibration(&self, rows: &[CalibrationRow]) -> Result<Vec<CalibrationRow>> {
        let mut state = self.enter(Endpoint::SaveCalibration)?;
        state.calibration = rows
            .iter()
            .map(|r| CalibrationRow::new(r.cell_index, r.offset, r.gain))
            .collect();
        state.calibration_missing = false;
        Ok(state.calibration.clone())
    }

    async fn calibrate_zero(&self) -> Result<Vec<CalibrationRow>> {
        let mut state = self.enter(Endpoint::CalibrateZero)?;
        let raw = state.raw.clone();
        for (idx, row) in state.calibration.iter_mut().enumerate() {
            row.offset = raw.get(idx).copied().unwrap_or(0.0);
        }
        Ok(state.calibration.clone())
    }

    async fn calibrate_gain(&self, cell: usize, weight: f64) -> Result<Vec<CalibrationRow>> {
        let mut state = self.enter(Endpoint::CalibrateGain)?;
        if state.statuses.get(cell) != Some(&CellStatus::Connected) {
            return Err(Self::bad_request(Endpoint::CalibrateGain));
        }
        let raw = state.raw.get(cell).copied().unwrap_or(0.0);
        let row = state
            .calibration
            .get_mut(cell)
            .ok_or_else(|| Self::bad_request(Endpoint::CalibrateGain))?;
        let delta = raw - row.offset;
        if delta == 0.0 {
            return Err(Self::bad_request(Endpoint::CalibrateGain));
        }
        row.gain = weight / delta;
        Ok(state.calibration.clone())
    }

    async fn import_calibration(
        &self,
        request: &CalibrationImport,
    ) -> Result<CalibrationImportReply> {
        let mut state = self.enter(Endpoint::ImportCalibration)?;
        if request.content.trim().is_empty() {
            return Err(Self::bad_request(Endpoint::ImportCalibration));
        }
        if let Some(reason) = state.import_confirm {
            if !request.force {
                return Err(PanelError::ConfirmationRequired { reason });
            }
        }
        let mut rows = Vec::new();
        for (idx, line) in request.content.lines().skip(1).enumerate() {
            let cols: Vec<&str> = line.split(',').map(str::trim).collect();
            if cols.len() < 3 {
                continue;
            }
            let cell = cols[0].parse().unwrap_or(idx);
            let offset = cols[1].parse().unwrap_or(0.0);
            let gain = cols[2].parse().unwrap_or(1.0);
            rows.push(CalibrationRow::new(cell, offset, gain));
        }
        if rows.is_empty() {
            return Err(Self::bad_request(Endpoint::ImportCalibration));
        }
        state.calibration = rows;
        state.calibration_missing = false;
        Ok(CalibrationImportReply {
            calibration: state.calibration.clone(),
            file_serial: None,
            system_serial: state.system.system_serial.clone(),
        })
    }

    async fn export_calibration(&self) -> Result<String> {
        let state = self.enter(Endpoint::ExportCalibration)?;
        let mut out = String::from("LoadCell,Offset,Gain\n");
        for row in &state.calibration {
            out.push_str(&format!("{},{},{}\n", row.cell_index, row.offset, row.gain));
        }
        Ok(out)
    }

    async fn settings(&self) -> Result<Settings> {
        Ok(self.enter(Endpoint::Settings)?.settings.clone())
    }

    async fn save_settings(&self, update: &SettingsUpdate) -> Result<Settings> {
        let mut state = self.enter(Endpoint::SaveSettings)?;
        if !update.data_dir.is_empty() {
            state.settings.data_dir = update.data_dir.clone();
        }
        state.settings.plot_max_x = update.plot_max_x;
        Ok(state.settings.clone())
    }

    async fn system_info(&self) -> Result<SystemInfo> {
        Ok(self.enter(Endpoint::System)?.system.clone())
    }

    async fn set_serial(&self, serial: &str) -> Result<SystemInfo> {
        let mut state = self.enter(Endpoint::SetSerial)?;
        if serial.is_empty() {
            return Err(Self::bad_request(Endpoint::SetSerial));
        }
        state.system.system_serial = Some(serial.to_string());
        Ok(state.system.clone())
    }

    async fn set_system_wifi(&self, credentials: &WifiCredentials) -> Result<SystemInfo> {
        let mut state = self.enter(Endpoint::SetSystemWifi)?;
        if credentials.ssid.is_empty() {
            return Err(Self::bad_request(Endpoint::SetSystemWifi));
        }
        state.system.wifi_ssid = Some(credentials.ssid.clone());
        Ok(state.system.clone())
    }

    async fn wifi_networks(&self) -> Result<Vec<WifiNetwork>> {
        Ok(self.enter(Endpoint::WifiNetworks)?.networks.clone())
    }

    async fn connect_wifi(&self, credentials: &WifiCredentials) -> Result<()> {
        let mut state = self.enter(Endpoint::ConnectWifi)?;
        if !state.networks.iter().any(|n| n.ssid == credentials.ssid) {
            return Err(Self::bad_request(Endpoint::ConnectWifi));
        }
        state.system.wifi_ssid = Some(credentials.ssid.clone());
        Ok(())
    }

    async fn saved_tests(&self) -> Result<Vec<String>> {
        Ok(self.enter(Endpoint::SavedTests)?.tests.clone())
    }

    async fn compare_reports(&self, file_a: &str, file_b: &str) -> Result<ComparisonReply> {
        let state = self.enter(Endpoint::CompareReports)?;
        Ok(ComparisonReply {
            values_a: state.test_data.get(file_a).cloned().unwrap_or_default(),
            values_b: state.test_data.get(file_b).cloned().unwrap_or_default(),
        })
    }

    async fn single_report(&self, file: &str) -> Result<SingleReportReply> {
        let state = self.enter(Endpoint::SingleReport)?;
        Ok(SingleReportReply {
            values: state.test_data.get(file).cloned().unwrap_or_default(),
        })
    }
}
