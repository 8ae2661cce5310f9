//! Core data types for the C-Measure client
//!
//! This module contains the data model shared by the session state machines
//! and the wire payloads exchanged with the instrument bridge.
//!
//! # Main Types
//!
//! - [`CellStatus`] - Normalized per-cell connection state
//! - [`Measurement`] - One reading for one cell, produced by every poll
//! - [`BridgeStatus`] - Reachability of the hub relaying to the sensors
//! - [`CalibrationRow`] - Offset and gain for one cell
//! - [`Settings`] - Backend-held settings (data directory, chart ceiling)
//! - [`ReportSeries`] - A labeled numeric series shown on the reports chart
//!
//! # Wire Leniency
//!
//! The bridge is not strict about number encoding: calibration values are
//! sent as strings, readings may be `null`, and status strings are
//! open-ended. Deserializers here coerce at the boundary so the rest of the
//! crate only sees typed values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Connection state of a single load cell
///
/// Anything the bridge reports other than `Connected` or `Connecting`
/// normalizes to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellStatus {
    /// Cell is streaming readings
    Connected,
    /// Bridge is still attaching to the cell
    Connecting,
    /// Cell is absent, errored, or reported something unknown
    #[default]
    Disconnected,
}

impl CellStatus {
    /// Normalize a raw bridge status string
    pub fn normalize(raw: &str) -> Self {
        match raw {
            "Connected" => CellStatus::Connected,
            "Connecting" => CellStatus::Connecting,
            _ => CellStatus::Disconnected,
        }
    }

    /// Wire/display name
    pub fn as_str(&self) -> &'static str {
        match self {
            CellStatus::Connected => "Connected",
            CellStatus::Connecting => "Connecting",
            CellStatus::Disconnected => "Disconnected",
        }
    }

    /// Check if the cell is connected
    pub fn is_connected(&self) -> bool {
        matches!(self, CellStatus::Connected)
    }
}

impl std::fmt::Display for CellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for CellStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CellStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(s) => CellStatus::normalize(&s),
            _ => CellStatus::Disconnected,
        })
    }
}

/// A single reading for one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Zero-based cell index
    #[serde(rename = "id")]
    pub cell_index: usize,
    /// Calibrated value; NaN when the bridge had no reading
    #[serde(default = "nan", deserialize_with = "lenient_f64_or_nan")]
    pub value: f64,
    /// Uncalibrated sensor value, when the bridge exposes it
    #[serde(rename = "raw", default, deserialize_with = "lenient_opt_f64")]
    pub raw_value: Option<f64>,
    /// Normalized status of the cell at the time of the reading
    #[serde(default)]
    pub status: CellStatus,
    /// Engineering unit, usually `N`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Measurement {
    /// Create a connected measurement
    pub fn new(cell_index: usize, value: f64) -> Self {
        Self {
            cell_index,
            value,
            raw_value: None,
            status: CellStatus::Connected,
            unit: None,
        }
    }

    /// Set the raw value
    pub fn with_raw(mut self, raw: f64) -> Self {
        self.raw_value = Some(raw);
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: CellStatus) -> Self {
        self.status = status;
        self
    }

    /// Text for the measurement table: the value only when it can be trusted
    pub fn display_value(&self) -> String {
        if self.status.is_connected() && self.value.is_finite() {
            crate::analysis::format_reading(self.value, 5)
        } else {
            "Error".to_string()
        }
    }
}

/// Reachability of the bridge/hub that relays to the sensors
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Whether the hub answered
    #[serde(default)]
    pub reachable: bool,
    /// Whether the backend runs without hardware
    #[serde(default)]
    pub simulated: bool,
    /// Host the backend relays to
    #[serde(default)]
    pub host: Option<String>,
    /// Port the backend relays to
    #[serde(default)]
    pub port: Option<u16>,
}

impl BridgeStatus {
    /// Real hardware that did not answer
    pub fn is_offline(&self) -> bool {
        !self.simulated && !self.reachable
    }

    /// Real hardware that answered
    pub fn is_online(&self) -> bool {
        !self.simulated && self.reachable
    }

    /// `host:port`, `host`, or `-`
    pub fn host_line(&self) -> String {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.clone(),
            _ => "-".to_string(),
        }
    }

    /// Short label for the sidebar indicator
    pub fn label(&self) -> &'static str {
        if self.simulated {
            "C-Measure: simulation"
        } else if self.reachable {
            "C-Measure: active"
        } else {
            "C-Measure: offline"
        }
    }
}

/// Response of `GET /api/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Raw per-cell status strings, not yet normalized
    #[serde(default, deserialize_with = "raw_strings")]
    pub statuses: Vec<String>,
    /// Hub reachability
    #[serde(default)]
    pub bridge: Option<BridgeStatus>,
    /// Backend has no calibration file for this system
    #[serde(default)]
    pub calibration_missing: bool,
}

/// Response of `POST /api/connect` and `POST /api/disconnect`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectReply {
    /// Whether the backend considers itself connected
    #[serde(default)]
    pub connected: bool,
    /// Raw per-cell status strings
    #[serde(default, deserialize_with = "raw_strings")]
    pub statuses: Vec<String>,
}

/// Response of `POST /api/measurements`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedMeasurement {
    /// Identifier of the saved test file
    #[serde(default)]
    pub file: Option<String>,
}

/// Offset and gain for one cell
///
/// `gain_confirmed` is session-local: it is never sent to the backend and
/// is reset whenever the offsets move.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRow {
    /// Zero-based cell index
    pub cell_index: usize,
    /// Zero-offset subtracted from raw readings
    pub offset: f64,
    /// Scale factor applied after offset subtraction
    pub gain: f64,
    /// Gain confirmed against a reference weight in this session
    pub gain_confirmed: bool,
}

impl CalibrationRow {
    /// Create a row with no confirmation
    pub fn new(cell_index: usize, offset: f64, gain: f64) -> Self {
        Self {
            cell_index,
            offset,
            gain,
            gain_confirmed: false,
        }
    }
}

/// Wire shape of a calibration row: every field is a string
#[derive(Debug, Clone, Deserialize)]
struct CalibrationRecord {
    #[serde(rename = "LoadCell", default, deserialize_with = "lenient_opt_string")]
    load_cell: Option<String>,
    #[serde(rename = "Offset", default, deserialize_with = "lenient_opt_f64")]
    offset: Option<f64>,
    #[serde(rename = "Gain", default, deserialize_with = "lenient_opt_f64")]
    gain: Option<f64>,
}

impl Serialize for CalibrationRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            #[serde(rename = "LoadCell")]
            load_cell: String,
            #[serde(rename = "Offset")]
            offset: String,
            #[serde(rename = "Gain")]
            gain: String,
        }
        Wire {
            load_cell: self.cell_index.to_string(),
            offset: self.offset.to_string(),
            gain: self.gain.to_string(),
        }
        .serialize(serializer)
    }
}

/// Deserialize a calibration row list, filling missing indices by position
pub fn deserialize_calibration<'de, D>(deserializer: D) -> Result<Vec<CalibrationRow>, D::Error>
where
    D: Deserializer<'de>,
{
    let records = Vec::<CalibrationRecord>::deserialize(deserializer)?;
    Ok(records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            let cell_index = record
                .load_cell
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(idx);
            CalibrationRow::new(
                cell_index,
                record.offset.unwrap_or(0.0),
                record.gain.unwrap_or(1.0),
            )
        })
        .collect())
}

/// Envelope `{calibration: [...]}` used by every calibration endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationTable {
    /// Rows, one per cell
    #[serde(default, deserialize_with = "deserialize_calibration")]
    pub calibration: Vec<CalibrationRow>,
}

/// Request body of `POST /api/calibration/import`
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationImport {
    /// CSV content of the calibration file
    pub content: String,
    /// Original filename; may carry the system serial
    pub filename: String,
    /// Skip the serial-mismatch and overwrite confirmations
    pub force: bool,
}

/// Response of a successful calibration import
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationImportReply {
    /// Rows now in effect
    #[serde(default, deserialize_with = "deserialize_calibration")]
    pub calibration: Vec<CalibrationRow>,
    /// Serial embedded in the imported file
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub file_serial: Option<String>,
    /// Serial of this system
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub system_serial: Option<String>,
}

/// Settings held by the backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Directory where tests and calibration are stored
    #[serde(default)]
    pub data_dir: String,
    /// Fixed chart ceiling, when set
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub plot_max_x: Option<f64>,
    /// Backend runs without hardware
    #[serde(default)]
    pub simulate: bool,
}

impl Settings {
    /// Chart ceiling when `plot_max_x` is finite and positive
    pub fn plot_ceiling(&self) -> Option<f64> {
        self.plot_max_x.filter(|v| v.is_finite() && *v > 0.0)
    }

    /// Directory holding saved measurement files
    ///
    /// Uses the separator style already present in `data_dir`; falls back to
    /// `backend/data` when the directory is unknown.
    pub fn measurements_dir(&self) -> String {
        let base = if self.data_dir.is_empty() {
            "backend/data"
        } else {
            self.data_dir.as_str()
        };
        let trimmed = base.trim_end_matches(['/', '\\']);
        let separator = if trimmed.contains('\\') { '\\' } else { '/' };
        format!("{}{}measurements", trimmed, separator)
    }
}

/// Request body of `PUT /api/settings`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    /// New data directory
    pub data_dir: String,
    /// New chart ceiling, `null` to compute from data
    pub plot_max_x: Option<f64>,
}

/// Identity and pairing information of the system
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub system_serial: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub paired_serial: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub last_calibration_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub wifi_ssid: Option<String>,
}

impl SystemInfo {
    fn or_dash(value: &Option<String>) -> &str {
        value.as_deref().filter(|s| !s.is_empty()).unwrap_or("-")
    }

    pub fn system_serial_label(&self) -> &str {
        Self::or_dash(&self.system_serial)
    }

    pub fn paired_serial_label(&self) -> &str {
        Self::or_dash(&self.paired_serial)
    }

    pub fn last_calibration_label(&self) -> &str {
        Self::or_dash(&self.last_calibration_at)
    }
}

/// A Wi-Fi network visible to the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    /// Signal strength in percent
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub signal: Option<f64>,
}

impl WifiNetwork {
    /// `ssid (signal%)`
    pub fn label(&self) -> String {
        match self.signal {
            Some(signal) => format!("{} ({}%)", self.ssid, signal),
            None => self.ssid.clone(),
        }
    }
}

/// Wi-Fi credentials for the hub or the system
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

/// Response of `POST /api/reports/compare`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReply {
    #[serde(default)]
    pub values_a: Vec<f64>,
    #[serde(default)]
    pub values_b: Vec<f64>,
}

/// Response of `POST /api/reports/single`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SingleReportReply {
    #[serde(default)]
    pub values: Vec<f64>,
}

/// A labeled series on the reports chart
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportSeries {
    pub values: Vec<f64>,
    pub label: String,
}

impl ReportSeries {
    pub fn new(values: Vec<f64>, label: impl Into<String>) -> Self {
        Self {
            values,
            label: label.into(),
        }
    }
}

/// Screens of the control panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum View {
    #[default]
    Home,
    Measurements,
    Calibration,
    Reports,
    Settings,
    Factory,
}

impl View {
    /// Page title
    pub fn title(&self) -> &'static str {
        match self {
            View::Home => "Home",
            View::Measurements => "Measurements",
            View::Calibration => "Calibration",
            View::Reports => "Reports",
            View::Settings => "Settings",
            View::Factory => "Factory",
        }
    }
}

/// Severity of an operator notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Non-blocking message for the operator
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

/// Last path component, accepting both separator styles
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(path)
}

// ==================== Lenient deserializers ====================

fn nan() -> f64 {
    f64::NAN
}

fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}

fn lenient_f64_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_f64(deserializer)?.unwrap_or(f64::NAN))
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn raw_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect())
}
