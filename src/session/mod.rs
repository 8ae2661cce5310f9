//! Session module: the client-side state machines and their actor
//!
//! A session is driven by one [`SessionController`] running as a single
//! cooperative task. The presentation layer talks to it through a
//! [`SessionHandle`]: commands go in over a tokio channel, events come back
//! over a crossbeam channel that can be drained from a synchronous UI loop.
//!
//! # Components
//!
//! - [`ConnectionStateMachine`] - Per-cell status and bridge reachability
//! - [`PollingScheduler`] - One recurring loop at a time plus bounded connect retry
//! - [`CalibrationWorkflow`] - Zero-offset and per-cell gain sequencing
//! - [`SeriesStore`] - Live, frozen and report series
//! - [`csv_series`] - Test-file parsing
//! - [`AccessGate`] - Hidden unlock of the calibration and factory views
//! - [`SessionController`] - Composes all of the above
//!
//! # Example
//!
//! ```ignore
//! use cmeasure_rs::backend::MockInstrument;
//! use cmeasure_rs::config::ClientConfig;
//! use cmeasure_rs::session::{SessionController, SessionEvent};
//! use cmeasure_rs::types::View;
//!
//! let (controller, handle) =
//!     SessionController::new(Box::new(MockInstrument::connected(8)), &ClientConfig::default());
//! tokio::spawn(controller.run());
//!
//! handle.start();
//! handle.set_view(View::Measurements);
//! for event in handle.drain() {
//!     if let SessionEvent::Notification(n) = event {
//!         println!("{}", n.message);
//!     }
//! }
//! ```

pub mod access;
pub mod calibration;
pub mod connection;
pub mod controller;
pub mod csv_series;
pub mod scheduler;
pub mod series;

pub use access::{AccessGate, AccessOutcome};
pub use calibration::{parse_weight, CalibrationWorkflow, RowState, ZeroPhase};
pub use connection::{AggregateSummary, ConnectionStateMachine};
pub use controller::{SessionContext, SessionController};
pub use scheduler::{PollTask, PollingScheduler, TaskHandle, Tick};
pub use series::{
    CompareSource, LocalReport, MeasurementRow, ReportMode, ReportRow, ReportSide, SeriesStore,
};

use crate::analysis::RenderPlan;
use crate::error::ConfirmReason;
use crate::types::{
    BridgeStatus, CalibrationRow, Notification, Settings, SystemInfo, View, WifiNetwork,
};
use crossbeam_channel::Receiver;
use tokio::sync::mpsc::Sender;

/// Commands sent from the presentation layer to the session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Start,
    SetView(View),
    SetRawDisplay(bool),
    SetContinuous(bool),
    Connect,
    Disconnect,
    ZeroSet,
    SaveMeasurement { name: Option<String> },
    ClearFrozen,
    RefreshCalibration,
    CalibrateZero,
    CalibrateGain { cell: usize, weight: String },
    SaveCalibration(Vec<CalibrationRow>),
    ImportCalibration { content: String, filename: String, force: bool },
    ExportCalibration,
    RefreshSavedTests,
    SelectSavedTest { side: ReportSide, file: Option<String> },
    LoadLocalReport { side: ReportSide, content: String, name: String },
    CompareReports,
    RefreshSettings,
    SaveSettings { data_dir: String, plot_max: String },
    RefreshSystem,
    SetSerial(String),
    SetSystemWifi { ssid: String, password: String },
    ListWifi,
    ConnectWifi { ssid: String, password: String },
    TapBrand,
    SubmitAccessCode(String),
    /// Stop the actor loop
    Shutdown,
}

/// Events sent from the session to the presentation layer
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Notification(Notification),
    ViewChanged(View),
    StatusUpdated {
        summary: AggregateSummary,
        bridge: Option<BridgeStatus>,
        calibration_warning: bool,
    },
    MeasurementsUpdated(Vec<MeasurementRow>),
    MeasurementChart(RenderPlan),
    FrozenChanged(Option<Vec<f64>>),
    PollingChanged(Option<PollTask>),
    RawDisplayChanged(bool),
    ContinuousChanged(bool),
    ConnectControl { enabled: bool },
    CalibrationUpdated {
        rows: Vec<CalibrationRow>,
        states: Vec<RowState>,
        zero: ZeroPhase,
    },
    CalibrationExported(String),
    ImportNeedsConfirmation(ConfirmReason),
    SettingsUpdated(Settings),
    SystemUpdated(SystemInfo),
    WifiNetworks(Vec<WifiNetwork>),
    SavedTests(Vec<String>),
    ReportUpdated {
        rows: Vec<ReportRow>,
        label_a: String,
        label_b: String,
        chart: RenderPlan,
    },
    AccessPrompt,
    /// The actor loop has ended
    Stopped,
}

/// UI-side handle for sending commands and receiving events
pub struct SessionHandle {
    /// Receiver for session events
    pub receiver: Receiver<SessionEvent>,
    /// Sender for commands to the session
    pub command_sender: Sender<SessionCommand>,
}

impl SessionHandle {
    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending events
    pub fn drain(&self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Send a command to the session; false if the queue is full or closed
    pub fn send_command(&self, cmd: SessionCommand) -> bool {
        match self.command_sender.try_send(cmd) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Dropping session command: {}", err);
                false
            }
        }
    }

    pub fn start(&self) -> bool {
        self.send_command(SessionCommand::Start)
    }

    pub fn set_view(&self, view: View) -> bool {
        self.send_command(SessionCommand::SetView(view))
    }

    pub fn set_raw_display(&self, on: bool) -> bool {
        self.send_command(SessionCommand::SetRawDisplay(on))
    }

    pub fn set_continuous(&self, on: bool) -> bool {
        self.send_command(SessionCommand::SetContinuous(on))
    }

    pub fn connect(&self) -> bool {
        self.send_command(SessionCommand::Connect)
    }

    pub fn disconnect(&self) -> bool {
        self.send_command(SessionCommand::Disconnect)
    }

    pub fn zero_set(&self) -> bool {
        self.send_command(SessionCommand::ZeroSet)
    }

    pub fn save_measurement(&self, name: Option<String>) -> bool {
        self.send_command(SessionCommand::SaveMeasurement { name })
    }

    pub fn clear_frozen(&self) -> bool {
        self.send_command(SessionCommand::ClearFrozen)
    }

    pub fn calibrate_zero(&self) -> bool {
        self.send_command(SessionCommand::CalibrateZero)
    }

    pub fn calibrate_gain(&self, cell: usize, weight: impl Into<String>) -> bool {
        self.send_command(SessionCommand::CalibrateGain {
            cell,
            weight: weight.into(),
        })
    }

    pub fn save_calibration(&self, rows: Vec<CalibrationRow>) -> bool {
        self.send_command(SessionCommand::SaveCalibration(rows))
    }

    pub fn import_calibration(&self, content: String, filename: String, force: bool) -> bool {
        self.send_command(SessionCommand::ImportCalibration {
            content,
            filename,
            force,
        })
    }

    pub fn export_calibration(&self) -> bool {
        self.send_command(SessionCommand::ExportCalibration)
    }

    pub fn select_saved_test(&self, side: ReportSide, file: Option<String>) -> bool {
        self.send_command(SessionCommand::SelectSavedTest { side, file })
    }

    pub fn load_local_report(&self, side: ReportSide, content: String, name: String) -> bool {
        self.send_command(SessionCommand::LoadLocalReport {
            side,
            content,
            name,
        })
    }

    pub fn compare_reports(&self) -> bool {
        self.send_command(SessionCommand::CompareReports)
    }

    pub fn save_settings(&self, data_dir: String, plot_max: String) -> bool {
        self.send_command(SessionCommand::SaveSettings { data_dir, plot_max })
    }

    pub fn tap_brand(&self) -> bool {
        self.send_command(SessionCommand::TapBrand)
    }

    pub fn submit_access_code(&self, code: impl Into<String>) -> bool {
        self.send_command(SessionCommand::SubmitAccessCode(code.into()))
    }

    /// Ask the actor loop to stop
    pub fn shutdown(&self) -> bool {
        self.send_command(SessionCommand::Shutdown)
    }
}
