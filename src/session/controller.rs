//! Session controller
//!
//! The controller owns the session context and the scheduler and is the
//! only code that calls the backend. It runs as a single cooperative actor:
//! [`SessionController::run`] waits on either the next command or the next
//! scheduler tick and handles one at a time, so polls and operator actions
//! never interleave.
//!
//! Every operation is also a public async method, which is how tests drive
//! the controller without going through the channels.
//!
//! # Polling
//!
//! Which loop runs is derived from the context by `reconcile_loop`:
//!
//! | View          | Mode              | Loop                  |
//! |---------------|-------------------|-----------------------|
//! | Measurements  | continuous on     | `continuousMeasure`   |
//! | Measurements  | continuous off    | `preview`             |
//! | Calibration   | -                 | none                  |
//! | anything else | raw display on    | `rawPoll`             |
//! | anything else | raw display off   | `statusPoll`          |
//!
//! The connect retry runs beside the main loop and is not part of the table.

use super::access::{AccessGate, AccessOutcome};
use super::calibration::CalibrationWorkflow;
use super::connection::ConnectionStateMachine;
use super::scheduler::{PollTask, PollingScheduler, Tick};
use super::series::{CompareSource, ReportSide, SeriesStore};
use super::{SessionCommand, SessionEvent, SessionHandle};
use crate::analysis::{depth_labels, ChartProjector, RenderPlan};
use crate::backend::InstrumentApi;
use crate::config::{ChartLayout, ClientConfig};
use crate::error::{PanelError, Result};
use crate::types::{
    base_name, CalibrationImport, CalibrationRow, Notification, Settings, SettingsUpdate,
    SystemInfo, View, WifiCredentials,
};
use crossbeam_channel::{bounded, Sender};
use tokio::sync::mpsc;

/// Capacity of the command queue
const COMMAND_QUEUE: usize = 256;

/// Capacity of the event queue
const EVENT_QUEUE: usize = 10_000;

/// Chart id of the live measurement plot
pub const MEASUREMENT_CHART_ID: &str = "load-plot";

/// Chart id of the reports plot
pub const REPORT_CHART_ID: &str = "report-plot";

/// Everything the session knows, owned by the controller
#[derive(Debug, Default)]
pub struct SessionContext {
    pub view: View,
    pub continuous: bool,
    pub show_raw: bool,
    /// A connect request or its retry loop is in progress
    pub connecting: bool,
    pub connection: ConnectionStateMachine,
    pub calibration: CalibrationWorkflow,
    pub series: SeriesStore,
    pub settings: Settings,
    pub system: SystemInfo,
    pub saved_tests: Vec<String>,
    /// File name of the last saved measurement
    pub last_test: Option<String>,
    pub access: AccessGate,
    /// `start` has run; loops are only scheduled after that
    pub started: bool,
    /// The last poll failed; suppresses repeated notifications
    pub poll_failing: bool,
}

/// The session actor
pub struct SessionController {
    api: Box<dyn InstrumentApi>,
    ctx: SessionContext,
    scheduler: PollingScheduler,
    chart: ChartLayout,
    commands: mpsc::Receiver<SessionCommand>,
    events: Sender<SessionEvent>,
}

impl SessionController {
    /// Create a controller and the handle used to drive it
    pub fn new(api: Box<dyn InstrumentApi>, config: &ClientConfig) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let (event_tx, event_rx) = bounded(EVENT_QUEUE);

        let controller = Self {
            api,
            ctx: SessionContext::default(),
            scheduler: PollingScheduler::new(config.polling.clone()),
            chart: config.chart.clone(),
            commands: cmd_rx,
            events: event_tx,
        };

        let handle = SessionHandle {
            receiver: event_rx,
            command_sender: cmd_tx,
        };

        (controller, handle)
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Session started");
        while self.step().await {}
        self.scheduler.stop_all();
        self.emit(SessionEvent::Stopped);
        tracing::info!("Session stopped");
    }

    /// Handle one command or one tick; false once the session should stop
    pub async fn step(&mut self) -> bool {
        tokio::select! {
            biased;
            cmd = self.commands.recv() => match cmd {
                Some(SessionCommand::Shutdown) | None => false,
                Some(cmd) => {
                    self.handle_command(cmd).await;
                    true
                }
            },
            tick = self.scheduler.next_tick() => {
                self.handle_tick(tick).await;
                true
            }
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        tracing::debug!("Session command: {:?}", cmd);
        let result = match cmd {
            SessionCommand::Start => self.start().await,
            SessionCommand::SetView(view) => self.set_view(view).await,
            SessionCommand::SetRawDisplay(on) => self.set_raw_display(on).await,
            SessionCommand::SetContinuous(on) => self.set_continuous(on).await,
            SessionCommand::Connect => self.connect().await,
            SessionCommand::Disconnect => self.disconnect().await,
            SessionCommand::ZeroSet => self.zero_set().await,
            SessionCommand::SaveMeasurement { name } => self.save_measurement(name).await.map(|_| ()),
            SessionCommand::ClearFrozen => {
                self.clear_frozen();
                Ok(())
            }
            SessionCommand::RefreshCalibration => self.refresh_calibration().await,
            SessionCommand::CalibrateZero => self.calibrate_zero().await,
            SessionCommand::CalibrateGain { cell, weight } => {
                self.calibrate_gain(cell, &weight).await
            }
            SessionCommand::SaveCalibration(rows) => self.save_calibration(rows).await,
            SessionCommand::ImportCalibration {
                content,
                filename,
                force,
            } => self.import_calibration(content, filename, force).await,
            SessionCommand::ExportCalibration => self.export_calibration().await.map(|_| ()),
            SessionCommand::RefreshSavedTests => self.refresh_saved_tests().await,
            SessionCommand::SelectSavedTest { side, file } => {
                self.select_saved_test(side, file).await
            }
            SessionCommand::LoadLocalReport {
                side,
                content,
                name,
            } => self.load_local_report(side, content, name).await,
            SessionCommand::CompareReports => self.compare_reports().await,
            SessionCommand::RefreshSettings => self.refresh_settings().await,
            SessionCommand::SaveSettings { data_dir, plot_max } => {
                self.save_settings(data_dir, &plot_max).await
            }
            SessionCommand::RefreshSystem => self.refresh_system().await,
            SessionCommand::SetSerial(serial) => self.set_serial(&serial).await,
            SessionCommand::SetSystemWifi { ssid, password } => {
                self.set_system_wifi(&ssid, &password).await
            }
            SessionCommand::ListWifi => self.wifi_networks().await.map(|_| ()),
            SessionCommand::ConnectWifi { ssid, password } => {
                self.connect_wifi(&ssid, &password).await
            }
            SessionCommand::TapBrand => {
                self.tap_brand();
                Ok(())
            }
            SessionCommand::SubmitAccessCode(code) => {
                self.submit_access_code(&code).await.map(|_| ())
            }
            SessionCommand::Shutdown => Ok(()),
        };
        if let Err(err) = result {
            tracing::debug!("Command failed: {}", err);
        }
    }

    async fn handle_tick(&mut self, tick: Tick) {
        match tick {
            Tick::Poll(task) => self.poll(task).await,
            Tick::ConnectRetry { attempt } => self.connect_retry(attempt).await,
        }
    }

    // ==================== Events ====================

    fn emit(&self, event: SessionEvent) {
        if let Err(err) = self.events.try_send(event) {
            tracing::warn!("Dropping session event: {}", err);
        }
    }

    fn notify(&self, notification: Notification) {
        tracing::info!("{}", notification.message);
        self.emit(SessionEvent::Notification(notification));
    }

    /// Log and surface a failed operator action
    fn fail(&self, message: &str, err: PanelError) -> PanelError {
        tracing::warn!("{}: {}", message, err);
        self.emit(SessionEvent::Notification(Notification::error(message)));
        err
    }

    /// Surface a rejected action that never reached the backend
    fn reject(&self, err: PanelError) -> PanelError {
        tracing::debug!("Rejected: {}", err);
        let message = match &err {
            PanelError::Validation(m) | PanelError::WorkflowConflict(m) => m.clone(),
            other => other.to_string(),
        };
        self.emit(SessionEvent::Notification(Notification::warning(message)));
        err
    }

    /// Record a failed poll; notifies once per failure streak
    fn poll_failed(&mut self, what: &str, err: PanelError) {
        tracing::warn!("{} poll failed: {}", what, err);
        if !self.ctx.poll_failing {
            self.ctx.poll_failing = true;
            self.emit(SessionEvent::Notification(Notification::warning(
                "Backend not reachable",
            )));
        }
    }

    fn poll_succeeded(&mut self) {
        if self.ctx.poll_failing {
            self.ctx.poll_failing = false;
            tracing::info!("Backend reachable again");
        }
    }

    fn emit_calibration(&self) {
        let wf = &self.ctx.calibration;
        self.emit(SessionEvent::CalibrationUpdated {
            rows: wf.rows().to_vec(),
            states: wf.row_states().to_vec(),
            zero: wf.zero_phase(),
        });
    }

    fn emit_measurements(&self) {
        self.emit(SessionEvent::MeasurementsUpdated(
            self.ctx.series.measurement_rows(),
        ));
        self.emit(SessionEvent::MeasurementChart(self.render_measurement_chart()));
    }

    fn emit_report(&self) {
        let series = &self.ctx.series;
        self.emit(SessionEvent::ReportUpdated {
            rows: series.report_rows(),
            label_a: series.report(ReportSide::A).label.clone(),
            label_b: series.report(ReportSide::B).label.clone(),
            chart: self.render_report_chart(),
        });
    }

    // ==================== Polling ====================

    /// Loop the current context calls for
    fn desired_loop(&self) -> Option<PollTask> {
        match self.ctx.view {
            View::Calibration => None,
            View::Measurements if self.ctx.continuous => Some(PollTask::ContinuousMeasure),
            View::Measurements => Some(PollTask::Preview),
            _ if self.ctx.show_raw => Some(PollTask::RawPoll),
            _ => Some(PollTask::StatusPoll),
        }
    }

    /// Start or stop the main loop to match the context
    fn reconcile_loop(&mut self) {
        if !self.ctx.started {
            return;
        }
        let desired = self.desired_loop();
        if self.scheduler.active() == desired {
            return;
        }
        match desired {
            Some(task) => {
                self.scheduler.start(task);
            }
            None => {
                if let Some(handle) = self.scheduler.active_handle() {
                    self.scheduler.stop(handle);
                }
            }
        }
        self.emit(SessionEvent::PollingChanged(desired));
    }

    async fn poll(&mut self, task: PollTask) {
        tracing::debug!("Tick {}", task);
        match task {
            PollTask::StatusPoll => {
                let _ = self.poll_status().await;
            }
            PollTask::RawPoll | PollTask::Preview => self.poll_measurements().await,
            PollTask::ContinuousMeasure => {
                self.poll_measurements().await;
                let _ = self.poll_status().await;
            }
        }
    }

    async fn poll_measurements(&mut self) {
        if let Err(err) = self.fetch_measurements().await {
            self.poll_failed("Measurement", err);
        }
    }

    /// Status poll whose failure is only logged; returns whether it succeeded
    async fn poll_status(&mut self) -> bool {
        match self.fetch_status().await {
            Ok(()) => true,
            Err(err) => {
                self.poll_failed("Status", err);
                false
            }
        }
    }

    async fn fetch_status(&mut self) -> Result<()> {
        let report = self.api.status().await?;
        self.poll_succeeded();
        let summary = self.ctx.connection.apply_statuses(&report.statuses);
        self.ctx
            .connection
            .apply_bridge(report.bridge.clone(), report.calibration_missing);
        self.emit(SessionEvent::StatusUpdated {
            summary,
            bridge: report.bridge,
            calibration_warning: self.ctx.connection.calibration_warning(),
        });
        self.check_raw_availability();
        Ok(())
    }

    async fn fetch_measurements(&mut self) -> Result<()> {
        let measurements = self.api.measurements().await?;
        self.poll_succeeded();
        if !measurements.is_empty() {
            let statuses: Vec<&str> = measurements.iter().map(|m| m.status.as_str()).collect();
            self.ctx.connection.apply_statuses(&statuses);
        }
        self.ctx.series.set_measurements(measurements);
        self.emit_measurements();
        self.check_raw_availability();
        Ok(())
    }

    /// Raw display needs at least one connected cell
    fn check_raw_availability(&mut self) {
        if self.ctx.show_raw && !self.ctx.connection.summary().any_connected() {
            tracing::info!("No connected cells, raw display off");
            self.ctx.show_raw = false;
            self.emit(SessionEvent::RawDisplayChanged(false));
            self.reconcile_loop();
        }
    }

    async fn connect_retry(&mut self, attempt: u32) {
        tracing::debug!("Connect retry attempt {}", attempt);
        let still_connecting = if self.poll_status().await {
            self.ctx.connection.summary().any_connecting()
        } else {
            true
        };
        if self.scheduler.record_connect_retry(still_connecting) {
            self.finish_connecting();
        }
    }

    fn finish_connecting(&mut self) {
        if self.ctx.connecting {
            self.ctx.connecting = false;
            self.emit(SessionEvent::ConnectControl { enabled: true });
        }
    }

    // ==================== Operations: Session ====================

    /// Fetch the first status, start the base loop, then load everything else
    pub async fn start(&mut self) -> Result<()> {
        if let Err(err) = self.fetch_status().await {
            let err = PanelError::Startup(format!("Backend not reachable: {}", err));
            tracing::error!("{}", err);
            self.notify(Notification::error("Backend not reachable"));
            return Err(err);
        }
        self.ctx.started = true;
        self.reconcile_loop();

        if let Err(err) = self.fetch_measurements().await {
            tracing::warn!("Initial measurements failed: {}", err);
        }
        let _ = self.refresh_calibration().await;
        let _ = self.refresh_settings().await;
        let _ = self.refresh_system().await;
        let _ = self.refresh_saved_tests().await;
        Ok(())
    }

    /// Navigate to `view`, adjusting modes and the polling loop
    pub async fn set_view(&mut self, view: View) -> Result<()> {
        if !self.ctx.access.is_unlocked(view) {
            return Err(self.reject(PanelError::Validation(format!(
                "{} is locked",
                view.title()
            ))));
        }
        self.ctx.access.navigate(view);
        self.ctx.view = view;
        tracing::info!("View changed to {}", view.title());

        if view != View::Home && self.ctx.show_raw {
            self.ctx.show_raw = false;
            self.emit(SessionEvent::RawDisplayChanged(false));
        }
        if view != View::Measurements && self.ctx.continuous {
            self.ctx.continuous = false;
            self.emit(SessionEvent::ContinuousChanged(false));
        }
        if view == View::Calibration {
            if self.scheduler.stop_connect_retry() {
                tracing::debug!("Connect retry cancelled by calibration view");
            }
            self.finish_connecting();
        }
        self.reconcile_loop();
        self.emit(SessionEvent::ViewChanged(view));

        // Views load their data on entry; failures are already notified
        let _ = match view {
            View::Calibration => self.refresh_calibration().await,
            View::Reports => self.refresh_saved_tests().await,
            View::Settings => self.refresh_settings().await,
            View::Factory => self.refresh_system().await,
            View::Home | View::Measurements => Ok(()),
        };
        Ok(())
    }

    /// Toggle raw values; only on Home with at least one connected cell
    pub async fn set_raw_display(&mut self, on: bool) -> Result<()> {
        if on && self.ctx.view != View::Home {
            return Err(self.reject(PanelError::Validation(
                "Raw values are only shown on Home".to_string(),
            )));
        }
        if on && !self.ctx.connection.summary().any_connected() {
            return Err(self.reject(PanelError::Validation(
                "No connected cells".to_string(),
            )));
        }
        if self.ctx.show_raw == on {
            return Ok(());
        }
        self.ctx.show_raw = on;
        self.emit(SessionEvent::RawDisplayChanged(on));
        self.reconcile_loop();
        if on {
            self.poll_measurements().await;
        } else {
            self.poll_status().await;
        }
        Ok(())
    }

    /// Toggle continuous measurement on the measurement view
    pub async fn set_continuous(&mut self, on: bool) -> Result<()> {
        if on && self.ctx.view != View::Measurements {
            return Err(self.reject(PanelError::Validation(
                "Continuous measurement needs the measurement view".to_string(),
            )));
        }
        if self.ctx.continuous == on {
            return Ok(());
        }
        self.ctx.continuous = on;
        self.emit(SessionEvent::ContinuousChanged(on));
        self.reconcile_loop();
        if on {
            self.poll_measurements().await;
        }
        Ok(())
    }

    /// Ask the bridge to connect, then watch statuses until cells settle
    pub async fn connect(&mut self) -> Result<()> {
        if self.ctx.connecting {
            return Err(self.reject(PanelError::WorkflowConflict(
                "Already connecting".to_string(),
            )));
        }
        self.ctx.connecting = true;
        self.emit(SessionEvent::ConnectControl { enabled: false });

        match self.api.connect().await {
            Ok(reply) => {
                tracing::info!("Connect requested, connected={}", reply.connected);
                if let Err(err) = self.fetch_status().await {
                    tracing::warn!("Status after connect failed: {}", err);
                }
                self.notify(Notification::info("Connecting to sensors"));
                self.scheduler.start_connect_retry();
                Ok(())
            }
            Err(err) => {
                self.ctx.connecting = false;
                self.emit(SessionEvent::ConnectControl { enabled: true });
                Err(self.fail("Failed to connect", err))
            }
        }
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        let reply = self
            .api
            .disconnect()
            .await
            .map_err(|e| self.fail("Failed to disconnect", e))?;
        self.scheduler.stop_connect_retry();
        self.finish_connecting();
        let summary = self.ctx.connection.apply_statuses(&reply.statuses);
        self.emit(SessionEvent::StatusUpdated {
            summary,
            bridge: self.ctx.connection.bridge().cloned(),
            calibration_warning: self.ctx.connection.calibration_warning(),
        });
        self.check_raw_availability();
        self.notify(Notification::info("Disconnected"));
        Ok(())
    }

    /// Tare the live readings
    pub async fn zero_set(&mut self) -> Result<()> {
        self.api
            .zero()
            .await
            .map_err(|e| self.fail("Failed to zero set", e))?;
        self.notify(Notification::info("Zero set applied"));
        self.poll_measurements().await;
        Ok(())
    }

    /// Save a test; on success the live values become the frozen baseline
    pub async fn save_measurement(&mut self, name: Option<String>) -> Result<Option<String>> {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let saved = self
            .api
            .save_measurement(name)
            .await
            .map_err(|e| self.fail("Failed to save measurement", e))?;

        if self.ctx.series.freeze() {
            self.emit(SessionEvent::FrozenChanged(
                self.ctx.series.frozen().map(|f| f.to_vec()),
            ));
        }
        self.ctx.last_test = saved.file.clone();
        self.notify(Notification::info("Measurement saved"));
        self.poll_measurements().await;
        let _ = self.refresh_saved_tests().await;
        Ok(saved.file)
    }

    pub fn clear_frozen(&mut self) {
        self.ctx.series.clear_frozen();
        self.emit(SessionEvent::FrozenChanged(None));
        self.emit(SessionEvent::MeasurementChart(self.render_measurement_chart()));
    }

    // ==================== Operations: Calibration ====================

    pub async fn refresh_calibration(&mut self) -> Result<()> {
        let rows = self
            .api
            .calibration()
            .await
            .map_err(|e| self.fail("Failed to load calibration", e))?;
        self.ctx.calibration.set_rows(rows);
        self.emit_calibration();
        Ok(())
    }

    /// Zero phase: measure offsets for every cell
    pub async fn calibrate_zero(&mut self) -> Result<()> {
        self.ctx
            .calibration
            .begin_zero()
            .map_err(|e| self.reject(e))?;
        self.emit_calibration();

        let result = self.api.calibrate_zero().await;
        let outcome = self.ctx.calibration.finish_zero(result);
        self.emit_calibration();
        match outcome {
            Ok(()) => {
                let _ = self.refresh_calibration().await;
                self.notify(Notification::info("Offsets updated"));
                Ok(())
            }
            Err(err) => Err(self.fail("Failed to set zero", err)),
        }
    }

    /// Gain phase for one cell; `weight_text` must parse to a finite number
    pub async fn calibrate_gain(&mut self, cell: usize, weight_text: &str) -> Result<()> {
        let weight = self
            .ctx
            .calibration
            .begin_gain(cell, weight_text)
            .map_err(|e| self.reject(e))?;
        self.emit_calibration();

        let result = self.api.calibrate_gain(cell, weight).await;
        let outcome = self.ctx.calibration.finish_gain(cell, result);
        self.emit_calibration();
        match outcome {
            Ok(()) => {
                self.notify(Notification::info(format!("Gain set for Cell {}", cell + 1)));
                Ok(())
            }
            Err(err) => Err(self.fail("Failed to set gain", err)),
        }
    }

    /// Submit the full table at once
    pub async fn save_calibration(&mut self, rows: Vec<CalibrationRow>) -> Result<()> {
        let saved = self
            .api
            .save_calibration(&rows)
            .await
            .map_err(|e| self.fail("Failed to save calibration", e))?;
        self.ctx.calibration.set_rows(saved);
        self.emit_calibration();
        self.notify(Notification::info("Calibration saved"));
        let _ = self.refresh_system().await;
        Ok(())
    }

    /// Import a calibration file; a confirmation request is surfaced as an event
    pub async fn import_calibration(
        &mut self,
        content: String,
        filename: String,
        force: bool,
    ) -> Result<()> {
        let content = content.trim_start_matches('\u{feff}').to_string();
        if content.trim().is_empty() {
            return Err(self.reject(PanelError::Validation(
                "Calibration file is empty".to_string(),
            )));
        }
        let request = CalibrationImport {
            content,
            filename,
            force,
        };
        match self.api.import_calibration(&request).await {
            Ok(reply) => {
                self.ctx.calibration.set_rows(reply.calibration);
                self.emit_calibration();
                self.notify(Notification::info("Calibration imported"));
                let _ = self.refresh_system().await;
                self.poll_status().await;
                Ok(())
            }
            Err(PanelError::ConfirmationRequired { reason }) => {
                tracing::info!("Import needs confirmation: {}", reason);
                self.emit(SessionEvent::ImportNeedsConfirmation(reason));
                Err(PanelError::ConfirmationRequired { reason })
            }
            Err(err) => Err(self.fail("Failed to import calibration", err)),
        }
    }

    /// Current calibration file as CSV
    pub async fn export_calibration(&mut self) -> Result<String> {
        let text = self
            .api
            .export_calibration()
            .await
            .map_err(|e| self.fail("Failed to export calibration", e))?;
        self.emit(SessionEvent::CalibrationExported(text.clone()));
        Ok(text)
    }

    /// Calibration missing on real, reachable hardware
    pub fn calibration_warning(&self) -> bool {
        self.ctx.connection.calibration_warning()
    }

    // ==================== Operations: Reports ====================

    pub async fn refresh_saved_tests(&mut self) -> Result<()> {
        let files = self
            .api
            .saved_tests()
            .await
            .map_err(|e| self.fail("Failed to list saved tests", e))?;
        self.ctx.series.retain_selections(&files);
        self.ctx.saved_tests = files.clone();
        self.emit(SessionEvent::SavedTests(files));
        Ok(())
    }

    pub async fn select_saved_test(&mut self, side: ReportSide, file: Option<String>) -> Result<()> {
        self.ctx.series.select_saved(side, file);
        self.auto_compare().await
    }

    pub async fn load_local_report(
        &mut self,
        side: ReportSide,
        content: String,
        name: String,
    ) -> Result<()> {
        self.ctx.series.set_local_report(side, content, name);
        self.auto_compare().await
    }

    /// Compare whatever the selections allow; single mode only for one saved test
    pub async fn auto_compare(&mut self) -> Result<()> {
        match self.ctx.series.compare_source() {
            CompareSource::Nothing => Ok(()),
            CompareSource::SingleSaved { side, file } => self.show_single(side, &file).await,
            _ => self.compare_reports().await,
        }
    }

    /// Compare two sources: uploaded pair first, else saved pair
    pub async fn compare_reports(&mut self) -> Result<()> {
        match self.ctx.series.compare_source() {
            CompareSource::LocalPair => {
                self.ctx.series.apply_local_comparison();
                self.emit_report();
                self.notify(Notification::info("Compared local files"));
                Ok(())
            }
            CompareSource::SavedPair { file_a, file_b } => {
                let reply = self
                    .api
                    .compare_reports(&file_a, &file_b)
                    .await
                    .map_err(|e| self.fail("Failed to compare tests", e))?;
                self.ctx.series.set_comparison(
                    reply.values_a,
                    reply.values_b,
                    label_for(&file_a, ReportSide::A),
                    label_for(&file_b, ReportSide::B),
                );
                self.emit_report();
                self.notify(Notification::info("Compared saved tests"));
                Ok(())
            }
            _ => Err(self.reject(PanelError::Validation(
                "Select two tests or upload files".to_string(),
            ))),
        }
    }

    async fn show_single(&mut self, side: ReportSide, file: &str) -> Result<()> {
        let reply = self
            .api
            .single_report(file)
            .await
            .map_err(|e| self.fail("Failed to load test", e))?;
        self.ctx
            .series
            .set_single(side, reply.values, base_name(file).to_string());
        self.emit_report();
        self.notify(Notification::info(format!("Showing: {}", base_name(file))));
        Ok(())
    }

    // ==================== Operations: Settings ====================

    pub async fn refresh_settings(&mut self) -> Result<()> {
        let settings = self
            .api
            .settings()
            .await
            .map_err(|e| self.fail("Failed to load settings", e))?;
        self.ctx.settings = settings.clone();
        self.emit(SessionEvent::SettingsUpdated(settings));
        Ok(())
    }

    /// Save data directory and chart ceiling; a blank or invalid ceiling clears it
    pub async fn save_settings(&mut self, data_dir: String, plot_max_text: &str) -> Result<()> {
        let update = SettingsUpdate {
            data_dir,
            plot_max_x: parse_ceiling(plot_max_text),
        };
        self.api
            .save_settings(&update)
            .await
            .map_err(|e| self.fail("Failed to save settings", e))?;
        self.notify(Notification::info("Settings saved"));
        let _ = self.refresh_settings().await;
        self.poll_measurements().await;
        let _ = self.auto_compare().await;
        Ok(())
    }

    /// `<dataDir>/measurements` in the separator style of `dataDir`
    pub fn measurements_dir(&self) -> String {
        self.ctx.settings.measurements_dir()
    }

    // ==================== Operations: System ====================

    pub async fn refresh_system(&mut self) -> Result<()> {
        let system = self
            .api
            .system_info()
            .await
            .map_err(|e| self.fail("Failed to load system info", e))?;
        self.ctx.system = system.clone();
        self.emit(SessionEvent::SystemUpdated(system));
        Ok(())
    }

    pub async fn set_serial(&mut self, serial: &str) -> Result<()> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(self.reject(PanelError::Validation(
                "Enter a serial number".to_string(),
            )));
        }
        let system = self
            .api
            .set_serial(serial)
            .await
            .map_err(|e| self.fail("Failed to set serial", e))?;
        self.ctx.system = system.clone();
        self.emit(SessionEvent::SystemUpdated(system));
        self.notify(Notification::info("Serial updated"));
        let _ = self.refresh_calibration().await;
        Ok(())
    }

    pub async fn set_system_wifi(&mut self, ssid: &str, password: &str) -> Result<()> {
        let credentials =
            credentials(ssid, password, "Enter WiFi SSID").map_err(|e| self.reject(e))?;
        let system = self
            .api
            .set_system_wifi(&credentials)
            .await
            .map_err(|e| self.fail("Failed to save WiFi", e))?;
        self.ctx.system = system.clone();
        self.emit(SessionEvent::SystemUpdated(system));
        self.notify(Notification::info("WiFi saved"));
        Ok(())
    }

    pub async fn wifi_networks(&mut self) -> Result<Vec<crate::types::WifiNetwork>> {
        let networks = self
            .api
            .wifi_networks()
            .await
            .map_err(|e| self.fail("Failed to list WiFi", e))?;
        self.emit(SessionEvent::WifiNetworks(networks.clone()));
        Ok(networks)
    }

    pub async fn connect_wifi(&mut self, ssid: &str, password: &str) -> Result<()> {
        let credentials =
            credentials(ssid, password, "Select a WiFi network").map_err(|e| self.reject(e))?;
        self.api
            .connect_wifi(&credentials)
            .await
            .map_err(|e| self.fail("Failed to connect WiFi", e))?;
        tracing::info!("Joining WiFi network {}", credentials.ssid);
        self.notify(Notification::info("Connecting to WiFi"));
        let _ = self.refresh_system().await;
        Ok(())
    }

    // ==================== Operations: Access ====================

    /// Register a tap on the brand title
    pub fn tap_brand(&mut self) -> bool {
        let prompt = self.ctx.access.tap();
        if prompt {
            self.emit(SessionEvent::AccessPrompt);
        }
        prompt
    }

    /// Check an access code and open the unlocked view
    pub async fn submit_access_code(&mut self, code: &str) -> Result<AccessOutcome> {
        let outcome = self.ctx.access.submit(code);
        match outcome {
            AccessOutcome::Unlocked(view) => {
                self.set_view(view).await?;
                let message = match view {
                    View::Factory => "Factory settings unlocked",
                    _ => "Calibration unlocked",
                };
                self.notify(Notification::info(message));
            }
            AccessOutcome::Denied => {
                self.notify(Notification::warning("Access denied"));
            }
            AccessOutcome::Cancelled => {}
        }
        Ok(outcome)
    }

    // ==================== Charts ====================

    /// Measurement chart: frozen baseline under the live profile
    pub fn render_measurement_chart(&self) -> RenderPlan {
        let (series, colors) = self.ctx.series.measurement_chart();
        let count = series.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let labels = depth_labels(count, self.chart.depth_step_cm);
        ChartProjector::new(MEASUREMENT_CHART_ID, self.chart.clone())
            .project(&series, &labels, self.ctx.settings.plot_ceiling())
            .paint(&colors)
    }

    /// Reports chart: A and B, or the single shown side
    pub fn render_report_chart(&self) -> RenderPlan {
        let (series, colors) = self.ctx.series.report_chart();
        let count = series.iter().map(Vec::len).max().unwrap_or(0);
        let labels = depth_labels(count, self.chart.depth_step_cm);
        ChartProjector::new(REPORT_CHART_ID, self.chart.clone())
            .project(&series, &labels, self.ctx.settings.plot_ceiling())
            .paint(&colors)
    }
}

/// Chart ceiling typed by the operator; `None` unless finite and positive
pub fn parse_ceiling(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn credentials(ssid: &str, password: &str, missing: &str) -> Result<WifiCredentials> {
    let ssid = ssid.trim();
    if ssid.is_empty() {
        return Err(PanelError::Validation(missing.to_string()));
    }
    Ok(WifiCredentials {
        ssid: ssid.to_string(),
        password: password.to_string(),
    })
}

fn label_for(file: &str, side: ReportSide) -> String {
    let name = base_name(file);
    if name.is_empty() {
        side.default_label().to_string()
    } else {
        name.to_string()
    }
}
