//! Two-phase calibration workflow
//!
//! Zero phase: `Idle -> ZeroInFlight -> ZeroApplied`, back to `Idle` on
//! failure. Gain phase: per cell, independent of the others, each cell
//! `Pending -> Active -> Done` or back to `Pending` on failure.
//!
//! The workflow only tracks state. The session controller performs the
//! backend calls between `begin_*` and `finish_*`.

use crate::error::{PanelError, Result};
use crate::types::CalibrationRow;

/// Zero-offset phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroPhase {
    #[default]
    Idle,
    ZeroInFlight,
    ZeroApplied,
}

impl ZeroPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ZeroPhase::ZeroInFlight)
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ZeroPhase::ZeroApplied)
    }
}

/// Display state of one calibration row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowState {
    #[default]
    Pending,
    /// A request touching this row is in flight
    Active,
    OffsetsSet,
    /// Gain confirmed in this session
    Done,
}

impl RowState {
    pub fn display_name(&self) -> &'static str {
        match self {
            RowState::Pending => "pending",
            RowState::Active => "active",
            RowState::OffsetsSet => "offsets set",
            RowState::Done => "done",
        }
    }
}

/// Parse the reference weight typed by the operator
pub fn parse_weight(text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite())
        .ok_or_else(|| PanelError::Validation("Enter a valid gain weight".to_string()))
}

/// Calibration rows plus zero/gain workflow state
#[derive(Debug, Clone, Default)]
pub struct CalibrationWorkflow {
    rows: Vec<CalibrationRow>,
    states: Vec<RowState>,
    gain_in_flight: Vec<bool>,
    zero: ZeroPhase,
}

impl CalibrationWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[CalibrationRow] {
        &self.rows
    }

    pub fn row_states(&self) -> &[RowState] {
        &self.states
    }

    pub fn zero_phase(&self) -> ZeroPhase {
        self.zero
    }

    /// `gain_confirmed` of every row, in order
    pub fn gain_confirmed(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.gain_confirmed).collect()
    }

    /// Zero control is usable
    pub fn zero_enabled(&self) -> bool {
        !self.zero.is_in_flight()
    }

    /// Gain control of `cell` is usable
    pub fn gain_enabled(&self, cell: usize) -> bool {
        !self.zero.is_in_flight()
            && cell < self.rows.len()
            && !self.gain_in_flight.get(cell).copied().unwrap_or(false)
    }

    fn settled_state(&self, row: &CalibrationRow) -> RowState {
        if row.gain_confirmed {
            RowState::Done
        } else if self.zero.is_applied() {
            RowState::OffsetsSet
        } else {
            RowState::Pending
        }
    }

    /// Replace rows with a fresh table from the backend
    ///
    /// Confirmation flags survive when the row count is unchanged and are
    /// reset otherwise. Rows with a request in flight stay active.
    pub fn set_rows(&mut self, rows: Vec<CalibrationRow>) {
        let keep_flags = rows.len() == self.rows.len();
        let previous: Vec<bool> = self.gain_confirmed();
        self.rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, mut row)| {
                row.gain_confirmed = keep_flags && previous.get(idx).copied().unwrap_or(false);
                row
            })
            .collect();
        self.gain_in_flight.resize(self.rows.len(), false);
        self.states = self
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                if self.zero.is_in_flight() || self.gain_in_flight[idx] {
                    RowState::Active
                } else {
                    self.settled_state(row)
                }
            })
            .collect();
    }

    // ==================== Zero Phase ====================

    /// Enter `ZeroInFlight`: every row active, zero control disabled
    pub fn begin_zero(&mut self) -> Result<()> {
        if self.zero.is_in_flight() {
            return Err(PanelError::WorkflowConflict(
                "Zero calibration already running".to_string(),
            ));
        }
        if self.gain_in_flight.iter().any(|f| *f) {
            return Err(PanelError::WorkflowConflict(
                "Gain calibration in progress".to_string(),
            ));
        }
        self.zero = ZeroPhase::ZeroInFlight;
        self.states.iter_mut().for_each(|s| *s = RowState::Active);
        Ok(())
    }

    /// Complete the zero phase with the backend's answer
    pub fn finish_zero(&mut self, result: Result<Vec<CalibrationRow>>) -> Result<()> {
        match result {
            Ok(rows) => {
                self.zero = ZeroPhase::ZeroApplied;
                self.rows = rows;
                for row in self.rows.iter_mut() {
                    row.gain_confirmed = false;
                }
                self.gain_in_flight = vec![false; self.rows.len()];
                self.states = vec![RowState::OffsetsSet; self.rows.len()];
                Ok(())
            }
            Err(err) => {
                self.zero = ZeroPhase::Idle;
                self.states.iter_mut().for_each(|s| *s = RowState::Pending);
                Err(err)
            }
        }
    }

    // ==================== Gain Phase ====================

    /// Validate the weight and mark `cell` active; no state change on error
    pub fn begin_gain(&mut self, cell: usize, weight_text: &str) -> Result<f64> {
        let weight = parse_weight(weight_text)?;
        if cell >= self.rows.len() {
            return Err(PanelError::Validation(format!("Cell {} does not exist", cell + 1)));
        }
        if !self.gain_enabled(cell) {
            return Err(PanelError::WorkflowConflict(format!(
                "Cell {} is busy",
                cell + 1
            )));
        }
        self.gain_in_flight[cell] = true;
        self.states[cell] = RowState::Active;
        Ok(weight)
    }

    /// Complete a gain request for `cell`
    pub fn finish_gain(&mut self, cell: usize, result: Result<Vec<CalibrationRow>>) -> Result<()> {
        if let Some(flag) = self.gain_in_flight.get_mut(cell) {
            *flag = false;
        }
        match result {
            Ok(rows) => {
                self.set_rows(rows);
                if let Some(row) = self.rows.get_mut(cell) {
                    row.gain_confirmed = true;
                }
                if let Some(state) = self.states.get_mut(cell) {
                    *state = RowState::Done;
                }
                Ok(())
            }
            Err(err) => {
                if let Some(state) = self.states.get_mut(cell) {
                    *state = RowState::Pending;
                }
                Err(err)
            }
        }
    }
}
