//! Per-cell connection tracking
//!
//! [`ConnectionStateMachine`] holds the last normalized status of every
//! cell plus the bridge reachability reported alongside it. Each status
//! poll replaces the held sequence wholesale.

use crate::types::{BridgeStatus, CellStatus};

/// Aggregate view of one status poll
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateSummary {
    pub connected_count: usize,
    pub total: usize,
    pub per_cell: Vec<CellStatus>,
}

impl AggregateSummary {
    /// Build a summary from normalized statuses
    pub fn from_statuses(per_cell: Vec<CellStatus>) -> Self {
        Self {
            connected_count: per_cell.iter().filter(|s| s.is_connected()).count(),
            total: per_cell.len(),
            per_cell,
        }
    }

    /// Sidebar headline
    pub fn headline(&self) -> String {
        if self.total > 0 && self.connected_count == self.total {
            "All connected".to_string()
        } else if self.connected_count > 0 {
            format!("{}/{} connected", self.connected_count, self.total)
        } else {
            "Cells disconnected".to_string()
        }
    }

    /// Check if any cell is still attaching
    pub fn any_connecting(&self) -> bool {
        self.per_cell.contains(&CellStatus::Connecting)
    }

    pub fn any_connected(&self) -> bool {
        self.connected_count > 0
    }
}

/// Tracks cell statuses and bridge reachability
#[derive(Debug, Clone, Default)]
pub struct ConnectionStateMachine {
    summary: AggregateSummary,
    bridge: Option<BridgeStatus>,
    calibration_missing: bool,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize raw statuses and replace the held sequence
    pub fn apply_statuses<S: AsRef<str>>(&mut self, statuses: &[S]) -> AggregateSummary {
        let per_cell = statuses
            .iter()
            .map(|s| CellStatus::normalize(s.as_ref()))
            .collect();
        self.summary = AggregateSummary::from_statuses(per_cell);
        self.summary.clone()
    }

    /// Record bridge reachability and calibration presence from a status poll
    pub fn apply_bridge(&mut self, bridge: Option<BridgeStatus>, calibration_missing: bool) {
        self.bridge = bridge;
        self.calibration_missing = calibration_missing;
    }

    pub fn summary(&self) -> &AggregateSummary {
        &self.summary
    }

    pub fn per_cell(&self) -> &[CellStatus] {
        &self.summary.per_cell
    }

    pub fn bridge(&self) -> Option<&BridgeStatus> {
        self.bridge.as_ref()
    }

    /// Bridge is real hardware that did not answer
    pub fn is_offline(&self) -> bool {
        self.bridge.as_ref().is_some_and(|b| b.is_offline())
    }

    /// Calibration is missing on real, reachable hardware
    pub fn calibration_warning(&self) -> bool {
        self.calibration_missing && self.bridge.as_ref().is_some_and(|b| b.is_online())
    }
}
