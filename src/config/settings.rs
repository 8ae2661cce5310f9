//! Runtime settings for polling cadence and chart geometry
//!
//! These settings are part of the client configuration file but are also
//! handed directly to the scheduler and the chart projector, so they live
//! apart from the file-handling code in the parent module.
//!
//! # Main Types
//!
//! - [`PollIntervals`] - Periods of the recurring polling loops and the
//!   bounds of the connect-retry loop
//! - [`ChartLayout`] - Viewport size and margins used for projection

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Period of the idle status poll (ms)
pub const DEFAULT_STATUS_POLL_MS: u64 = 2000;

/// Period of the raw-value poll (ms)
pub const DEFAULT_RAW_POLL_MS: u64 = 1000;

/// Period of the continuous measurement loop (ms)
pub const DEFAULT_CONTINUOUS_MS: u64 = 1200;

/// Period of the measurement preview loop (ms)
pub const DEFAULT_PREVIEW_MS: u64 = 1000;

/// Period of the connect-retry loop (ms)
pub const DEFAULT_CONNECT_RETRY_MS: u64 = 1000;

/// Maximum connect-retry attempts before giving up
pub const DEFAULT_CONNECT_RETRY_ATTEMPTS: u32 = 40;

/// Depth represented by one cell on the chart (cm)
pub const DEFAULT_DEPTH_STEP_CM: u32 = 15;

/// Periods of the polling loops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollIntervals {
    /// Status refresh while idle
    pub status_ms: u64,
    /// Measurement refresh while raw values are displayed
    pub raw_ms: u64,
    /// Measurement + status refresh in continuous mode
    pub continuous_ms: u64,
    /// Measurement refresh on the measurement view
    pub preview_ms: u64,
    /// Status refresh after a connect request
    pub connect_retry_ms: u64,
    /// Upper bound on connect-retry iterations
    pub connect_retry_attempts: u32,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            status_ms: DEFAULT_STATUS_POLL_MS,
            raw_ms: DEFAULT_RAW_POLL_MS,
            continuous_ms: DEFAULT_CONTINUOUS_MS,
            preview_ms: DEFAULT_PREVIEW_MS,
            connect_retry_ms: DEFAULT_CONNECT_RETRY_MS,
            connect_retry_attempts: DEFAULT_CONNECT_RETRY_ATTEMPTS,
        }
    }
}

impl PollIntervals {
    /// Status poll period
    pub fn status(&self) -> Duration {
        Duration::from_millis(self.status_ms.max(1))
    }

    /// Raw poll period
    pub fn raw(&self) -> Duration {
        Duration::from_millis(self.raw_ms.max(1))
    }

    /// Continuous measurement period
    pub fn continuous(&self) -> Duration {
        Duration::from_millis(self.continuous_ms.max(1))
    }

    /// Preview period
    pub fn preview(&self) -> Duration {
        Duration::from_millis(self.preview_ms.max(1))
    }

    /// Connect-retry period
    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms.max(1))
    }
}

/// Geometry of a chart viewport
///
/// Values are in viewport units. The plot area spans
/// `[left, width - right_inset]` horizontally and
/// `[axis_pad, height - axis_pad]` vertically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartLayout {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub right_inset: f64,
    pub axis_pad: f64,
    /// Number of horizontal grid lines
    pub grid_lines: usize,
    /// Depth per index step, used for axis labels
    pub depth_step_cm: u32,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            width: 620.0,
            height: 240.0,
            left: 42.0,
            right_inset: 20.0,
            axis_pad: 18.0,
            grid_lines: 6,
            depth_step_cm: DEFAULT_DEPTH_STEP_CM,
        }
    }
}

impl ChartLayout {
    /// Left edge of the plot area
    pub fn left_margin(&self) -> f64 {
        self.left
    }

    /// Right edge of the plot area, never left of the left edge
    pub fn right_margin(&self) -> f64 {
        (self.width - self.right_inset).max(self.left)
    }

    /// Top edge of the plot area
    pub fn top_margin(&self) -> f64 {
        self.axis_pad
    }

    /// Bottom edge of the plot area, never above the top edge
    pub fn bottom_margin(&self) -> f64 {
        (self.height - self.axis_pad).max(self.axis_pad)
    }

    pub fn plot_width(&self) -> f64 {
        self.right_margin() - self.left_margin()
    }

    pub fn plot_height(&self) -> f64 {
        self.bottom_margin() - self.top_margin()
    }
}
