//! Analysis module for chart data
//!
//! This module provides:
//! - Chart projection of depth-indexed load profiles
//! - Number formatting shared by tables and labels

pub mod projection;

pub use projection::{
    depth_labels, AxisLabel, ChartPoint, ChartProjector, GradientFill, ProjectedSeries,
    RenderPlan, FROZEN_COLOR, LIVE_COLOR, REPORT_A_COLOR, REPORT_B_COLOR,
};

/// Format a reading with a fixed number of decimals, `-` when not finite
pub fn format_reading(value: f64, digits: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", digits, value)
    } else {
        "-".to_string()
    }
}
