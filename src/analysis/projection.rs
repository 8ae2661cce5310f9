//! Chart projection for load profiles
//!
//! Maps one or more numeric series onto a 2D viewport with a shared
//! horizontal scale. Readings are indexed by measurement depth rather than
//! time, so each series spreads its own index range over the full plot
//! height: index 0 sits on the bottom edge, the last index on the top edge.
//!
//! The output is a [`RenderPlan`], pure data that a drawing layer can turn
//! into SVG paths or other draw commands.

use crate::config::ChartLayout;

/// Fill colour of the frozen baseline on the measurement chart
pub const FROZEN_COLOR: &str = "#9aa7bd";
/// Fill colour of the live series on the measurement chart
pub const LIVE_COLOR: &str = "#f26a4b";
/// Fill colour of report side A
pub const REPORT_A_COLOR: &str = "#f04d4d";
/// Fill colour of report side B
pub const REPORT_B_COLOR: &str = "#2f7de1";

/// Opacity at the left edge of a series gradient
pub const GRADIENT_START_OPACITY: f64 = 0.55;
/// Opacity at the right edge of a series gradient
pub const GRADIENT_END_OPACITY: f64 = 0.05;

/// A point in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

/// Horizontal gradient used to fill the area under a series
#[derive(Debug, Clone, PartialEq)]
pub struct GradientFill {
    /// Identifier, unique within one chart
    pub id: String,
    /// Stop colour, set by [`RenderPlan::paint`]
    pub color: Option<String>,
    pub x1: f64,
    pub x2: f64,
    pub start_opacity: f64,
    pub end_opacity: f64,
}

/// One projected series
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedSeries {
    /// One point per input value, in index order
    pub points: Vec<ChartPoint>,
    pub fill: GradientFill,
}

impl ProjectedSeries {
    /// Closed area polygon: from the left edge out to the profile and back
    pub fn area(&self, left: f64) -> Vec<ChartPoint> {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return Vec::new();
        };
        let mut outline = Vec::with_capacity(self.points.len() + 2);
        outline.push(ChartPoint { x: left, y: first.y });
        outline.extend_from_slice(&self.points);
        outline.push(ChartPoint { x: left, y: last.y });
        outline
    }
}

/// A label on the depth axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisLabel {
    pub text: String,
    pub y: f64,
}

/// Everything needed to draw one chart
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    /// Value mapped to the right edge
    pub ceiling: f64,
    /// Vertical positions of the dashed grid lines
    pub grid: Vec<f64>,
    pub labels: Vec<AxisLabel>,
    /// Series in drawing order; earlier series are drawn underneath
    pub series: Vec<ProjectedSeries>,
}

impl RenderPlan {
    /// Assign colours to series in order
    pub fn paint(mut self, colors: &[&str]) -> Self {
        for (series, color) in self.series.iter_mut().zip(colors) {
            series.fill.color = Some((*color).to_string());
        }
        self
    }

    /// Check if there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }
}

/// Depth labels: `15 cm`, `30 cm`, ...
pub fn depth_labels(count: usize, step_cm: u32) -> Vec<String> {
    (1..=count)
        .map(|i| format!("{} cm", i as u64 * step_cm as u64))
        .collect()
}

/// Projects series onto a [`ChartLayout`]
#[derive(Debug, Clone)]
pub struct ChartProjector {
    chart_id: String,
    layout: ChartLayout,
}

impl ChartProjector {
    /// Create a projector for the chart named `chart_id`
    pub fn new(chart_id: impl Into<String>, layout: ChartLayout) -> Self {
        Self {
            chart_id: chart_id.into(),
            layout,
        }
    }

    pub fn layout(&self) -> &ChartLayout {
        &self.layout
    }

    /// Scale ceiling: the configured one when finite and positive, otherwise
    /// the largest finite input value, but at least 1
    pub fn ceiling<S: AsRef<[f64]>>(series_list: &[S], ceiling: Option<f64>) -> f64 {
        if let Some(c) = ceiling.filter(|c| c.is_finite() && *c > 0.0) {
            return c;
        }
        series_list
            .iter()
            .flat_map(|s| s.as_ref().iter().copied())
            .filter(|v| v.is_finite())
            .fold(1.0_f64, f64::max)
    }

    /// Project every series with a shared horizontal scale
    pub fn project<S: AsRef<[f64]>>(
        &self,
        series_list: &[S],
        labels: &[String],
        ceiling: Option<f64>,
    ) -> RenderPlan {
        let layout = &self.layout;
        let left = layout.left_margin();
        let right = layout.right_margin();
        let top = layout.top_margin();
        let bottom = layout.bottom_margin();
        let plot_width = right - left;
        let plot_height = bottom - top;
        let max = Self::ceiling(series_list, ceiling);

        let grid = if layout.grid_lines > 1 {
            (0..layout.grid_lines)
                .map(|i| top + (i as f64 * plot_height) / (layout.grid_lines - 1) as f64)
                .collect()
        } else {
            vec![top]
        };

        let label_span = labels.len().saturating_sub(1).max(1) as f64;
        let labels = labels
            .iter()
            .enumerate()
            .map(|(i, text)| AxisLabel {
                text: text.clone(),
                y: bottom - (i as f64 * plot_height) / label_span,
            })
            .collect();

        let series = series_list
            .iter()
            .enumerate()
            .map(|(idx, values)| {
                let values = values.as_ref();
                let span = values.len().saturating_sub(1).max(1) as f64;
                let points = values
                    .iter()
                    .enumerate()
                    .map(|(i, &value)| {
                        // NaN draws at zero; infinities clamp to the edges.
                        let clamped = if value.is_nan() {
                            0.0
                        } else {
                            value.clamp(0.0, max)
                        };
                        let x = (left + (clamped / max) * plot_width).clamp(left, right);
                        let y = bottom - (i as f64 * plot_height) / span;
                        ChartPoint { x, y }
                    })
                    .collect();
                ProjectedSeries {
                    points,
                    fill: GradientFill {
                        id: format!("{}-grad-{}", self.chart_id, idx),
                        color: None,
                        x1: left,
                        x2: right,
                        start_opacity: GRADIENT_START_OPACITY,
                        end_opacity: GRADIENT_END_OPACITY,
                    },
                }
            })
            .collect();

        RenderPlan {
            width: layout.width,
            height: layout.height,
            left,
            right,
            top,
            bottom,
            ceiling: max,
            grid,
            labels,
            series,
        }
    }
}
