//! Live, frozen and report series
//!
//! Pure data: nothing in here talks to the backend. The controller feeds
//! poll results and report replies in, and reads chart inputs and table
//! rows out.

use super::csv_series;
use crate::analysis::{format_reading, FROZEN_COLOR, LIVE_COLOR, REPORT_A_COLOR, REPORT_B_COLOR};
use crate::types::{CellStatus, Measurement, ReportSeries};

/// Default label of report side A
pub const DEFAULT_LABEL_A: &str = "Test 1";
/// Default label of report side B
pub const DEFAULT_LABEL_B: &str = "Test 2";

/// Side of the report comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportSide {
    A,
    B,
}

impl ReportSide {
    pub fn color(&self) -> &'static str {
        match self {
            ReportSide::A => REPORT_A_COLOR,
            ReportSide::B => REPORT_B_COLOR,
        }
    }

    pub fn default_label(&self) -> &'static str {
        match self {
            ReportSide::A => DEFAULT_LABEL_A,
            ReportSide::B => DEFAULT_LABEL_B,
        }
    }
}

/// An uploaded test file
#[derive(Debug, Clone, PartialEq)]
pub struct LocalReport {
    pub name: String,
    pub content: String,
    pub values: Vec<f64>,
}

/// What the reports chart currently shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    #[default]
    Empty,
    Comparison,
    Single(ReportSide),
}

/// Which comparison the current selections call for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareSource {
    /// Both sides uploaded
    LocalPair,
    /// Both sides picked from saved tests
    SavedPair { file_a: String, file_b: String },
    /// Exactly one saved test picked
    SingleSaved { side: ReportSide, file: String },
    Nothing,
}

/// One row of the live measurement table
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    /// 1-based cell number
    pub cell: usize,
    pub status: CellStatus,
    pub value: String,
    pub raw: String,
}

/// One row of the report table
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// 1-based cell number
    pub cell: usize,
    pub value_a: String,
    pub value_b: String,
}

/// Series held by a session
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    measurements: Vec<Measurement>,
    frozen: Option<Vec<f64>>,
    report_a: ReportSeries,
    report_b: ReportSeries,
    report_mode: ReportMode,
    local_a: Option<LocalReport>,
    local_b: Option<LocalReport>,
    selected_a: Option<String>,
    selected_b: Option<String>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Live / Frozen ====================

    /// Replace the live readings with a new poll result
    pub fn set_measurements(&mut self, measurements: Vec<Measurement>) {
        self.measurements = measurements;
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn live_values(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.value).collect()
    }

    /// Snapshot the live values as the baseline; false when nothing is live
    pub fn freeze(&mut self) -> bool {
        if self.measurements.is_empty() {
            return false;
        }
        self.frozen = Some(self.live_values());
        true
    }

    pub fn clear_frozen(&mut self) {
        self.frozen = None;
    }

    pub fn frozen(&self) -> Option<&[f64]> {
        self.frozen.as_deref()
    }

    /// Series for the measurement chart, frozen (if any) under live
    pub fn measurement_chart(&self) -> (Vec<Vec<f64>>, Vec<&'static str>) {
        let mut series = Vec::with_capacity(2);
        let mut colors = Vec::with_capacity(2);
        if let Some(frozen) = self.frozen.as_ref().filter(|f| !f.is_empty()) {
            series.push(frozen.clone());
            colors.push(FROZEN_COLOR);
        }
        series.push(self.live_values());
        colors.push(LIVE_COLOR);
        (series, colors)
    }

    pub fn measurement_rows(&self) -> Vec<MeasurementRow> {
        self.measurements
            .iter()
            .map(|m| MeasurementRow {
                cell: m.cell_index + 1,
                status: m.status,
                value: m.display_value(),
                raw: m
                    .raw_value
                    .map(|r| format_reading(r, 2))
                    .unwrap_or_else(|| "-".to_string()),
            })
            .collect()
    }

    // ==================== Report Sources ====================

    /// Store an uploaded file for one side
    pub fn set_local_report(&mut self, side: ReportSide, content: String, name: String) {
        let report = LocalReport {
            values: csv_series::parse(&content),
            name,
            content,
        };
        match side {
            ReportSide::A => self.local_a = Some(report),
            ReportSide::B => self.local_b = Some(report),
        }
    }

    pub fn clear_local_report(&mut self, side: ReportSide) {
        match side {
            ReportSide::A => self.local_a = None,
            ReportSide::B => self.local_b = None,
        }
    }

    pub fn local_report(&self, side: ReportSide) -> Option<&LocalReport> {
        match side {
            ReportSide::A => self.local_a.as_ref(),
            ReportSide::B => self.local_b.as_ref(),
        }
    }

    /// Pick (or clear) the saved test for one side, dropping that side's upload
    pub fn select_saved(&mut self, side: ReportSide, file: Option<String>) {
        let file = file.filter(|f| !f.is_empty());
        self.clear_local_report(side);
        match side {
            ReportSide::A => self.selected_a = file,
            ReportSide::B => self.selected_b = file,
        }
    }

    pub fn selected(&self, side: ReportSide) -> Option<&str> {
        match side {
            ReportSide::A => self.selected_a.as_deref(),
            ReportSide::B => self.selected_b.as_deref(),
        }
    }

    /// Drop selections that no longer exist on the backend
    pub fn retain_selections(&mut self, available: &[String]) {
        for selected in [&mut self.selected_a, &mut self.selected_b] {
            if selected.as_ref().is_some_and(|s| !available.contains(s)) {
                *selected = None;
            }
        }
    }

    /// Decide what auto-compare should do; comparison wins over single
    pub fn compare_source(&self) -> CompareSource {
        if self.local_a.is_some() && self.local_b.is_some() {
            return CompareSource::LocalPair;
        }
        match (&self.selected_a, &self.selected_b) {
            (Some(a), Some(b)) => CompareSource::SavedPair {
                file_a: a.clone(),
                file_b: b.clone(),
            },
            (Some(a), None) => CompareSource::SingleSaved {
                side: ReportSide::A,
                file: a.clone(),
            },
            (None, Some(b)) => CompareSource::SingleSaved {
                side: ReportSide::B,
                file: b.clone(),
            },
            (None, None) => CompareSource::Nothing,
        }
    }

    // ==================== Report Results ====================

    /// Show both uploaded files; false unless both sides are uploaded
    pub fn apply_local_comparison(&mut self) -> bool {
        let (Some(a), Some(b)) = (&self.local_a, &self.local_b) else {
            return false;
        };
        let label_a = non_empty(&a.name).unwrap_or(DEFAULT_LABEL_A).to_string();
        let label_b = non_empty(&b.name).unwrap_or(DEFAULT_LABEL_B).to_string();
        let (values_a, values_b) = (a.values.clone(), b.values.clone());
        self.set_comparison(values_a, values_b, label_a, label_b);
        true
    }

    pub fn set_comparison(
        &mut self,
        values_a: Vec<f64>,
        values_b: Vec<f64>,
        label_a: impl Into<String>,
        label_b: impl Into<String>,
    ) {
        self.report_a = ReportSeries::new(values_a, label_a);
        self.report_b = ReportSeries::new(values_b, label_b);
        self.report_mode = ReportMode::Comparison;
    }

    /// Show one saved test; the other side is emptied and labeled `-`
    pub fn set_single(&mut self, side: ReportSide, values: Vec<f64>, label: impl Into<String>) {
        let shown = ReportSeries::new(values, label);
        let blank = ReportSeries::new(Vec::new(), "-");
        match side {
            ReportSide::A => {
                self.report_a = shown;
                self.report_b = blank;
            }
            ReportSide::B => {
                self.report_a = blank;
                self.report_b = shown;
            }
        }
        self.report_mode = ReportMode::Single(side);
    }

    pub fn report_mode(&self) -> ReportMode {
        self.report_mode
    }

    pub fn report(&self, side: ReportSide) -> &ReportSeries {
        match side {
            ReportSide::A => &self.report_a,
            ReportSide::B => &self.report_b,
        }
    }

    /// Series and colors for the reports chart
    pub fn report_chart(&self) -> (Vec<Vec<f64>>, Vec<&'static str>) {
        match self.report_mode {
            ReportMode::Empty => (Vec::new(), Vec::new()),
            ReportMode::Comparison => (
                vec![self.report_a.values.clone(), self.report_b.values.clone()],
                vec![REPORT_A_COLOR, REPORT_B_COLOR],
            ),
            ReportMode::Single(side) => (vec![self.report(side).values.clone()], vec![side.color()]),
        }
    }

    /// Table rows over the longer of the two sides, `-` where a side is short
    pub fn report_rows(&self) -> Vec<ReportRow> {
        let len = self.report_a.values.len().max(self.report_b.values.len());
        let cell = |values: &[f64], i: usize| {
            values
                .get(i)
                .map(|v| format_reading(*v, 5))
                .unwrap_or_else(|| "-".to_string())
        };
        (0..len)
            .map(|i| ReportRow {
                cell: i + 1,
                value_a: cell(&self.report_a.values, i),
                value_b: cell(&self.report_b.values, i),
            })
            .collect()
    }
}

fn non_empty(s: &str) -> Option<&str> {
    Some(s).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(values: &[f64]) -> Vec<Measurement> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Measurement::new(i, *v))
            .collect()
    }

    #[test]
    fn test_freeze_is_a_snapshot() {
        let mut store = SeriesStore::new();
        assert!(!store.freeze());
        store.set_measurements(live(&[10.1, 9.8, 10.0]));
        assert!(store.freeze());
        store.set_measurements(live(&[11.0, 12.0, 13.0]));
        assert_eq!(store.frozen(), Some(&[10.1, 9.8, 10.0][..]));
        store.clear_frozen();
        assert_eq!(store.frozen(), None);
    }

    #[test]
    fn test_frozen_drawn_under_live() {
        let mut store = SeriesStore::new();
        store.set_measurements(live(&[1.0, 2.0]));
        let (series, colors) = store.measurement_chart();
        assert_eq!(series.len(), 1);
        assert_eq!(colors, vec![LIVE_COLOR]);

        store.freeze();
        store.set_measurements(live(&[3.0, 4.0]));
        let (series, colors) = store.measurement_chart();
        assert_eq!(series, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(colors, vec![FROZEN_COLOR, LIVE_COLOR]);
    }

    #[test]
    fn test_measurement_rows() {
        let mut store = SeriesStore::new();
        store.set_measurements(vec![
            Measurement::new(0, 1.5).with_raw(1023.456),
            Measurement::new(1, f64::NAN),
            Measurement::new(2, 4.0).with_status(CellStatus::Disconnected),
        ]);
        let rows = store.measurement_rows();
        assert_eq!(rows[0].cell, 1);
        assert_eq!(rows[0].value, "1.50000");
        assert_eq!(rows[0].raw, "1023.46");
        assert_eq!(rows[1].value, "Error");
        assert_eq!(rows[2].value, "Error");
        assert_eq!(rows[2].raw, "-");
    }

    #[test]
    fn test_compare_source_precedence() {
        let mut store = SeriesStore::new();
        assert_eq!(store.compare_source(), CompareSource::Nothing);

        store.select_saved(ReportSide::B, Some("b.csv".into()));
        assert_eq!(
            store.compare_source(),
            CompareSource::SingleSaved {
                side: ReportSide::B,
                file: "b.csv".into()
            }
        );

        store.select_saved(ReportSide::A, Some("a.csv".into()));
        assert!(matches!(store.compare_source(), CompareSource::SavedPair { .. }));

        store.set_local_report(ReportSide::A, "h\n1,1".into(), "one.csv".into());
        assert!(matches!(store.compare_source(), CompareSource::SavedPair { .. }));
        store.set_local_report(ReportSide::B, "h\n1,2".into(), "".into());
        assert_eq!(store.compare_source(), CompareSource::LocalPair);

        store.select_saved(ReportSide::A, Some(String::new()));
        assert_eq!(store.selected(ReportSide::A), None);
        assert!(store.local_report(ReportSide::A).is_none());
        assert_eq!(
            store.compare_source(),
            CompareSource::SingleSaved {
                side: ReportSide::B,
                file: "b.csv".into()
            }
        );
    }

    #[test]
    fn test_selecting_saved_drops_that_sides_upload() {
        let mut store = SeriesStore::new();
        store.set_local_report(ReportSide::A, "h\n1,1".into(), "a.csv".into());
        store.set_local_report(ReportSide::B, "h\n1,2".into(), "b.csv".into());
        assert_eq!(store.compare_source(), CompareSource::LocalPair);

        store.select_saved(ReportSide::A, Some("saved_x.csv".into()));
        assert!(store.local_report(ReportSide::A).is_none());
        assert!(store.local_report(ReportSide::B).is_some());
        assert!(matches!(store.compare_source(), CompareSource::SingleSaved { .. }));

        store.select_saved(ReportSide::B, Some("saved_y.csv".into()));
        assert_eq!(
            store.compare_source(),
            CompareSource::SavedPair {
                file_a: "saved_x.csv".into(),
                file_b: "saved_y.csv".into()
            }
        );
    }

    #[test]
    fn test_local_comparison_labels() {
        let mut store = SeriesStore::new();
        assert!(!store.apply_local_comparison());
        store.set_local_report(ReportSide::A, "h\n1,1\n2,2".into(), "before.csv".into());
        store.set_local_report(ReportSide::B, "h\n1,3".into(), " ".into());
        assert!(store.apply_local_comparison());
        assert_eq!(store.report(ReportSide::A).label, "before.csv");
        assert_eq!(store.report(ReportSide::B).label, DEFAULT_LABEL_B);
        assert_eq!(store.report_mode(), ReportMode::Comparison);

        let rows = store.report_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].value_a, "2.00000");
        assert_eq!(rows[1].value_b, "-");
    }

    #[test]
    fn test_single_mode() {
        let mut store = SeriesStore::new();
        store.set_single(ReportSide::B, vec![5.0], "run.csv");
        assert_eq!(store.report(ReportSide::A).label, "-");
        assert!(store.report(ReportSide::A).values.is_empty());
        let (series, colors) = store.report_chart();
        assert_eq!(series, vec![vec![5.0]]);
        assert_eq!(colors, vec![REPORT_B_COLOR]);
    }

    #[test]
    fn test_retain_selections() {
        let mut store = SeriesStore::new();
        store.select_saved(ReportSide::A, Some("gone.csv".into()));
        store.select_saved(ReportSide::B, Some("kept.csv".into()));
        store.retain_selections(&["kept.csv".to_string()]);
        assert_eq!(store.selected(ReportSide::A), None);
        assert_eq!(store.selected(ReportSide::B), Some("kept.csv"));
    }
}
