//! Integration tests for saving, freezing and comparing measurements
//!
//! These tests validate:
//! - Frozen baseline snapshots on save
//! - Auto-compare of saved and uploaded tests
//! - Settings that feed the charts

mod common;

use cmeasure_rs::backend::Endpoint;
use cmeasure_rs::session::{PollTask, ReportMode, ReportSide, SessionEvent};
use cmeasure_rs::types::View;
use common::builders::{ConfigBuilder, InstrumentBuilder};
use common::mock_helpers::{notifications, started_session, step_n};

#[tokio::test(start_paused = true)]
async fn test_save_freezes_the_saved_values() {
    let instrument = InstrumentBuilder::new(3)
        .connected()
        .values(&[10.1, 9.8, 10.0])
        .build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;
    controller.set_view(View::Measurements).await.unwrap();
    handle.drain();

    let file = controller.save_measurement(None).await.unwrap();
    assert_eq!(file.as_deref(), Some("test_001.csv"));
    assert_eq!(controller.context().last_test.as_deref(), Some("test_001.csv"));
    assert_eq!(
        controller.context().series.frozen(),
        Some(&[10.1, 9.8, 10.0][..])
    );
    assert!(controller
        .context()
        .saved_tests
        .contains(&"test_001.csv".to_string()));

    instrument.set_values(&[12.0, 11.0, 13.5]);
    step_n(&mut controller, 3).await;

    let ctx = controller.context();
    assert_eq!(ctx.series.frozen(), Some(&[10.1, 9.8, 10.0][..]));
    assert_eq!(ctx.series.live_values(), vec![12.0, 11.0, 13.5]);

    // Frozen is drawn first, under the live profile
    let plan = controller.render_measurement_chart();
    assert_eq!(plan.series.len(), 2);
    assert_eq!(plan.series[0].fill.id, "load-plot-grad-0");
    assert_eq!(plan.labels.len(), 3);
    assert_eq!(plan.labels[0].text, "15 cm");
}

#[tokio::test(start_paused = true)]
async fn test_named_save_and_clear_frozen() {
    let instrument = InstrumentBuilder::new(2).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;

    let file = controller
        .save_measurement(Some("  run_a  ".to_string()))
        .await
        .unwrap();
    assert_eq!(file.as_deref(), Some("run_a.csv"));
    assert!(notifications(&handle).contains(&"Measurement saved".to_string()));

    controller.clear_frozen();
    assert_eq!(controller.context().series.frozen(), None);
    assert_eq!(controller.render_measurement_chart().series.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_set_refreshes_readings() {
    let instrument = InstrumentBuilder::new(2).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    controller.zero_set().await.unwrap();
    assert_eq!(controller.context().series.live_values(), vec![0.0, 0.0]);
}

#[tokio::test(start_paused = true)]
async fn test_one_saved_test_shows_single() {
    let instrument = InstrumentBuilder::new(2)
        .connected()
        .saved_test("data/measurements/a.csv", &[1.0, 2.0])
        .build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;
    handle.drain();

    controller
        .select_saved_test(ReportSide::A, Some("data/measurements/a.csv".into()))
        .await
        .unwrap();

    let series = &controller.context().series;
    assert_eq!(series.report_mode(), ReportMode::Single(ReportSide::A));
    assert_eq!(series.report(ReportSide::A).label, "a.csv");
    assert_eq!(series.report(ReportSide::B).label, "-");
    assert_eq!(instrument.calls(Endpoint::SingleReport), 1);
    assert_eq!(instrument.calls(Endpoint::CompareReports), 0);
    assert!(notifications(&handle).contains(&"Showing: a.csv".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_two_saved_tests_compare() {
    let instrument = InstrumentBuilder::new(2)
        .connected()
        .saved_test("a.csv", &[1.0, 2.0])
        .saved_test("b.csv", &[3.0, 4.0, 5.0])
        .build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;

    controller
        .select_saved_test(ReportSide::A, Some("a.csv".into()))
        .await
        .unwrap();
    handle.drain();
    controller
        .select_saved_test(ReportSide::B, Some("b.csv".into()))
        .await
        .unwrap();

    let events = handle.drain();
    let rows = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::ReportUpdated { rows, .. } => Some(rows.clone()),
            _ => None,
        })
        .expect("report update");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].value_a, "-");
    assert_eq!(rows[2].value_b, "5.00000");

    let series = &controller.context().series;
    assert_eq!(series.report_mode(), ReportMode::Comparison);
    assert_eq!(series.report(ReportSide::B).label, "b.csv");
    assert_eq!(controller.render_report_chart().series.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_uploaded_pair_wins_over_saved() {
    let instrument = InstrumentBuilder::new(2)
        .connected()
        .saved_test("a.csv", &[1.0])
        .saved_test("b.csv", &[2.0])
        .build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;

    controller
        .select_saved_test(ReportSide::A, Some("a.csv".into()))
        .await
        .unwrap();
    controller
        .select_saved_test(ReportSide::B, Some("b.csv".into()))
        .await
        .unwrap();
    instrument.reset_calls();
    handle.drain();

    controller
        .load_local_report(ReportSide::A, "Cell,Value\n1,7\n2,8".into(), "up_a.csv".into())
        .await
        .unwrap();
    // One upload alone still compares the saved pair
    assert_eq!(instrument.calls(Endpoint::CompareReports), 1);

    controller
        .load_local_report(ReportSide::B, "Cell,Value\n1,9".into(), "up_b.csv".into())
        .await
        .unwrap();
    assert_eq!(instrument.calls(Endpoint::CompareReports), 1);
    let series = &controller.context().series;
    assert_eq!(series.report(ReportSide::A).values, vec![7.0, 8.0]);
    assert_eq!(series.report(ReportSide::B).label, "up_b.csv");
    assert!(notifications(&handle).contains(&"Compared local files".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_saved_selection_replaces_uploads() {
    let instrument = InstrumentBuilder::new(2)
        .connected()
        .saved_test("saved_x.csv", &[1.0, 2.0])
        .saved_test("saved_y.csv", &[3.0])
        .build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;

    controller
        .load_local_report(ReportSide::A, "Cell,Value\n1,7".into(), "a.csv".into())
        .await
        .unwrap();
    controller
        .load_local_report(ReportSide::B, "Cell,Value\n1,9".into(), "b.csv".into())
        .await
        .unwrap();
    assert_eq!(controller.context().series.report(ReportSide::A).label, "a.csv");
    instrument.reset_calls();
    handle.drain();

    controller
        .select_saved_test(ReportSide::A, Some("saved_x.csv".into()))
        .await
        .unwrap();
    // Only A has a saved test now, and B's upload alone cannot pair
    assert_eq!(instrument.calls(Endpoint::SingleReport), 1);
    assert_eq!(instrument.calls(Endpoint::CompareReports), 0);

    controller
        .select_saved_test(ReportSide::B, Some("saved_y.csv".into()))
        .await
        .unwrap();
    assert_eq!(instrument.calls(Endpoint::CompareReports), 1);

    let series = &controller.context().series;
    assert!(series.local_report(ReportSide::A).is_none());
    assert!(series.local_report(ReportSide::B).is_none());
    assert_eq!(series.report_mode(), ReportMode::Comparison);
    assert_eq!(series.report(ReportSide::A).label, "saved_x.csv");
    assert_eq!(series.report(ReportSide::A).values, vec![1.0, 2.0]);
    assert_eq!(series.report(ReportSide::B).values, vec![3.0]);
    assert!(notifications(&handle).contains(&"Compared saved tests".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_compare_needs_two_sources() {
    let instrument = InstrumentBuilder::new(2).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;
    handle.drain();

    assert!(controller.compare_reports().await.is_err());
    assert!(notifications(&handle).contains(&"Select two tests or upload files".to_string()));
    assert_eq!(instrument.calls(Endpoint::CompareReports), 0);
}

#[tokio::test(start_paused = true)]
async fn test_save_settings() {
    let instrument = InstrumentBuilder::new(3)
        .connected()
        .values(&[1.0, 2.0, 3.0])
        .build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    controller
        .save_settings("/srv/cmeasure".into(), "250")
        .await
        .unwrap();
    assert_eq!(instrument.settings_snapshot().plot_max_x, Some(250.0));
    assert_eq!(controller.context().settings.plot_ceiling(), Some(250.0));
    assert_eq!(controller.measurements_dir(), "/srv/cmeasure/measurements");
    assert_eq!(controller.render_measurement_chart().ceiling, 250.0);

    controller
        .save_settings("C:\\cmeasure\\".into(), "not a number")
        .await
        .unwrap();
    assert_eq!(instrument.settings_snapshot().plot_max_x, None);
    assert_eq!(controller.measurements_dir(), "C:\\cmeasure\\measurements");
    assert_eq!(controller.render_measurement_chart().ceiling, 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_measurement_view_polls_preview() {
    let instrument = InstrumentBuilder::new(2).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;
    controller.set_view(View::Measurements).await.unwrap();
    assert_eq!(controller.scheduler().active(), Some(PollTask::Preview));
    instrument.reset_calls();

    step_n(&mut controller, 4).await;
    assert_eq!(instrument.calls(Endpoint::Measurements), 4);
    assert_eq!(instrument.calls(Endpoint::Status), 0);
}
