//! Integration tests for polling and connection handling
//!
//! These tests drive a session against the in-memory instrument with
//! paused time:
//! - Loop selection across views and modes
//! - Bounded connect retry
//! - Poll failure notifications
//! - Raw display availability

mod common;

use cmeasure_rs::backend::Endpoint;
use cmeasure_rs::session::{AccessOutcome, PollTask, SessionEvent};
use cmeasure_rs::types::{CellStatus, View};
use common::builders::{ConfigBuilder, InstrumentBuilder};
use common::mock_helpers::{notifications, started_session, step_n};

#[tokio::test(start_paused = true)]
async fn test_start_runs_status_poll() {
    let instrument = InstrumentBuilder::new(4).connected().build();
    let config = ConfigBuilder::new().build();
    let (controller, handle) = started_session(&instrument, &config).await;

    assert_eq!(controller.scheduler().active(), Some(PollTask::StatusPoll));
    assert_eq!(controller.context().connection.summary().connected_count, 4);
    assert_eq!(instrument.calls(Endpoint::Measurements), 1);
    assert_eq!(instrument.calls(Endpoint::Calibration), 1);
    assert_eq!(instrument.calls(Endpoint::Settings), 1);
    assert_eq!(instrument.calls(Endpoint::System), 1);
    assert_eq!(instrument.calls(Endpoint::SavedTests), 1);

    let events = handle.drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::PollingChanged(Some(PollTask::StatusPoll)))));
}

#[tokio::test(start_paused = true)]
async fn test_start_fails_without_backend() {
    let instrument = InstrumentBuilder::new(2).build();
    instrument.fail(Endpoint::Status);
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = common::mock_helpers::session_with(&instrument, &config);

    assert!(controller.start().await.is_err());
    assert!(controller.scheduler().is_idle());
    assert_eq!(instrument.calls(Endpoint::Measurements), 0);
}

#[tokio::test(start_paused = true)]
async fn test_loop_follows_view_and_mode() {
    let instrument = InstrumentBuilder::new(3).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    controller.set_view(View::Measurements).await.unwrap();
    assert_eq!(controller.scheduler().active(), Some(PollTask::Preview));

    controller.set_continuous(true).await.unwrap();
    assert_eq!(
        controller.scheduler().active(),
        Some(PollTask::ContinuousMeasure)
    );

    controller.set_view(View::Reports).await.unwrap();
    assert!(!controller.context().continuous);
    assert_eq!(controller.scheduler().active(), Some(PollTask::StatusPoll));
    assert_eq!(controller.scheduler().scheduled_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_continuous_rejected_outside_measurements() {
    let instrument = InstrumentBuilder::new(2).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    let err = controller.set_continuous(true).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(controller.scheduler().active(), Some(PollTask::StatusPoll));
}

#[tokio::test(start_paused = true)]
async fn test_continuous_then_calibration_leaves_nothing_scheduled() {
    let instrument = InstrumentBuilder::new(3).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    controller.set_view(View::Measurements).await.unwrap();
    controller.set_continuous(true).await.unwrap();
    step_n(&mut controller, 2).await;

    let outcome = controller.submit_access_code("cal").await.unwrap();
    assert_eq!(outcome, AccessOutcome::Unlocked(View::Calibration));
    assert_eq!(controller.context().view, View::Calibration);
    assert!(!controller.context().continuous);
    assert!(controller.scheduler().is_idle());
    assert_eq!(controller.scheduler().scheduled_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_calibration_view_cancels_connect_retry() {
    let instrument = InstrumentBuilder::new(2).stuck_connecting().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;

    controller.connect().await.unwrap();
    assert!(controller.scheduler().connect_retry_active());
    handle.drain();

    controller.submit_access_code("cal").await.unwrap();
    assert!(controller.scheduler().is_idle());
    assert!(!controller.context().connecting);
    assert!(handle
        .drain()
        .iter()
        .any(|e| matches!(e, SessionEvent::ConnectControl { enabled: true })));
}

#[tokio::test(start_paused = true)]
async fn test_connect_retry_is_bounded() {
    let instrument = InstrumentBuilder::new(2).stuck_connecting().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    // Preview polls only measurements, so every status call below is the
    // connect follow-up or a retry
    controller.set_view(View::Measurements).await.unwrap();
    instrument.reset_calls();

    controller.connect().await.unwrap();
    assert!(controller.context().connecting);

    let mut ticks = 0;
    while controller.scheduler().connect_retry_active() {
        assert!(controller.step().await);
        ticks += 1;
        assert!(ticks < 500, "connect retry never ended");
    }

    assert_eq!(instrument.calls(Endpoint::Status), 1 + 40);
    assert!(!controller.context().connecting);
    assert!(controller.context().connection.summary().any_connecting());
    assert_eq!(controller.scheduler().active(), Some(PollTask::Preview));
}

#[tokio::test(start_paused = true)]
async fn test_connect_retry_ends_when_cells_settle() {
    let instrument = InstrumentBuilder::new(3).connect_delay(2).build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;

    controller.set_view(View::Measurements).await.unwrap();
    instrument.reset_calls();
    controller.connect().await.unwrap();
    assert!(notifications(&handle).contains(&"Connecting to sensors".to_string()));

    while controller.scheduler().connect_retry_active() {
        assert!(controller.step().await);
    }

    assert_eq!(instrument.calls(Endpoint::Status), 2);
    assert_eq!(controller.context().connection.summary().connected_count, 3);
    assert!(!controller.context().connecting);
}

#[tokio::test(start_paused = true)]
async fn test_second_connect_while_connecting_is_rejected() {
    let instrument = InstrumentBuilder::new(2).stuck_connecting().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    controller.connect().await.unwrap();
    assert!(controller.connect().await.is_err());
    assert_eq!(instrument.calls(Endpoint::Connect), 1);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_notifies_once_per_streak() {
    let instrument = InstrumentBuilder::new(2).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;
    handle.drain();

    instrument.fail(Endpoint::Status);
    step_n(&mut controller, 3).await;
    let failures: Vec<String> = notifications(&handle)
        .into_iter()
        .filter(|m| m == "Backend not reachable")
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(controller.scheduler().active(), Some(PollTask::StatusPoll));

    instrument.recover(Endpoint::Status);
    step_n(&mut controller, 1).await;
    instrument.fail(Endpoint::Status);
    step_n(&mut controller, 2).await;
    assert_eq!(
        notifications(&handle)
            .iter()
            .filter(|m| *m == "Backend not reachable")
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_raw_display_turns_off_when_cells_drop() {
    let instrument = InstrumentBuilder::new(2).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    controller.set_raw_display(true).await.unwrap();
    assert_eq!(controller.scheduler().active(), Some(PollTask::RawPoll));

    instrument.set_statuses(&[CellStatus::Disconnected, CellStatus::Disconnected]);
    step_n(&mut controller, 1).await;

    assert!(!controller.context().show_raw);
    assert_eq!(controller.scheduler().active(), Some(PollTask::StatusPoll));
}

#[tokio::test(start_paused = true)]
async fn test_raw_display_off_when_leaving_home() {
    let instrument = InstrumentBuilder::new(2).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, _handle) = started_session(&instrument, &config).await;

    controller.set_raw_display(true).await.unwrap();
    controller.set_view(View::Settings).await.unwrap();
    assert!(!controller.context().show_raw);
    assert_eq!(controller.scheduler().active(), Some(PollTask::StatusPoll));

    let err = controller.set_raw_display(true).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_resets_statuses() {
    let instrument = InstrumentBuilder::new(3).connected().build();
    let config = ConfigBuilder::new().build();
    let (mut controller, handle) = started_session(&instrument, &config).await;

    controller.disconnect().await.unwrap();
    let summary = controller.context().connection.summary();
    assert_eq!(summary.connected_count, 0);
    assert_eq!(summary.headline(), "Cells disconnected");
    assert!(notifications(&handle).contains(&"Disconnected".to_string()));
}
