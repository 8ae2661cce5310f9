//! Session construction helpers

use cmeasure_rs::backend::MockInstrument;
use cmeasure_rs::config::ClientConfig;
use cmeasure_rs::session::{SessionController, SessionEvent, SessionHandle};
use cmeasure_rs::types::NotificationLevel;

/// Controller over a clone of `instrument`; the test keeps the original
pub fn session_with(
    instrument: &MockInstrument,
    config: &ClientConfig,
) -> (SessionController, SessionHandle) {
    SessionController::new(Box::new(instrument.clone()), config)
}

/// Controller that has already run `start`
pub async fn started_session(
    instrument: &MockInstrument,
    config: &ClientConfig,
) -> (SessionController, SessionHandle) {
    let (mut controller, handle) = session_with(instrument, config);
    controller
        .start()
        .await
        .expect("session should start against the mock instrument");
    (controller, handle)
}

/// Run `n` scheduler ticks
///
/// The handle must stay alive, and something must be scheduled.
pub async fn step_n(controller: &mut SessionController, n: usize) {
    for _ in 0..n {
        assert!(controller.step().await, "session stopped unexpectedly");
    }
}

/// Messages of every pending notification
pub fn notifications(handle: &SessionHandle) -> Vec<String> {
    handle
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::Notification(n) => Some(n.message),
            _ => None,
        })
        .collect()
}

/// Messages of pending notifications at `level`
pub fn notifications_at(handle: &SessionHandle, level: NotificationLevel) -> Vec<String> {
    handle
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::Notification(n) if n.level == level => Some(n.message),
            _ => None,
        })
        .collect()
}
