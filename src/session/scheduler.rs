//! Polling scheduler
//!
//! Owns every timer of a session. There are two independent slots:
//!
//! - the **main loop**, holding at most one of [`PollTask`]; starting a task
//!   always stops the current one first
//! - the **connect-retry loop**, a bounded status poll that runs after a
//!   connect request until no cell is connecting or the attempt cap is hit
//!
//! The scheduler does not call the backend itself. The session actor awaits
//! [`PollingScheduler::next_tick`] and performs the work for the returned
//! [`Tick`]. Deadlines are plain instants, so the scheduler can be built and
//! inspected outside a runtime, and dropping a pending `next_tick` future
//! leaves the schedule untouched.

use crate::config::PollIntervals;
use std::time::Duration;
use tokio::time::Instant;

/// Recurring tasks of the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollTask {
    /// Status refresh while idle
    StatusPoll,
    /// Measurement refresh while raw values are displayed
    RawPoll,
    /// Status + measurement refresh in continuous mode
    ContinuousMeasure,
    /// Measurement refresh on the measurement view
    Preview,
}

impl PollTask {
    pub const ALL: [PollTask; 4] = [
        PollTask::StatusPoll,
        PollTask::RawPoll,
        PollTask::ContinuousMeasure,
        PollTask::Preview,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PollTask::StatusPoll => "statusPoll",
            PollTask::RawPoll => "rawPoll",
            PollTask::ContinuousMeasure => "continuousMeasure",
            PollTask::Preview => "preview",
        }
    }

    /// Tasks that belong to the measurement view
    pub fn is_measurement_loop(&self) -> bool {
        matches!(self, PollTask::ContinuousMeasure | PollTask::Preview)
    }
}

impl std::fmt::Display for PollTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Stop handle returned by [`PollingScheduler::start`]
///
/// A handle only stops the run it was issued for; once another task has been
/// started, stopping an older handle is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    task: PollTask,
    generation: u64,
}

impl TaskHandle {
    pub fn task(&self) -> PollTask {
        self.task
    }
}

/// Work due now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Poll(PollTask),
    /// Connect-retry iteration, 1-based
    ConnectRetry { attempt: u32 },
}

#[derive(Debug)]
struct ActiveLoop {
    handle: TaskHandle,
    period: Duration,
    next_due: Instant,
}

#[derive(Debug)]
struct RetryLoop {
    period: Duration,
    next_due: Instant,
    attempts: u32,
    max_attempts: u32,
}

/// Single-loop scheduler plus bounded connect retry
#[derive(Debug)]
pub struct PollingScheduler {
    intervals: PollIntervals,
    active: Option<ActiveLoop>,
    retry: Option<RetryLoop>,
    generation: u64,
}

impl PollingScheduler {
    pub fn new(intervals: PollIntervals) -> Self {
        Self {
            intervals,
            active: None,
            retry: None,
            generation: 0,
        }
    }

    pub fn intervals(&self) -> &PollIntervals {
        &self.intervals
    }

    /// Period of a main-loop task
    pub fn period(&self, task: PollTask) -> Duration {
        match task {
            PollTask::StatusPoll => self.intervals.status(),
            PollTask::RawPoll => self.intervals.raw(),
            PollTask::ContinuousMeasure => self.intervals.continuous(),
            PollTask::Preview => self.intervals.preview(),
        }
    }

    /// Start `task`, stopping whatever runs now; first tick after one period
    pub fn start(&mut self, task: PollTask) -> TaskHandle {
        if let Some(previous) = self.active.take() {
            tracing::debug!("Stopping {} to start {}", previous.handle.task, task);
        }
        self.generation += 1;
        let handle = TaskHandle {
            task,
            generation: self.generation,
        };
        let period = self.period(task);
        self.active = Some(ActiveLoop {
            handle,
            period,
            next_due: Instant::now() + period,
        });
        tracing::info!("Polling loop {} started ({:?})", task, period);
        handle
    }

    /// Stop the run identified by `handle`; false if it is no longer active
    pub fn stop(&mut self, handle: TaskHandle) -> bool {
        if self.active_handle() == Some(handle) {
            self.active = None;
            tracing::info!("Polling loop {} stopped", handle.task);
            true
        } else {
            false
        }
    }

    /// Stop `task` if it is the active one
    pub fn stop_task(&mut self, task: PollTask) -> bool {
        match self.active_handle() {
            Some(handle) if handle.task == task => self.stop(handle),
            _ => false,
        }
    }

    /// Stop the main loop and the connect retry
    pub fn stop_all(&mut self) {
        if let Some(handle) = self.active_handle() {
            self.stop(handle);
        }
        self.stop_connect_retry();
    }

    pub fn active(&self) -> Option<PollTask> {
        self.active.as_ref().map(|a| a.handle.task)
    }

    pub fn active_handle(&self) -> Option<TaskHandle> {
        self.active.as_ref().map(|a| a.handle)
    }

    pub fn is_running(&self, task: PollTask) -> bool {
        self.active() == Some(task)
    }

    /// Number of main-loop tasks scheduled, never more than one
    pub fn scheduled_count(&self) -> usize {
        usize::from(self.active.is_some())
    }

    /// Check if nothing at all is scheduled
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.retry.is_none()
    }

    // ==================== Connect Retry ====================

    /// Start (or restart) the connect-retry loop
    pub fn start_connect_retry(&mut self) {
        let period = self.intervals.connect_retry();
        self.retry = Some(RetryLoop {
            period,
            next_due: Instant::now() + period,
            attempts: 0,
            max_attempts: self.intervals.connect_retry_attempts,
        });
        tracing::debug!(
            "Connect retry started ({:?} x {})",
            period,
            self.intervals.connect_retry_attempts
        );
    }

    pub fn stop_connect_retry(&mut self) -> bool {
        self.retry.take().is_some()
    }

    pub fn connect_retry_active(&self) -> bool {
        self.retry.is_some()
    }

    /// Attempts completed by the current connect retry
    pub fn connect_retry_attempts(&self) -> u32 {
        self.retry.as_ref().map_or(0, |r| r.attempts)
    }

    /// Record a finished retry iteration; true when the loop has ended
    pub fn record_connect_retry(&mut self, still_connecting: bool) -> bool {
        let Some(retry) = self.retry.as_mut() else {
            return true;
        };
        retry.attempts += 1;
        if !still_connecting || retry.attempts >= retry.max_attempts {
            tracing::debug!("Connect retry finished after {} attempts", retry.attempts);
            self.retry = None;
            true
        } else {
            false
        }
    }

    // ==================== Ticks ====================

    /// Earliest deadline, main loop first on ties
    pub fn next_deadline(&self) -> Option<Instant> {
        match (&self.active, &self.retry) {
            (Some(a), Some(r)) => Some(a.next_due.min(r.next_due)),
            (Some(a), None) => Some(a.next_due),
            (None, Some(r)) => Some(r.next_due),
            (None, None) => None,
        }
    }

    /// Wait for the next due tick
    ///
    /// Pending forever when nothing is scheduled. The schedule is only
    /// advanced once the wait completes.
    pub async fn next_tick(&mut self) -> Tick {
        let Some(deadline) = self.next_deadline() else {
            return std::future::pending().await;
        };
        tokio::time::sleep_until(deadline).await;
        let now = Instant::now();

        if let Some(active) = self.active.as_mut() {
            if active.next_due <= deadline {
                active.next_due = now + active.period;
                return Tick::Poll(active.handle.task);
            }
        }
        if let Some(retry) = self.retry.as_mut() {
            retry.next_due = now + retry.period;
            return Tick::ConnectRetry {
                attempt: retry.attempts + 1,
            };
        }
        // Unreachable while `&mut self` is held across the sleep
        std::future::pending().await
    }
}
