//! Supervisor-owned mutable state: lifecycle, sticky result, restart flag.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::StartResult;

/// Observable lifecycle of the supervised gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Nothing launched yet, or stopped by the caller.
    Idle,
    /// Launched, waiting for ready or failed.
    Starting,
    Running,
    /// Exited for an expected restart; waiting for the replacement.
    RestartPending,
    /// Exited and not re-attached.
    Exited,
}

impl Lifecycle {
    pub fn as_label(&self) -> &'static str {
        match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Starting => "starting",
            Lifecycle::Running => "running",
            Lifecycle::RestartPending => "restart_pending",
            Lifecycle::Exited => "exited",
        }
    }
}

pub(crate) struct SupervisorState {
    lifecycle: watch::Sender<Lifecycle>,
    last_result: Mutex<StartResult>,
    restart_in_progress: AtomicBool,
}

impl SupervisorState {
    pub(crate) fn new() -> Self {
        let (lifecycle, _rx) = watch::channel(Lifecycle::Idle);
        Self {
            lifecycle,
            last_result: Mutex::new(StartResult::success()),
            restart_in_progress: AtomicBool::new(false),
        }
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    pub(crate) fn set_lifecycle(&self, next: Lifecycle) {
        let prev = self.lifecycle.send_replace(next);
        if prev != next {
            debug!(from = prev.as_label(), to = next.as_label(), "lifecycle");
        }
    }

    pub(crate) fn watch_lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    pub(crate) fn last_result(&self) -> StartResult {
        self.last_result.lock().clone()
    }

    pub(crate) fn record(&self, result: StartResult) {
        *self.last_result.lock() = result;
    }

    pub(crate) fn clear_result(&self) {
        *self.last_result.lock() = StartResult::success();
    }

    pub(crate) fn set_restart_in_progress(&self, value: bool) {
        self.restart_in_progress.store(value, Ordering::SeqCst);
    }

    /// Returns the flag and clears it.
    pub(crate) fn take_restart_in_progress(&self) -> bool {
        self.restart_in_progress.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn is_restart_in_progress(&self) -> bool {
        self.restart_in_progress.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn restart_flag_is_consumed_once() {
        let s = SupervisorState::new();
        s.set_restart_in_progress(true);
        assert!(s.is_restart_in_progress());
        assert!(s.take_restart_in_progress());
        assert!(!s.take_restart_in_progress());
    }

    #[test]
    fn recorded_result_survives_until_cleared() {
        let s = SupervisorState::new();
        s.record(StartResult::from_code(ErrorCode::LoginFailed));
        assert_eq!(s.last_result().code, ErrorCode::LoginFailed);
        s.clear_result();
        assert!(!s.last_result().has_error());
    }

    #[tokio::test]
    async fn lifecycle_changes_are_observable() {
        let s = SupervisorState::new();
        let mut rx = s.watch_lifecycle();
        s.set_lifecycle(Lifecycle::Starting);
        s.set_lifecycle(Lifecycle::Running);
        let seen = *rx.wait_for(|l| *l == Lifecycle::Running).await.unwrap();
        assert_eq!(seen, Lifecycle::Running);
        assert_eq!(s.lifecycle(), Lifecycle::Running);
    }
}
