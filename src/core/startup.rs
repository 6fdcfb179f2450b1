//! # StartupCoordinator: bounded wait for "ready or failed".
//!
//! Terminal [`Signal`]s resolve the [`ReadySlot`]; [`StartupCoordinator::await_ready`]
//! turns the verdict into a [`StartResult`].
//!
//! | Signal                          | Result                                   |
//! |---------------------------------|------------------------------------------|
//! | `ConfigurationComplete`         | success                                  |
//! | `LoginFailed` (no blackout)     | `LoginFailed`                            |
//! | `LoginFailed` (blackout)        | not terminal, logged at warn             |
//! | `AccountTaskRequired`           | `LoginBlockedByAccountTask`              |
//! | `ExistingSession`               | `ExistingSessionDetected`                |
//! | `SecurityDialog`                | `SecurityDialogDetected`                 |
//! | `UnsupportedVersion`            | `UnsupportedVersion`                     |
//! | `RuntimeException(text)`        | `RuntimeException` + text                |
//! | `ApiNotAvailable`               | `ApiNotAvailable`                        |
//! | `UnknownWindow(text)`           | `UnknownMessageWindow` + text            |
//! | `TwoFactorMaxAttemptsReached`   | `TwoFactorTimeout`                       |
//!
//! `AuthenticatingStateChanged` and `TwoFactorWindowOpened` only annotate a
//! later `InitializationTimeout`.
//!
//! The agent may report through its log file or the gateway's stdout. The first
//! stream that yields a signal after [`StartupCoordinator::rearm`] owns the wait;
//! signals from the other stream are dropped so a line seen twice counts once.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::classifier::Signal;
use crate::error::{ErrorCode, StartResult};
use crate::maintenance::{MaintenanceSchedule, ServerRegion};

use super::slot::{AbortReason, ReadySlot, Readiness};

/// Stream a classified line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineSource {
    AgentLog,
    Stdout,
}

/// Verdict of one launch wait.
#[derive(Debug)]
pub(crate) struct LaunchOutcome {
    pub(crate) result: StartResult,
    /// False when the wait was aborted; such failures do not block the next start.
    pub(crate) sticky: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct AuthNotes {
    authenticating: bool,
    two_factor_opened: bool,
}

pub(crate) struct StartupCoordinator {
    slot: ReadySlot,
    schedule: MaintenanceSchedule,
    region: Mutex<ServerRegion>,
    notes: Mutex<AuthNotes>,
    source: Mutex<Option<LineSource>>,
}

impl StartupCoordinator {
    pub(crate) fn new(schedule: MaintenanceSchedule) -> Self {
        Self {
            slot: ReadySlot::new(),
            schedule,
            region: Mutex::new(ServerRegion::America),
            notes: Mutex::new(AuthNotes::default()),
            source: Mutex::new(None),
        }
    }

    /// Prepares a new wait for a launch against `region`.
    pub(crate) fn begin(&self, region: ServerRegion) {
        *self.region.lock() = region;
        self.rearm();
    }

    /// Prepares a new wait keeping the current region.
    pub(crate) fn rearm(&self) {
        *self.notes.lock() = AuthNotes::default();
        *self.source.lock() = None;
        self.slot.reset();
    }

    /// Stream that owns the current wait, if one has been selected.
    pub(crate) fn source(&self) -> Option<LineSource> {
        *self.source.lock()
    }

    /// True if signals from `source` feed the current wait.
    pub(crate) fn claim(&self, source: LineSource) -> bool {
        let mut current = self.source.lock();
        match *current {
            Some(owner) => owner == source,
            None => {
                debug!(?source, "agent signal source selected");
                *current = Some(source);
                true
            }
        }
    }

    /// Consumes one classified signal observed at `now`.
    pub(crate) fn observe(&self, signal: &Signal, now: DateTime<Utc>) {
        let verdict = match signal {
            Signal::AuthenticatingStateChanged(on) => {
                self.notes.lock().authenticating = *on;
                return;
            }
            Signal::TwoFactorWindowOpened => {
                self.notes.lock().two_factor_opened = true;
                return;
            }
            Signal::RestartInProgress | Signal::AutoRestartTokenExpired => return,
            Signal::ConfigurationComplete => Readiness::Ready,
            Signal::LoginFailed(text) => {
                let region = *self.region.lock();
                if self.schedule.is_within_scheduled_blackout(now, region) {
                    warn!(%region, line = %text, "login failed during scheduled maintenance, waiting for retry");
                    return;
                }
                Readiness::Failed(StartResult::with_detail(ErrorCode::LoginFailed, text))
            }
            Signal::AccountTaskRequired(text) => Readiness::Failed(StartResult::with_detail(
                ErrorCode::LoginBlockedByAccountTask,
                text,
            )),
            Signal::ExistingSession => fail(ErrorCode::ExistingSessionDetected),
            Signal::SecurityDialog => fail(ErrorCode::SecurityDialogDetected),
            Signal::UnsupportedVersion => fail(ErrorCode::UnsupportedVersion),
            Signal::RuntimeException(text) => {
                Readiness::Failed(StartResult::with_detail(ErrorCode::RuntimeException, text))
            }
            Signal::ApiNotAvailable => fail(ErrorCode::ApiNotAvailable),
            Signal::UnknownWindow(text) => {
                Readiness::Failed(StartResult::with_detail(ErrorCode::UnknownMessageWindow, text))
            }
            Signal::TwoFactorMaxAttemptsReached => fail(ErrorCode::TwoFactorTimeout),
        };
        if self.slot.resolve(verdict.clone()) {
            debug!(signal = signal.as_label(), ?verdict, "startup wait resolved");
        }
    }

    /// Resolves the wait with a failure raised outside the log stream.
    pub(crate) fn fail_with(&self, result: StartResult) {
        self.slot.resolve(Readiness::Failed(result));
    }

    /// Ends the wait without a verdict.
    pub(crate) fn abort(&self, reason: AbortReason) {
        if self.slot.resolve(Readiness::Aborted(reason)) {
            info!(?reason, "readiness wait aborted");
        }
    }

    /// Raw verdict, `None` on timeout.
    pub(crate) async fn wait(&self, timeout: Duration) -> Option<Readiness> {
        self.slot.wait(timeout).await
    }

    /// Waits for the launch verdict.
    pub(crate) async fn await_ready(&self, timeout: Duration) -> LaunchOutcome {
        let (result, sticky) = match self.wait(timeout).await {
            Some(Readiness::Ready) => (StartResult::success(), true),
            Some(Readiness::Failed(result)) => (result, true),
            Some(Readiness::Aborted(AbortReason::TokenExpired)) => (
                StartResult::with_detail(
                    ErrorCode::InitializationTimeout,
                    "The auto-restart token expired during startup.",
                ),
                false,
            ),
            Some(Readiness::Aborted(AbortReason::Stopped)) => (
                StartResult::with_detail(
                    ErrorCode::InitializationTimeout,
                    "The gateway was stopped during startup.",
                ),
                false,
            ),
            None => (self.timeout_result(), true),
        };
        LaunchOutcome { result, sticky }
    }

    /// `InitializationTimeout`, annotated with the last authentication state seen.
    pub(crate) fn timeout_result(&self) -> StartResult {
        let notes = *self.notes.lock();
        if notes.two_factor_opened {
            StartResult::with_detail(
                ErrorCode::InitializationTimeout,
                "2FA confirmation pending: the second factor prompt was not confirmed.",
            )
        } else if notes.authenticating {
            StartResult::with_detail(
                ErrorCode::InitializationTimeout,
                "Still authenticating: the backend may be mid-reset.",
            )
        } else {
            StartResult::from_code(ErrorCode::InitializationTimeout)
        }
    }
}

fn fail(code: ErrorCode) -> Readiness {
    Readiness::Failed(StartResult::from_code(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn et(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn weekday_noon() -> DateTime<Utc> {
        et(2026, 10, 13, 12, 0)
    }

    fn coordinator() -> StartupCoordinator {
        let c = StartupCoordinator::new(MaintenanceSchedule::default());
        c.begin(ServerRegion::America);
        c
    }

    fn feed(c: &StartupCoordinator, line: &str, now: DateTime<Utc>) {
        if let Some(sig) = Classifier::default().classify(line) {
            c.observe(&sig, now);
        }
    }

    #[tokio::test]
    async fn configuration_complete_is_success() {
        let c = coordinator();
        feed(&c, "Configuration settings updated.", weekday_noon());
        assert_eq!(c.await_ready(Duration::from_secs(1)).await.result, StartResult::success());
    }

    #[tokio::test]
    async fn login_failure_outside_blackout_is_terminal() {
        let c = coordinator();
        feed(&c, "Login failed", weekday_noon());
        let r = c.await_ready(Duration::from_secs(1)).await.result;
        assert_eq!(r.code, ErrorCode::LoginFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn login_failure_during_blackout_is_downgraded() {
        let c = coordinator();
        feed(&c, "Login failed", et(2026, 10, 17, 12, 0));
        let r = c.await_ready(Duration::from_secs(60)).await.result;
        assert_eq!(r.code, ErrorCode::InitializationTimeout);
    }

    #[tokio::test]
    async fn runtime_exception_keeps_offending_text() {
        let c = coordinator();
        feed(&c, "Exception java.lang.NullPointerException at Foo", weekday_noon());
        let r = c.await_ready(Duration::from_secs(1)).await.result;
        assert_eq!(r.code, ErrorCode::RuntimeException);
        assert!(r.message.contains("NullPointerException"));
    }

    #[tokio::test]
    async fn first_terminal_signal_wins() {
        let c = coordinator();
        feed(&c, "Existing session detected", weekday_noon());
        feed(&c, "Configuration settings updated.", weekday_noon());
        let r = c.await_ready(Duration::from_secs(1)).await.result;
        assert_eq!(r.code, ErrorCode::ExistingSessionDetected);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_in_progress_does_not_resolve() {
        let c = coordinator();
        feed(&c, "Restart in progress", weekday_noon());
        let r = c.await_ready(Duration::from_secs(60)).await.result;
        assert_eq!(r, StartResult::from_code(ErrorCode::InitializationTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_while_authenticating_is_annotated() {
        let c = coordinator();
        feed(
            &c,
            "Window event: [WINDOW_OPENED] - Window title: [Authenticating...] - Window name: [dialog0]",
            weekday_noon(),
        );
        let r = c.await_ready(Duration::from_secs(900)).await.result;
        assert_eq!(r.code, ErrorCode::InitializationTimeout);
        assert!(r.message.contains("mid-reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_after_two_factor_prompt_is_annotated() {
        let c = coordinator();
        feed(
            &c,
            "Window event: [WINDOW_OPENED] - Window title: [Second Factor Authentication] - Window name: [dialog1]",
            weekday_noon(),
        );
        let r = c.await_ready(Duration::from_secs(900)).await.result;
        assert!(r.message.contains("2FA confirmation pending"));
    }

    #[tokio::test]
    async fn rearm_forgets_previous_verdict() {
        let c = coordinator();
        feed(&c, "API support is not available for accounts that support free trading.", weekday_noon());
        c.rearm();
        feed(&c, "Configuration settings updated.", weekday_noon());
        assert!(!c.await_ready(Duration::from_secs(1)).await.result.has_error());
    }

    #[tokio::test]
    async fn abort_maps_to_initialization_timeout() {
        let c = coordinator();
        c.abort(AbortReason::TokenExpired);
        let outcome = c.await_ready(Duration::from_secs(1)).await;
        assert_eq!(outcome.result.code, ErrorCode::InitializationTimeout);
        assert!(outcome.result.message.contains("token expired"));
        assert!(!outcome.sticky);
    }

    #[test]
    fn first_source_owns_the_wait_until_rearm() {
        let c = coordinator();
        assert!(c.claim(LineSource::Stdout));
        assert!(c.claim(LineSource::Stdout));
        assert!(!c.claim(LineSource::AgentLog));

        c.rearm();
        assert!(c.claim(LineSource::AgentLog));
        assert!(!c.claim(LineSource::Stdout));
    }

    #[tokio::test]
    async fn verdicts_from_the_log_are_sticky() {
        let c = coordinator();
        feed(&c, "Login failed", weekday_noon());
        let outcome = c.await_ready(Duration::from_secs(1)).await;
        assert_eq!(outcome.result.code, ErrorCode::LoginFailed);
        assert!(outcome.sticky);
    }
}
