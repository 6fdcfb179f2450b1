//! # SoftRestartScheduler: deliberate restarts with backoff and a watchdog.
//!
//! ```text
//! request()
//!   attempts += 1
//!   delay = backoff.next(attempts)        0, 5m, 10m, ... within one reset period
//!   cancel previous pending request
//!   spawn ─► sleep(delay) ─► RequestChannel::request_restart()
//!            └─► sleep(watchdog)
//!                  ├─ first timeout  ─► request() again
//!                  └─ second timeout ─► record SoftRestartTimeout, publish Restarted
//!
//! on_restarted()    cancels the pending delay/watchdog
//! reset_attempts()  hourly, unconditional
//! ```
//! Cancellation uses child tokens of the runtime token; cancelling twice is a no-op.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{ErrorCode, StartResult};
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::request::RequestChannel;

use super::state::SupervisorState;

#[derive(Default)]
struct SoftState {
    attempts: u32,
    timed_out_once: bool,
    pending: Option<CancellationToken>,
}

pub(crate) struct SoftRestartScheduler {
    inner: Mutex<SoftState>,
    backoff: BackoffPolicy,
    watchdog: Duration,
    channel: Arc<dyn RequestChannel>,
    bus: Bus,
    state: Arc<SupervisorState>,
    runtime: CancellationToken,
}

impl SoftRestartScheduler {
    pub(crate) fn new(
        backoff: BackoffPolicy,
        watchdog: Duration,
        channel: Arc<dyn RequestChannel>,
        bus: Bus,
        state: Arc<SupervisorState>,
        runtime: CancellationToken,
    ) -> Self {
        Self {
            inner: Mutex::new(SoftState::default()),
            backoff,
            watchdog,
            channel,
            bus,
            state,
            runtime,
        }
    }

    /// Schedules a soft restart and returns the delay before the request is written.
    pub(crate) fn request(self: &Arc<Self>) -> Duration {
        let (attempt, token) = {
            let mut s = self.inner.lock();
            s.attempts = s.attempts.saturating_add(1);
            if let Some(prev) = s.pending.take() {
                prev.cancel();
            }
            let token = self.runtime.child_token();
            s.pending = Some(token.clone());
            (s.attempts, token)
        };
        let delay = self.backoff.next(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "soft restart scheduled");
        self.bus.publish(
            Event::now(EventKind::SoftRestartScheduled)
                .with_attempt(attempt)
                .with_delay(delay),
        );

        let me = Arc::clone(self);
        tokio::spawn(async move { me.run(attempt, delay, token).await });
        delay
    }

    async fn run(self: Arc<Self>, attempt: u32, delay: Duration, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        if let Err(e) = self.channel.request_restart().await {
            warn!(attempt, error = %e, "failed to write soft restart request");
        }
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(self.watchdog) => {}
        }
        self.on_watchdog(attempt, &token);
    }

    fn on_watchdog(self: &Arc<Self>, attempt: u32, token: &CancellationToken) {
        let retry = {
            let mut s = self.inner.lock();
            if token.is_cancelled() {
                return;
            }
            s.pending = None;
            s.timed_out_once = !s.timed_out_once;
            s.timed_out_once
        };

        if retry {
            warn!(attempt, "soft restart not observed before watchdog, retrying");
            self.bus.publish(
                Event::now(EventKind::SoftRestartTimedOut)
                    .with_attempt(attempt)
                    .with_reason("retry"),
            );
            self.request();
            return;
        }

        error!(attempt, "soft restart not observed after retry, giving up");
        let result = StartResult::from_code(ErrorCode::SoftRestartTimeout);
        self.state.record(result.clone());
        self.bus.publish(
            Event::now(EventKind::SoftRestartTimedOut)
                .with_attempt(attempt)
                .with_reason("gave up"),
        );
        self.bus.publish(Event::error(result.to_string()));
        self.bus.publish(Event::now(EventKind::Restarted));
    }

    /// A restart was observed: disarm the pending delay/watchdog.
    pub(crate) fn on_restarted(&self) {
        let mut s = self.inner.lock();
        s.timed_out_once = false;
        if let Some(token) = s.pending.take() {
            token.cancel();
        }
    }

    pub(crate) fn cancel_pending(&self) {
        if let Some(token) = self.inner.lock().pending.take() {
            token.cancel();
        }
    }

    pub(crate) fn reset_attempts(&self) {
        self.inner.lock().attempts = 0;
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.inner.lock().attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SupervisorError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct CountingChannel {
        restarts: AtomicU32,
    }

    #[async_trait]
    impl RequestChannel for CountingChannel {
        async fn request_restart(&self) -> Result<(), SupervisorError> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn request_shutdown(&self) -> Result<(), SupervisorError> {
            Ok(())
        }
    }

    fn scheduler() -> (
        Arc<SoftRestartScheduler>,
        Arc<CountingChannel>,
        Arc<SupervisorState>,
        broadcast::Receiver<Event>,
    ) {
        let bus = Bus::new(64);
        let rx = bus.subscribe();
        let channel = Arc::new(CountingChannel::default());
        let state = Arc::new(SupervisorState::new());
        let sched = Arc::new(SoftRestartScheduler::new(
            BackoffPolicy::default(),
            Duration::from_secs(600),
            channel.clone(),
            bus,
            Arc::clone(&state),
            CancellationToken::new(),
        ));
        (sched, channel, state, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn delays_grow_within_period_and_restart_after_reset() {
        let (sched, _ch, _state, _rx) = scheduler();
        let mins = |m: u64| Duration::from_secs(m * 60);

        assert_eq!(sched.request(), mins(0));
        assert_eq!(sched.request(), mins(5));
        assert_eq!(sched.request(), mins(10));
        assert_eq!(sched.attempts(), 3);

        sched.reset_attempts();
        assert_eq!(sched.request(), mins(0));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_observed_disarms_watchdog() {
        let (sched, ch, state, mut rx) = scheduler();
        sched.request();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ch.restarts.load(Ordering::SeqCst), 1);

        sched.on_restarted();
        tokio::time::sleep(Duration::from_secs(3600)).await;

        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::SoftRestartScheduled]);
        assert!(!state.last_result().has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_retries_once_then_gives_up() {
        let (sched, ch, state, mut rx) = scheduler();
        sched.request();

        tokio::time::sleep(Duration::from_secs(601)).await;
        let events = drain(&mut rx);
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::SoftRestartScheduled,
                EventKind::SoftRestartTimedOut,
                EventKind::SoftRestartScheduled,
            ]
        );
        assert_eq!(events[1].reason.as_deref(), Some("retry"));
        assert_eq!(events[2].delay(), Some(Duration::from_secs(300)));
        assert!(!state.last_result().has_error());

        tokio::time::sleep(Duration::from_secs(900)).await;
        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::SoftRestartTimedOut,
                EventKind::ErrorLine,
                EventKind::Restarted,
            ]
        );
        assert_eq!(ch.restarts.load(Ordering::SeqCst), 2);
        assert_eq!(state.last_result().code, ErrorCode::SoftRestartTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn new_request_cancels_pending_one() {
        let (sched, ch, _state, _rx) = scheduler();
        sched.request();
        tokio::time::sleep(Duration::from_secs(1)).await;
        sched.request();
        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(ch.restarts.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ch.restarts.load(Ordering::SeqCst), 2);
    }
}
