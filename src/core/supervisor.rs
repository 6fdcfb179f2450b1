//! # Supervisor: public face of the gateway runtime.
//!
//! The [`Supervisor`] owns the event bus, the process controller, the startup
//! coordinator, the soft-restart scheduler and the supervisor state. It is built
//! by [`SupervisorBuilder`](crate::SupervisorBuilder), which also starts the
//! background tasks.
//!
//! ## Architecture
//! ```text
//! Caller ── start / stop / restart ──► op_lock ──► ProcessController ──► gateway process
//!        ── soft_restart ───────────► SoftRestartScheduler ──► RequestChannel (flag files)
//!
//! Background (children of runtime_token):
//!   tail ticker ───► LogPump::poll_once ──► Classifier ──► StartupCoordinator (ReadySlot)
//!                                     └──► Bus (OutputLine)
//!   stdout listener ► LogPump::ingest_stdout ──► Classifier ──► StartupCoordinator
//!   exit listener ─► RestartSupervisor::on_exit ──► Bus (Exited / Restarted)
//!   hourly reset ──► SoftRestartScheduler::reset_attempts
//!   subscriber listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//! ```
//!
//! ## Rules
//! - `start`, `stop` and `restart` never interleave (one `tokio::sync::Mutex`).
//! - A non-success result is sticky: `start` returns it without side effects
//!   until `stop` clears it.
//! - The tail ticker never takes the operation lock; it serializes on the log lock.
//! - `start` and `stop` end a pending restart wait before touching the process,
//!   so a new launch never satisfies the wait of the previous one.
//!
//! ## Example
//! ```no_run
//! use gatewayvisor::{Settings, SupervisorBuilder, SupervisorConfig, TradingMode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::new(
//!         "trader",
//!         "secret",
//!         TradingMode::Paper,
//!         4002,
//!         "/opt/ibgateway/1030",
//!         "/opt/ibgateway/1030/ibgateway",
//!     );
//!     let sup = SupervisorBuilder::new(settings, SupervisorConfig::default()).build();
//!
//!     let result = sup.start(false).await;
//!     if result.has_error() {
//!         eprintln!("gateway failed: {result}");
//!     }
//!     sup.dispose().await;
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::StartResult;
use crate::events::{Bus, Event, EventKind};
use crate::maintenance::{RegionMap, ServerRegion, peer_host_from_jts_ini};
use crate::process::{ProcessController, ProcessExit, Redactor};
use crate::request::RequestChannel;
use crate::settings::Settings;
use crate::subscribers::SubscriberSet;

use super::config::SupervisorConfig;
use super::pump::LogPump;
use super::restart::RestartSupervisor;
use super::slot::AbortReason;
use super::soft_restart::SoftRestartScheduler;
use super::startup::StartupCoordinator;
use super::state::{Lifecycle, SupervisorState};

/// Supervises one gateway process.
pub struct Supervisor {
    settings: Settings,
    cfg: SupervisorConfig,
    bus: Bus,
    state: Arc<SupervisorState>,
    coordinator: Arc<StartupCoordinator>,
    controller: Arc<ProcessController>,
    soft: Arc<SoftRestartScheduler>,
    requests: Arc<dyn RequestChannel>,
    regions: RegionMap,
    pump: Arc<LogPump>,
    redactor: Redactor,
    op_lock: tokio::sync::Mutex<()>,
    runtime_token: CancellationToken,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// Everything the builder assembles.
pub(crate) struct SupervisorParts {
    pub(crate) settings: Settings,
    pub(crate) cfg: SupervisorConfig,
    pub(crate) bus: Bus,
    pub(crate) state: Arc<SupervisorState>,
    pub(crate) coordinator: Arc<StartupCoordinator>,
    pub(crate) controller: Arc<ProcessController>,
    pub(crate) soft: Arc<SoftRestartScheduler>,
    pub(crate) requests: Arc<dyn RequestChannel>,
    pub(crate) regions: RegionMap,
    pub(crate) pump: Arc<LogPump>,
    pub(crate) redactor: Redactor,
    pub(crate) runtime_token: CancellationToken,
}

impl Supervisor {
    pub(crate) fn new_internal(parts: SupervisorParts) -> Self {
        Self {
            settings: parts.settings,
            cfg: parts.cfg,
            bus: parts.bus,
            state: parts.state,
            coordinator: parts.coordinator,
            controller: parts.controller,
            soft: parts.soft,
            requests: parts.requests,
            regions: parts.regions,
            pump: parts.pump,
            redactor: parts.redactor,
            op_lock: tokio::sync::Mutex::new(()),
            runtime_token: parts.runtime_token,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Starts the gateway and waits until it is ready or failed.
    ///
    /// With `wait_for_exit`, a successful start additionally waits until the
    /// gateway exits for good (expected restarts are followed transparently).
    ///
    /// Failures reported by the agent are sticky until [`Supervisor::stop`].
    /// A wait cut short by an expired auto-restart token is reported as
    /// `InitializationTimeout` but does not block the next start.
    ///
    /// Called while an expected restart is pending, `start` abandons the
    /// re-attachment and launches a fresh gateway.
    pub async fn start(&self, wait_for_exit: bool) -> StartResult {
        let result = {
            let _op = self.op_lock.lock().await;
            self.start_locked().await
        };
        if wait_for_exit && !result.has_error() {
            self.wait_for_exit().await;
        }
        result
    }

    /// Stops the gateway (clean shutdown request, then kill) and clears any sticky error.
    pub async fn stop(&self) {
        let _op = self.op_lock.lock().await;
        self.stop_locked().await;
    }

    /// `stop` followed by `start`, without letting another operation in between.
    pub async fn restart(&self) -> StartResult {
        let _op = self.op_lock.lock().await;
        self.stop_locked().await;
        self.start_locked().await
    }

    /// Schedules a soft restart; returns the delay before the request is written.
    pub fn soft_restart(&self) -> Duration {
        self.soft.request()
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// The recorded result of the last start, restart or failure since the last stop.
    pub fn last_start_result(&self) -> StartResult {
        self.state.last_result()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }

    /// True between a "restart in progress" announcement and the following exit.
    pub fn is_restart_in_progress(&self) -> bool {
        self.state.is_restart_in_progress()
    }

    /// Soft restarts requested since the last hourly reset.
    pub fn soft_restart_attempts(&self) -> u32 {
        self.soft.attempts()
    }

    /// Pid of the supervised process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.controller.pid()
    }

    /// New receiver for all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Cancels background tasks and scheduled restarts, terminates the gateway
    /// and waits for subscribers to drain.
    pub async fn dispose(&self) {
        self.soft.cancel_pending();
        self.coordinator.abort(AbortReason::Stopped);
        self.runtime_token.cancel();
        {
            let _op = self.op_lock.lock().await;
            if self.controller.terminate().await.is_some() {
                info!("gateway terminated on dispose");
            }
            self.state.set_lifecycle(Lifecycle::Idle);
        }
        let handles = std::mem::take(&mut *self.background.lock());
        for h in handles {
            let _ = h.await;
        }
    }

    async fn start_locked(&self) -> StartResult {
        let sticky = self.state.last_result();
        if sticky.has_error() {
            debug!(code = %sticky.code, "start short-circuited by sticky error");
            return sticky;
        }
        if self.end_restart_wait().await {
            info!("pending restart abandoned for a fresh launch");
        }
        if self.controller.is_running() {
            debug!("gateway already running");
            return StartResult::success();
        }
        if let Err(e) = self.settings.validate() {
            error!(error = %e, "refusing to start");
            return self.fail(e.to_start_result());
        }

        let region = self.resolve_region().await;
        self.coordinator.begin(region);
        self.state.set_restart_in_progress(false);
        if let Err(e) = self.pump.tail.lock().await.discard().await {
            warn!(error = %e, "failed to remove stale agent log");
        }

        info!(
            user = %self.settings.user_name,
            mode = %self.settings.trading_mode,
            port = self.settings.port,
            %region,
            "starting gateway"
        );
        self.state.set_lifecycle(Lifecycle::Starting);
        if let Err(e) = self.controller.launch(&self.settings).await {
            error!(error = %e, label = e.as_label(), "gateway launch failed");
            self.state.set_lifecycle(Lifecycle::Idle);
            return self.fail(e.to_start_result());
        }

        let outcome = self.coordinator.await_ready(self.cfg.startup_timeout).await;
        let result = outcome.result;
        if result.has_error() {
            warn!(code = %result.code, sticky = outcome.sticky, "gateway startup failed");
            self.controller.terminate().await;
            self.state.set_lifecycle(Lifecycle::Exited);
            if !outcome.sticky {
                self.report(&result);
                return result;
            }
            return self.fail(result);
        }

        self.state.set_lifecycle(Lifecycle::Running);
        info!(pid = ?self.controller.pid(), "gateway ready");
        result
    }

    async fn stop_locked(&self) {
        self.soft.cancel_pending();
        let pending = self.end_restart_wait().await;
        self.coordinator.abort(AbortReason::Stopped);

        let requests = Arc::clone(&self.requests);
        let exit = self
            .controller
            .shutdown(self.cfg.shutdown_grace, async move {
                match requests.request_shutdown().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "failed to request clean shutdown");
                        false
                    }
                }
            })
            .await;

        self.state.set_restart_in_progress(false);
        self.state.clear_result();
        if exit.is_some() || pending {
            self.bus
                .publish(Event::now(EventKind::Exited).with_exit_code(exit.flatten()));
            info!("gateway stopped");
        }
        self.state.set_lifecycle(Lifecycle::Idle);
    }

    /// Aborts a pending restart wait and waits for the exit listener to leave it.
    ///
    /// Returns whether a restart was pending.
    async fn end_restart_wait(&self) -> bool {
        if self.state.lifecycle() != Lifecycle::RestartPending {
            return false;
        }
        self.coordinator.abort(AbortReason::Stopped);
        let mut rx = self.state.watch_lifecycle();
        tokio::select! {
            _ = rx.wait_for(|l| *l != Lifecycle::RestartPending) => {}
            _ = self.runtime_token.cancelled() => {}
        }
        true
    }

    async fn wait_for_exit(&self) {
        let mut rx = self.state.watch_lifecycle();
        tokio::select! {
            _ = rx.wait_for(|l| matches!(l, Lifecycle::Exited | Lifecycle::Idle)) => {}
            _ = self.runtime_token.cancelled() => {}
        }
    }

    async fn resolve_region(&self) -> ServerRegion {
        let host = match &self.settings.server_host {
            Some(host) => Some(host.clone()),
            None => peer_host_from_jts_ini(&self.settings.jts_ini_path()).await,
        };
        self.regions.resolve(host.as_deref().unwrap_or_default()).region()
    }

    fn fail(&self, result: StartResult) -> StartResult {
        self.report(&result);
        self.state.record(result.clone());
        result
    }

    fn report(&self, result: &StartResult) {
        self.bus
            .publish(Event::error(self.redactor.redact(&result.to_string()).into_owned()));
    }

    /// Spawns the background tasks; called once by the builder.
    pub(crate) fn spawn_background(
        &self,
        subs: SubscriberSet,
        exits: mpsc::UnboundedReceiver<ProcessExit>,
        stdout_lines: mpsc::UnboundedReceiver<String>,
        restarts: RestartSupervisor,
    ) {
        let handles = vec![
            self.subscriber_listener(subs),
            self.tail_ticker(),
            self.stdout_listener(stdout_lines),
            self.exit_listener(exits, restarts),
            self.attempt_reset(),
        ];
        self.background.lock().extend(handles);
    }

    /// Forwards bus events to the subscriber set until the runtime is cancelled.
    fn subscriber_listener(&self, subs: SubscriberSet) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let token = self.runtime_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => subs.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            while let Ok(ev) = rx.try_recv() {
                subs.emit(&ev);
            }
            subs.shutdown().await;
        })
    }

    fn tail_ticker(&self) -> JoinHandle<()> {
        let pump = Arc::clone(&self.pump);
        let period = self.cfg.tail_period_clamped();
        let token = self.runtime_token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => pump.poll_once().await,
                }
            }
        })
    }

    fn stdout_listener(&self, mut lines: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        let pump = Arc::clone(&self.pump);
        let token = self.runtime_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    line = lines.recv() => match line {
                        Some(line) => pump.ingest_stdout(&line),
                        None => break,
                    },
                }
            }
        })
    }

    fn exit_listener(
        &self,
        mut exits: mpsc::UnboundedReceiver<ProcessExit>,
        restarts: RestartSupervisor,
    ) -> JoinHandle<()> {
        let token = self.runtime_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    exit = exits.recv() => match exit {
                        Some(exit) => restarts.on_exit(exit, &token).await,
                        None => break,
                    },
                }
            }
        })
    }

    fn attempt_reset(&self) -> JoinHandle<()> {
        let soft = Arc::clone(&self.soft);
        let period = self.cfg.attempt_reset_period.max(Duration::from_secs(1));
        let token = self.runtime_token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!("soft restart attempt counter reset");
                        soft.reset_attempts();
                    }
                }
            }
        })
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SupervisorBuilder;
    use crate::error::SupervisorError;
    use crate::process::testing::FakeTable;
    use crate::settings::TradingMode;
    use async_trait::async_trait;

    struct NoopChannel;

    #[async_trait]
    impl RequestChannel for NoopChannel {
        async fn request_restart(&self) -> Result<(), SupervisorError> {
            Ok(())
        }
        async fn request_shutdown(&self) -> Result<(), SupervisorError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn soft_restart_backoff_resets_every_period() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(
            "trader",
            "pw",
            TradingMode::Paper,
            4002,
            dir.path(),
            dir.path().join("gateway.sh"),
        );
        let cfg = SupervisorConfig {
            tail_period: Duration::from_secs(60),
            ..SupervisorConfig::default()
        };
        let period = cfg.attempt_reset_period;
        let sup = SupervisorBuilder::new(settings, cfg)
            .with_request_channel(Arc::new(NoopChannel))
            .with_process_table(Arc::new(FakeTable::default()))
            .build();
        let min = Duration::from_secs(60);

        assert_eq!(sup.soft_restart(), Duration::ZERO);
        assert_eq!(sup.soft_restart(), 5 * min);
        sup.soft.cancel_pending();

        tokio::time::sleep(period - min).await;
        assert_eq!(sup.soft_restart_attempts(), 2);

        tokio::time::sleep(2 * min).await;
        assert_eq!(sup.soft_restart_attempts(), 0);
        assert_eq!(sup.soft_restart(), Duration::ZERO);
        sup.dispose().await;
    }
}
