//! # RestartSupervisor: what a process exit means.
//!
//! ```text
//! exit (current generation)
//!   ├─ restart not in progress ─► Exited(code)
//!   │     (during startup the wait resolves with ProcessStartFailed)
//!   └─ restart in progress ─► RestartPending, wait(restart_timeout)
//!         ├─ Ready  ─► find replacement ─┬─ found     ─► attach, Restarted
//!         │                              └─ not found ─► RestartedProcessNotFound, Exited
//!         ├─ Failed(result)        ─► result recorded, Exited
//!         ├─ Aborted(token expiry) ─► Exited
//!         ├─ Aborted(stop)         ─► Idle; stop() or start() takes over
//!         └─ timeout               ─► InitializationTimeout, Exited
//! ```
//! A verdict is dropped when another process was installed during the wait.
//! Credentials are never re-entered on an expected restart.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ErrorCode, StartResult};
use crate::events::{Bus, Event, EventKind};
use crate::process::{ProcessController, ProcessExit, Redactor};

use super::slot::{AbortReason, Readiness};
use super::soft_restart::SoftRestartScheduler;
use super::startup::StartupCoordinator;
use super::state::{Lifecycle, SupervisorState};

pub(crate) struct RestartSupervisor {
    pub(crate) controller: Arc<ProcessController>,
    pub(crate) coordinator: Arc<StartupCoordinator>,
    pub(crate) soft: Arc<SoftRestartScheduler>,
    pub(crate) state: Arc<SupervisorState>,
    pub(crate) bus: Bus,
    pub(crate) redactor: Redactor,
    pub(crate) restart_timeout: Duration,
    pub(crate) process_name: String,
}

impl RestartSupervisor {
    pub(crate) async fn on_exit(&self, exit: ProcessExit, runtime: &CancellationToken) {
        if !self.controller.clear_if_current(exit.generation) {
            debug!(pid = exit.pid, generation = exit.generation, "ignoring exit of a detached process");
            return;
        }

        if !self.state.take_restart_in_progress() {
            info!(pid = exit.pid, code = ?exit.code, "gateway exited");
            if self.state.lifecycle() == Lifecycle::Starting {
                let detail = match exit.code {
                    Some(code) => format!("The process exited with code {code} during startup."),
                    None => "The process exited during startup.".to_string(),
                };
                self.coordinator
                    .fail_with(StartResult::with_detail(ErrorCode::ProcessStartFailed, detail));
            }
            self.exited(exit.code);
            return;
        }

        info!(pid = exit.pid, timeout_ms = self.restart_timeout.as_millis() as u64, "gateway restarting, waiting for the replacement");
        let generation = self.controller.generation();
        self.coordinator.rearm();
        self.state.set_lifecycle(Lifecycle::RestartPending);

        let verdict = tokio::select! {
            v = self.coordinator.wait(self.restart_timeout) => v,
            _ = runtime.cancelled() => return,
        };

        if verdict == Some(Readiness::Aborted(AbortReason::Stopped)) {
            debug!("restart wait interrupted by stop or a new start");
            self.state.set_lifecycle(Lifecycle::Idle);
            return;
        }
        if self.controller.generation() != generation {
            debug!(?verdict, "restart wait superseded by a new launch");
            return;
        }

        match verdict {
            Some(Readiness::Ready) => self.reattach(exit).await,
            Some(Readiness::Failed(result)) => {
                warn!(code = %result.code, "gateway failed while restarting");
                self.fail(result, exit.code);
            }
            Some(Readiness::Aborted(AbortReason::TokenExpired)) => {
                info!("auto-restart token expired, a full restart is required");
                self.exited(exit.code);
            }
            Some(Readiness::Aborted(AbortReason::Stopped)) => {}
            None => {
                error!("restarted gateway did not become ready in time");
                self.fail(self.coordinator.timeout_result(), exit.code);
            }
        }
    }

    async fn reattach(&self, exit: ProcessExit) {
        match self.controller.find_replacement(&self.process_name, exit.pid).await {
            Some(pid) => {
                self.controller.attach(pid).await;
                self.state.set_lifecycle(Lifecycle::Running);
                self.bus.publish(Event::now(EventKind::Restarted));
                self.soft.on_restarted();
            }
            None => {
                error!(process_name = %self.process_name, "restarted gateway process not found");
                self.fail(StartResult::from_code(ErrorCode::RestartedProcessNotFound), exit.code);
            }
        }
    }

    fn fail(&self, result: StartResult, code: Option<i32>) {
        self.bus
            .publish(Event::error(self.redactor.redact(&result.to_string()).into_owned()));
        self.state.record(result);
        self.exited(code);
    }

    fn exited(&self, code: Option<i32>) {
        self.state.set_lifecycle(Lifecycle::Exited);
        self.bus.publish(Event::now(EventKind::Exited).with_exit_code(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Signal;
    use crate::core::DiscoveryConfig;
    use crate::error::SupervisorError;
    use crate::maintenance::{MaintenanceSchedule, ServerRegion};
    use crate::policies::BackoffPolicy;
    use crate::process::testing::FakeTable;
    use crate::request::RequestChannel;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::sync::{broadcast, mpsc};

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

    struct Harness {
        rs: Arc<RestartSupervisor>,
        table: Arc<FakeTable>,
        exits: mpsc::UnboundedReceiver<ProcessExit>,
        events: broadcast::Receiver<Event>,
    }

    fn harness(restart_timeout: Duration) -> Harness {
        let bus = Bus::new(64);
        let events = bus.subscribe();
        let table = Arc::new(FakeTable::default());
        let (controller, exits) = ProcessController::new(
            Redactor::new("pw"),
            bus.clone(),
            table.clone(),
            Duration::from_millis(50),
            DiscoveryConfig::default(),
        );
        let state = Arc::new(SupervisorState::new());
        let coordinator = Arc::new(StartupCoordinator::new(MaintenanceSchedule::default()));
        coordinator.begin(ServerRegion::America);
        let soft = Arc::new(SoftRestartScheduler::new(
            BackoffPolicy::default(),
            Duration::from_secs(600),
            Arc::new(NoopChannel),
            bus.clone(),
            Arc::clone(&state),
            CancellationToken::new(),
        ));
        let rs = Arc::new(RestartSupervisor {
            controller: Arc::new(controller),
            coordinator,
            soft,
            state,
            bus,
            redactor: Redactor::new("pw"),
            restart_timeout,
            process_name: "java".into(),
        });
        Harness {
            rs,
            table,
            exits,
            events,
        }
    }

    impl Harness {
        async fn run_gateway(&mut self, pid: u32) {
            self.table.spawn(pid, "java -javaagent:ibautomater.jar");
            self.rs.controller.attach(pid).await;
            self.rs.state.set_lifecycle(Lifecycle::Running);
        }

        async fn exit_and_handle(&mut self, pid: u32) -> tokio::task::JoinHandle<()> {
            self.table.exit(pid);
            let exit = self.exits.recv().await.unwrap();
            let rs = Arc::clone(&self.rs);
            tokio::spawn(async move { rs.on_exit(exit, &CancellationToken::new()).await })
        }

        async fn until(&self, lifecycle: Lifecycle) {
            let mut rx = self.rs.state.watch_lifecycle();
            rx.wait_for(|l| *l == lifecycle).await.unwrap();
        }

        fn kinds(&mut self) -> Vec<EventKind> {
            std::iter::from_fn(|| self.events.try_recv().ok())
                .map(|e| e.kind)
                .collect()
        }
    }

    fn weekday() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 13, 16, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_exit_is_reported() {
        let mut h = harness(Duration::from_secs(900));
        h.run_gateway(100).await;
        h.exit_and_handle(100).await.await.unwrap();

        assert_eq!(h.rs.state.lifecycle(), Lifecycle::Exited);
        assert_eq!(h.kinds(), vec![EventKind::Exited]);
        assert!(!h.rs.state.last_result().has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn expected_restart_reattaches_without_exited() {
        let mut h = harness(Duration::from_secs(900));
        h.run_gateway(100).await;
        h.rs.state.set_restart_in_progress(true);

        let task = h.exit_and_handle(100).await;
        h.until(Lifecycle::RestartPending).await;
        h.table.spawn(200, "java ibgateway.GWClient -restart");
        h.rs.coordinator.observe(&Signal::ConfigurationComplete, weekday());
        task.await.unwrap();

        assert_eq!(h.rs.state.lifecycle(), Lifecycle::Running);
        assert_eq!(h.rs.controller.pid(), Some(200));
        assert_eq!(h.kinds(), vec![EventKind::Restarted]);
        assert!(!h.rs.state.is_restart_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_replacement_is_sticky() {
        let mut h = harness(Duration::from_secs(900));
        h.run_gateway(100).await;
        h.rs.state.set_restart_in_progress(true);

        let task = h.exit_and_handle(100).await;
        h.until(Lifecycle::RestartPending).await;
        h.rs.coordinator.observe(&Signal::ConfigurationComplete, weekday());
        task.await.unwrap();

        assert_eq!(h.rs.state.last_result().code, ErrorCode::RestartedProcessNotFound);
        assert_eq!(h.kinds(), vec![EventKind::ErrorLine, EventKind::Exited]);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_timeout_is_sticky() {
        let mut h = harness(Duration::from_secs(900));
        h.run_gateway(100).await;
        h.rs.state.set_restart_in_progress(true);

        h.exit_and_handle(100).await.await.unwrap();

        assert_eq!(h.rs.state.last_result().code, ErrorCode::InitializationTimeout);
        assert_eq!(h.rs.state.lifecycle(), Lifecycle::Exited);
    }

    #[tokio::test(start_paused = true)]
    async fn token_expiry_exits_without_error() {
        let mut h = harness(Duration::from_secs(900));
        h.run_gateway(100).await;
        h.rs.state.set_restart_in_progress(true);

        let task = h.exit_and_handle(100).await;
        h.until(Lifecycle::RestartPending).await;
        h.rs.coordinator.abort(AbortReason::TokenExpired);
        task.await.unwrap();

        assert!(!h.rs.state.last_result().has_error());
        assert_eq!(h.kinds(), vec![EventKind::Exited]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_restart_wait_leaves_idle() {
        let mut h = harness(Duration::from_secs(900));
        h.run_gateway(100).await;
        h.rs.state.set_restart_in_progress(true);

        let task = h.exit_and_handle(100).await;
        h.until(Lifecycle::RestartPending).await;
        h.rs.coordinator.abort(AbortReason::Stopped);
        task.await.unwrap();

        assert_eq!(h.rs.state.lifecycle(), Lifecycle::Idle);
        assert!(!h.rs.state.last_result().has_error());
        assert!(h.kinds().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn new_launch_supersedes_restart_wait() {
        let mut h = harness(Duration::from_secs(900));
        h.run_gateway(100).await;
        h.rs.state.set_restart_in_progress(true);

        let task = h.exit_and_handle(100).await;
        h.until(Lifecycle::RestartPending).await;
        h.table.spawn(300, "java -javaagent:ibautomater.jar");
        h.rs.controller.attach(300).await;
        h.rs.coordinator.observe(&Signal::ConfigurationComplete, weekday());
        task.await.unwrap();

        assert_eq!(h.rs.controller.pid(), Some(300));
        assert!(h.rs.controller.is_running());
        assert!(!h.rs.state.last_result().has_error());
        assert!(h.kinds().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_exit_is_ignored() {
        let mut h = harness(Duration::from_secs(900));
        h.run_gateway(100).await;
        h.table.exit(100);
        let exit = h.exits.recv().await.unwrap();
        h.run_gateway(101).await;

        h.rs.on_exit(exit, &CancellationToken::new()).await;
        assert_eq!(h.rs.controller.pid(), Some(101));
        assert_eq!(h.rs.state.lifecycle(), Lifecycle::Running);
        assert!(h.kinds().is_empty());
    }
}
