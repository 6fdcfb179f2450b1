use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    classifier::{Classifier, LogTail},
    events::Bus,
    maintenance::{MaintenanceSchedule, RegionMap},
    process::{ProcessController, ProcessTable, Redactor, SysinfoTable},
    request::{FileFlagChannel, RequestChannel},
    settings::Settings,
    subscribers::{Subscribe, SubscriberSet},
};

use super::{
    config::SupervisorConfig,
    pump::LogPump,
    restart::RestartSupervisor,
    soft_restart::SoftRestartScheduler,
    startup::StartupCoordinator,
    state::SupervisorState,
    supervisor::{Supervisor, SupervisorParts},
};

/// Builder for constructing a [`Supervisor`] with optional collaborators.
pub struct SupervisorBuilder {
    settings: Settings,
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    requests: Option<Arc<dyn RequestChannel>>,
    table: Option<Arc<dyn ProcessTable>>,
    schedule: MaintenanceSchedule,
    regions: RegionMap,
    classifier: Classifier,
}

impl SupervisorBuilder {
    /// Creates a new builder for `settings` with the given runtime configuration.
    pub fn new(settings: Settings, cfg: SupervisorConfig) -> Self {
        Self {
            settings,
            cfg,
            subscribers: Vec::new(),
            requests: None,
            table: None,
            schedule: MaintenanceSchedule::default(),
            regions: RegionMap::default(),
            classifier: Classifier::default(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every event (output, error, exited, restarted, soft
    /// restart activity) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the flag-file channel in the working directory.
    pub fn with_request_channel(mut self, requests: Arc<dyn RequestChannel>) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Replaces the `sysinfo` process table used to find restarted gateways.
    pub fn with_process_table(mut self, table: Arc<dyn ProcessTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// Replaces the maintenance schedule and the host → region map.
    pub fn with_calendar(mut self, schedule: MaintenanceSchedule, regions: RegionMap) -> Self {
        self.schedule = schedule;
        self.regions = regions;
        self
    }

    /// Replaces the log line classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Builds the supervisor and spawns its background tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers);
        let runtime_token = CancellationToken::new();
        let redactor = Redactor::new(self.settings.password());

        let requests = self
            .requests
            .unwrap_or_else(|| Arc::new(FileFlagChannel::new(&self.settings.working_dir)));
        let table = self.table.unwrap_or_else(|| Arc::new(SysinfoTable::new()));

        let state = Arc::new(SupervisorState::new());
        let coordinator = Arc::new(StartupCoordinator::new(self.schedule));
        let (controller, exits) = ProcessController::new(
            redactor.clone(),
            bus.clone(),
            table,
            self.cfg.exit_poll_period_clamped(),
            self.cfg.discovery.clone(),
        );
        let (stdout_sink, stdout_lines) = tokio::sync::mpsc::unbounded_channel();
        let controller = Arc::new(controller.with_stdout_sink(stdout_sink));
        let soft = Arc::new(SoftRestartScheduler::new(
            self.cfg.soft_restart_backoff,
            self.cfg.soft_restart_watchdog,
            Arc::clone(&requests),
            bus.clone(),
            Arc::clone(&state),
            runtime_token.clone(),
        ));
        let pump = Arc::new(LogPump {
            tail: Arc::new(tokio::sync::Mutex::new(LogTail::new(self.settings.agent_log_path()))),
            classifier: self.classifier,
            redactor: redactor.clone(),
            bus: bus.clone(),
            state: Arc::clone(&state),
            coordinator: Arc::clone(&coordinator),
        });
        let restarts = RestartSupervisor {
            controller: Arc::clone(&controller),
            coordinator: Arc::clone(&coordinator),
            soft: Arc::clone(&soft),
            state: Arc::clone(&state),
            bus: bus.clone(),
            redactor: redactor.clone(),
            restart_timeout: self.cfg.restart_timeout,
            process_name: self.settings.process_name.clone(),
        };

        let sup = Arc::new(Supervisor::new_internal(SupervisorParts {
            settings: self.settings,
            cfg: self.cfg,
            bus,
            state,
            coordinator,
            controller,
            soft,
            requests,
            regions: self.regions,
            pump,
            redactor,
            runtime_token,
        }));
        sup.spawn_background(subs, exits, stdout_lines, restarts);
        sup
    }
}
