//! # LogPump: agent output → events + signals.
//!
//! Two feeds arrive here: the agent log, read by the tail ticker once per
//! period, and the launched gateway's stdout, forwarded line by line by the
//! process controller. Log lines are redacted and published as output lines;
//! stdout lines were already published by the controller. Both are classified
//! and routed to the restart flag or to the [`StartupCoordinator`], which keeps
//! only the stream that produced the first signal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::classifier::{Classifier, LogTail, Signal};
use crate::events::{Bus, Event};
use crate::process::Redactor;

use super::slot::AbortReason;
use super::startup::{LineSource, StartupCoordinator};
use super::state::SupervisorState;

pub(crate) struct LogPump {
    pub(crate) tail: Arc<Mutex<LogTail>>,
    pub(crate) classifier: Classifier,
    pub(crate) redactor: Redactor,
    pub(crate) bus: Bus,
    pub(crate) state: Arc<SupervisorState>,
    pub(crate) coordinator: Arc<StartupCoordinator>,
}

impl LogPump {
    /// Reads and dispatches every line appended since the previous call.
    pub(crate) async fn poll_once(&self) {
        let lines = {
            let mut tail = self.tail.lock().await;
            match tail.read_new_lines().await {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(error = %e, "agent log read failed");
                    return;
                }
            }
        };
        for raw in lines {
            if self.coordinator.source() == Some(LineSource::Stdout) {
                trace!("agent log line shadowed by stdout");
                continue;
            }
            let line = self.redactor.redact(&raw).into_owned();
            let signal = self.classifier.classify(&line);
            self.bus.publish(Event::output(line.as_str()));
            match signal {
                Some(signal) => self.dispatch(LineSource::AgentLog, signal, Utc::now()),
                None => trace!(%line, "unclassified agent line"),
            }
        }
    }

    /// Classifies one already redacted stdout line of the launched gateway.
    pub(crate) fn ingest_stdout(&self, line: &str) {
        match self.classifier.classify(line) {
            Some(signal) => self.dispatch(LineSource::Stdout, signal, Utc::now()),
            None => trace!(%line, "unclassified gateway stdout line"),
        }
    }

    pub(crate) fn dispatch(&self, source: LineSource, signal: Signal, now: DateTime<Utc>) {
        if !self.coordinator.claim(source) {
            trace!(?source, signal = signal.as_label(), "signal from secondary stream dropped");
            return;
        }
        debug!(?source, signal = signal.as_label(), "agent signal");
        match signal {
            Signal::RestartInProgress => {
                info!("gateway announced an automatic restart");
                self.state.set_restart_in_progress(true);
            }
            Signal::AutoRestartTokenExpired => {
                warn!("auto-restart token expired, next exit requires a full restart");
                self.state.set_restart_in_progress(false);
                self.coordinator.abort(AbortReason::TokenExpired);
            }
            other => self.coordinator.observe(&other, now),
        }
    }
}
