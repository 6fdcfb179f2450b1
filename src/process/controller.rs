//! # ProcessController: exclusive owner of the live gateway process.
//!
//! Holds at most one process handle. A handle is either a spawned child (exit
//! status known) or a process re-attached after the gateway restarted itself
//! (found by name, polled through the [`ProcessTable`], exit status unknown).
//!
//! ## Exit reporting
//! ```text
//! monitor task ──(natural exit)──► exits channel ──► Supervisor exit listener
//!      │
//!      └──(terminate())──► kill ──► exit code returned to the caller of terminate()
//! ```
//! Every handle carries a generation number; the exit listener ignores exits of
//! handles that are no longer current.
//!
//! All forwarded stdout/stderr text goes through the [`Redactor`] before it is
//! published or logged. Redacted stdout lines are also handed to the stdout
//! sink, when one is set, for classification.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::core::DiscoveryConfig;
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::settings::Settings;

use super::redact::Redactor;
use super::table::{ProcessTable, select_replacement};

/// Natural exit of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub pid: u32,
    pub generation: u64,
    /// `None` when the process was not our child or died from a signal.
    pub code: Option<i32>,
}

/// How the current process is owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    Child,
    Attached,
}

struct ProcessHandle {
    pid: u32,
    generation: u64,
    ownership: Ownership,
    /// Cancelled by the monitor once the process is gone.
    exited: CancellationToken,
    /// Cancelled by `terminate()`.
    kill: CancellationToken,
    monitor: JoinHandle<Option<i32>>,
}

pub struct ProcessController {
    current: Mutex<Option<ProcessHandle>>,
    generation: AtomicU64,
    exits: mpsc::UnboundedSender<ProcessExit>,
    redactor: Redactor,
    bus: Bus,
    table: Arc<dyn ProcessTable>,
    poll: Duration,
    discovery: DiscoveryConfig,
    stdout_sink: Option<mpsc::UnboundedSender<String>>,
}

impl ProcessController {
    pub(crate) fn new(
        redactor: Redactor,
        bus: Bus,
        table: Arc<dyn ProcessTable>,
        poll: Duration,
        discovery: DiscoveryConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ProcessExit>) {
        let (exits, rx) = mpsc::unbounded_channel();
        let ctl = Self {
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
            exits,
            redactor,
            bus,
            table,
            poll,
            discovery,
            stdout_sink: None,
        };
        (ctl, rx)
    }

    /// Also sends every redacted stdout line of launched processes to `sink`.
    pub(crate) fn with_stdout_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.stdout_sink = Some(sink);
        self
    }

    /// Generation of the most recently installed handle.
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Checks the installation, spawns the launcher and starts monitoring it.
    pub(crate) async fn launch(&self, settings: &Settings) -> Result<u32, SupervisorError> {
        if !exists(&settings.launcher).await {
            return Err(SupervisorError::LauncherMissing {
                path: settings.launcher.clone(),
            });
        }
        if let Some(runtime) = &settings.runtime
            && !exists(runtime).await
        {
            return Err(SupervisorError::RuntimeMissing { path: runtime.clone() });
        }

        let mut child = Command::new(&settings.launcher)
            .args(settings.launcher_args())
            .current_dir(&settings.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn { source })?;

        let pid = child.id().unwrap_or_default();
        if let Some(out) = child.stdout.take() {
            self.forward(out, EventKind::OutputLine, self.stdout_sink.clone());
        }
        if let Some(err) = child.stderr.take() {
            self.forward(err, EventKind::ErrorLine, None);
        }

        let exits = self.exits.clone();
        let generation = self
            .install(pid, Ownership::Child, move |exit, exited, kill| {
                tokio::spawn(watch_child(child, exit, exited, kill, exits))
            })
            .await;
        info!(pid, generation, launcher = %settings.launcher.display(), "gateway launched");
        Ok(pid)
    }

    /// Adopts `pid` as the current process.
    pub(crate) async fn attach(&self, pid: u32) {
        let table = Arc::clone(&self.table);
        let poll = self.poll;
        let exits = self.exits.clone();
        let generation = self
            .install(pid, Ownership::Attached, move |exit, exited, kill| {
                tokio::spawn(watch_attached(table, poll, exit, exited, kill, exits))
            })
            .await;
        info!(pid, generation, "re-attached to restarted gateway");
    }

    /// Looks up the restarted gateway, skipping `previous`.
    pub(crate) async fn find_replacement(&self, process_name: &str, previous: u32) -> Option<u32> {
        let table = Arc::clone(&self.table);
        let name = process_name.to_string();
        let candidates = tokio::task::spawn_blocking(move || table.find_by_name(&name))
            .await
            .unwrap_or_default();
        let candidates: Vec<_> = candidates.into_iter().filter(|c| c.pid != previous).collect();
        debug!(process_name, candidates = candidates.len(), "searching restarted gateway");
        select_replacement(&candidates, &self.discovery)
    }

    /// Kills the current process and waits for its monitor.
    ///
    /// Returns `None` if nothing was running; otherwise the exit code, if known.
    pub(crate) async fn terminate(&self) -> Option<Option<i32>> {
        self.shutdown(Duration::ZERO, async { false }).await
    }

    /// Detaches the current process, runs `request` and, if it succeeded, gives
    /// the process up to `grace` to exit by itself before killing it.
    ///
    /// The handle is detached first, so a clean exit during the grace period is
    /// not reported through the exits channel as current.
    pub(crate) async fn shutdown<F>(&self, grace: Duration, request: F) -> Option<Option<i32>>
    where
        F: Future<Output = bool>,
    {
        let handle = self.current.lock().take()?;
        if request.await && tokio::time::timeout(grace, handle.exited.cancelled()).await.is_err() {
            warn!(pid = handle.pid, grace_ms = grace.as_millis() as u64, "gateway ignored shutdown request, killing");
        }
        handle.kill.cancel();
        let code = handle.monitor.await.unwrap_or_default();
        info!(
            pid = handle.pid,
            generation = handle.generation,
            ownership = ?handle.ownership,
            ?code,
            "gateway terminated"
        );
        Some(code)
    }

    /// Forgets the handle if `generation` is still current.
    pub(crate) fn clear_if_current(&self, generation: u64) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|h| h.generation == generation) {
            *current = None;
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|h| !h.exited.is_cancelled())
    }

    pub fn pid(&self) -> Option<u32> {
        self.current.lock().as_ref().map(|h| h.pid)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Spawns the monitor and stores the new handle under one lock, so the exit
    /// listener never observes an exit before its handle is current.
    async fn install<F>(&self, pid: u32, ownership: Ownership, spawn_monitor: F) -> u64
    where
        F: FnOnce(ProcessExit, CancellationToken, CancellationToken) -> JoinHandle<Option<i32>>,
    {
        let generation = self.next_generation();
        let exited = CancellationToken::new();
        let kill = CancellationToken::new();
        let previous = {
            let mut current = self.current.lock();
            let monitor = spawn_monitor(
                ProcessExit { pid, generation, code: None },
                exited.clone(),
                kill.clone(),
            );
            current.replace(ProcessHandle {
                pid,
                generation,
                ownership,
                exited,
                kill,
                monitor,
            })
        };
        if let Some(old) = previous {
            warn!(pid = old.pid, generation = old.generation, "replacing a process handle");
            old.kill.cancel();
            let _ = old.monitor.await;
        }
        generation
    }

    fn forward<R>(&self, stream: R, kind: EventKind, sink: Option<mpsc::UnboundedSender<String>>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let bus = self.bus.clone();
        let redactor = self.redactor.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = redactor.redact(&line).into_owned();
                trace!(?kind, %line, "gateway stream");
                if let Some(sink) = &sink {
                    let _ = sink.send(line.clone());
                }
                bus.publish(Event::now(kind).with_line(line));
            }
        });
    }
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        if let Some(handle) = self.current.get_mut().take() {
            handle.kill.cancel();
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn watch_child(
    mut child: Child,
    mut exit: ProcessExit,
    exited: CancellationToken,
    kill: CancellationToken,
    exits: mpsc::UnboundedSender<ProcessExit>,
) -> Option<i32> {
    tokio::select! {
        status = child.wait() => {
            exit.code = status.ok().and_then(|s| s.code());
            exited.cancel();
            debug!(pid = exit.pid, code = ?exit.code, "gateway process exited");
            let _ = exits.send(exit);
            exit.code
        }
        _ = kill.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!(pid = exit.pid, error = %e, "failed to kill gateway process");
            }
            let code = child.wait().await.ok().and_then(|s| s.code());
            exited.cancel();
            code
        }
    }
}

async fn watch_attached(
    table: Arc<dyn ProcessTable>,
    poll: Duration,
    exit: ProcessExit,
    exited: CancellationToken,
    kill: CancellationToken,
    exits: mpsc::UnboundedSender<ProcessExit>,
) -> Option<i32> {
    let pid = exit.pid;
    loop {
        tokio::select! {
            _ = kill.cancelled() => {
                if !table.kill(pid) {
                    debug!(pid, "re-attached gateway already gone");
                }
                exited.cancel();
                return None;
            }
            _ = tokio::time::sleep(poll) => {
                if !table.is_alive(pid) {
                    exited.cancel();
                    debug!(pid, "re-attached gateway exited");
                    let _ = exits.send(exit);
                    return None;
                }
            }
        }
    }
}
