//! # gatewayvisor
//!
//! **Gatewayvisor** keeps a brokerage trading gateway process connected to its
//! backend across the vendor's mandatory daily and weekly restart cycle.
//!
//! It launches the gateway (with its automation agent attached), reads the
//! agent's log to decide when the gateway is ready or why it failed, follows
//! the gateway's own automatic restarts by re-attaching to the replacement
//! process, and schedules deliberate soft restarts with backoff and a watchdog.
//! Callers see a small event API: output lines, error lines, exited, restarted.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!          Caller: start / stop / restart / soft_restart / is_running
//!                                   │
//! ┌─────────────────────────────────▼─────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - op lock (start / stop / restart never interleave)              │
//! │  - SupervisorState (lifecycle, sticky StartResult, restart flag)  │
//! │  - StartupCoordinator (ReadySlot + maintenance calendar)          │
//! │  - SoftRestartScheduler (backoff + watchdog)                      │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ProcessController     LogPump           RequestChannel
//!  (spawn / attach /     (LogTail +        (restart / shutdown
//!   monitor / kill)       Classifier)       flag files)
//!        │                  │
//!        ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: SupervisorConfig::bus_capacity)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │──► SubscriberSet ──► Subscribe::on_event
//!                       └────────────────────────┘
//!                       Supervisor::subscribe() ──► broadcast::Receiver<Event>
//! ```
//!
//! ### Lifecycle
//! ```text
//! Idle ──start──► Starting ──ready──► Running ──exit, restart announced──► RestartPending
//!                    │                   │                                   │
//!                    │ failed            │ unexpected exit          ready + replacement found
//!                    ▼                   ▼                                   ▼
//!               Exited (sticky)       Exited                              Running (Restarted)
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                          |
//! |-------------------|-------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Start, stop, restart, soft restart, re-attachment           | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Errors**        | Closed outcome taxonomy and host-level failures             | [`ErrorCode`], [`StartResult`], [`SupervisorError`] |
//! | **Classification**| Ordered first-match rules over the agent log                | [`Classifier`], [`Signal`], [`LogTail`]     |
//! | **Maintenance**   | Weekend and regional blackout windows                       | [`MaintenanceSchedule`], [`RegionMap`]      |
//! | **Subscriber API**| Callback fan-out or broadcast receiver                      | [`Subscribe`], [`Event`], [`EventKind`]     |
//! | **Configuration** | Login settings and runtime timings                          | [`Settings`], [`SupervisorConfig`]          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use gatewayvisor::{EventKind, Settings, SupervisorBuilder, SupervisorConfig, TradingMode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::new(
//!         "trader",
//!         "secret",
//!         TradingMode::Live,
//!         4001,
//!         "/opt/ibgateway/1030",
//!         "/opt/ibgateway/1030/ibgateway",
//!     )
//!     .with_version("1030");
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn gatewayvisor::Subscribe>> = vec![Arc::new(gatewayvisor::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn gatewayvisor::Subscribe>> = Vec::new();
//!
//!     let sup = SupervisorBuilder::new(settings, SupervisorConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let mut events = sup.subscribe();
//!     let result = sup.start(false).await;
//!     if result.has_error() {
//!         eprintln!("{result}");
//!         return;
//!     }
//!
//!     while let Ok(ev) = events.recv().await {
//!         match ev.kind {
//!             EventKind::Restarted => println!("gateway restarted"),
//!             EventKind::Exited => break,
//!             _ => {}
//!         }
//!     }
//!     sup.dispose().await;
//! }
//! ```
mod classifier;
mod core;
mod error;
mod events;
mod maintenance;
mod policies;
mod process;
mod request;
mod settings;
mod subscribers;

// ---- Public re-exports ----

pub use classifier::{Classifier, DEFAULT_RULES, LogTail, Rule, Signal};
pub use core::{DiscoveryConfig, Lifecycle, Supervisor, SupervisorBuilder, SupervisorConfig};
pub use error::{ErrorCode, StartResult, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use maintenance::{
    DailyWindow, MaintenanceSchedule, RegionMap, RegionResolution, ServerRegion, WeeklyWindow, dhm,
    hm, parse_peer_host, peer_host_from_jts_ini,
};
pub use policies::BackoffPolicy;
pub use process::{ProcessInfo, ProcessTable, REDACTED, Redactor, SysinfoTable, select_replacement};
pub use request::{FileFlagChannel, RESTART_FLAG, RequestChannel, SHUTDOWN_FLAG};
pub use settings::{ParseTradingModeError, Settings, TradingMode};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
