//! Supervisor events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: log tail ticker, process output forwarders, exit listener,
//!   `SoftRestartScheduler`.
//! - **Consumers**: `Supervisor::subscriber_listener()` (fans out to `SubscriberSet`)
//!   and any receiver handed out by `Supervisor::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
