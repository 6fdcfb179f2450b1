//! Runtime core: orchestration and lifecycle.
//!
//! The public API from this module is [`Supervisor`], [`SupervisorBuilder`],
//! [`SupervisorConfig`] and [`Lifecycle`].
//!
//! Internal modules:
//! - [`slot`]: one-shot resettable readiness slot;
//! - [`startup`]: bounded "ready or failed" wait for one launch;
//! - [`pump`]: agent log tail → events and signals;
//! - [`restart`]: exit handling and re-attachment after expected restarts;
//! - [`soft_restart`]: deliberate restarts with backoff and watchdog;
//! - [`state`]: lifecycle, sticky result and restart flag;
//! - [`supervisor`]: public operations and background tasks.

mod builder;
mod config;
mod pump;
mod restart;
mod slot;
mod soft_restart;
mod startup;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{DiscoveryConfig, SupervisorConfig};
pub use state::Lifecycle;
pub use supervisor::Supervisor;
