//! Retry policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how soft-restart delays evolve (step / max)
//!
//! ## Quick wiring
//! ```text
//! SupervisorConfig { soft_restart_backoff: BackoffPolicy, .. }
//!      └─► core::soft_restart::SoftRestartScheduler uses:
//!           - backoff.next(attempt) to delay the restart request
//! ```

mod backoff;

pub use backoff::BackoffPolicy;
