//! # Global runtime configuration.
//!
//! Provides [`SupervisorConfig`], the centralized timing and discovery settings of
//! the supervisor runtime. [`Default`] yields the production values; tests shrink
//! the durations.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - zero periods (`tail_period`, `exit_poll_period`) → clamped to 1ms

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Markers used to pick the gateway among several candidate processes.
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Command-line marker of a gateway started by its own restart logic.
    pub restart_marker: String,
    /// Command-line marker of a gateway running with the automation agent.
    pub agent_marker: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            restart_marker: "-restart".to_string(),
            agent_marker: "ibautomater".to_string(),
        }
    }
}

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `startup_timeout`: bound of the "ready or failed" wait after a launch
/// - `restart_timeout`: bound of the readiness wait after an expected auto-restart
/// - `soft_restart_watchdog`: time a soft restart has to complete
/// - `soft_restart_backoff`: delay growth across soft restarts within one reset period
/// - `attempt_reset_period`: how often the soft-restart attempt counter is zeroed
/// - `tail_period`: agent log polling period
/// - `exit_poll_period`: liveness polling period for re-attached processes
/// - `shutdown_grace`: wait for a clean shutdown before force-killing
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    pub startup_timeout: Duration,
    pub restart_timeout: Duration,
    pub soft_restart_watchdog: Duration,
    pub soft_restart_backoff: BackoffPolicy,
    pub attempt_reset_period: Duration,
    pub tail_period: Duration,
    pub exit_poll_period: Duration,
    pub shutdown_grace: Duration,
    pub bus_capacity: usize,
    pub discovery: DiscoveryConfig,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    #[inline]
    pub fn tail_period_clamped(&self) -> Duration {
        self.tail_period.max(Duration::from_millis(1))
    }

    #[inline]
    pub fn exit_poll_period_clamped(&self) -> Duration {
        self.exit_poll_period.max(Duration::from_millis(1))
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `startup_timeout = 15m`, `restart_timeout = 15m`
    /// - `soft_restart_watchdog = 10m`
    /// - `soft_restart_backoff = 5m steps`
    /// - `attempt_reset_period = 1h`
    /// - `tail_period = 1s`, `exit_poll_period = 1s`
    /// - `shutdown_grace = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(15 * 60),
            restart_timeout: Duration::from_secs(15 * 60),
            soft_restart_watchdog: Duration::from_secs(10 * 60),
            soft_restart_backoff: BackoffPolicy::default(),
            attempt_reset_period: Duration::from_secs(60 * 60),
            tail_period: Duration::from_secs(1),
            exit_poll_period: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
            bus_capacity: 1024,
            discovery: DiscoveryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_clamped() {
        let cfg = SupervisorConfig {
            bus_capacity: 0,
            tail_period: Duration::ZERO,
            exit_poll_period: Duration::ZERO,
            ..SupervisorConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.tail_period_clamped(), Duration::from_millis(1));
        assert_eq!(cfg.exit_poll_period_clamped(), Duration::from_millis(1));
    }

    #[test]
    fn defaults_match_gateway_cycle() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.startup_timeout, Duration::from_secs(900));
        assert_eq!(cfg.soft_restart_watchdog, Duration::from_secs(600));
        assert_eq!(cfg.soft_restart_backoff.next(2), Duration::from_secs(300));
    }
}
