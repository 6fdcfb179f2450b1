//! # Backoff policy for soft restarts.
//!
//! [`BackoffPolicy`] controls how the delay before a soft restart grows when
//! restarts are requested repeatedly within one reset period.
//! It is parameterized by:
//! - [`BackoffPolicy::step`] the delay added per previous attempt;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` (1-based) is `step × (n − 1)`, clamped to `max`.
//! The first attempt is therefore immediate.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use gatewayvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy {
//!     step: Duration::from_secs(300),
//!     max: Duration::from_secs(3600),
//! };
//!
//! assert_eq!(backoff.next(1), Duration::ZERO);
//! assert_eq!(backoff.next(2), Duration::from_secs(300));
//! assert_eq!(backoff.next(3), Duration::from_secs(600));
//! ```

use std::time::Duration;

/// Linear restart backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay added for every attempt after the first.
    pub step: Duration,
    /// Maximum delay cap.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `step = 5m`;
    /// - `max = 1h`.
    fn default() -> Self {
        Self {
            step: Duration::from_secs(5 * 60),
            max: Duration::from_secs(60 * 60),
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (1-based).
    ///
    /// Attempt `0` is treated like attempt `1`.
    pub fn next(&self, attempt: u32) -> Duration {
        let prior = attempt.saturating_sub(1);
        self.step
            .checked_mul(prior)
            .map_or(self.max, |d| d.min(self.max))
    }
}
