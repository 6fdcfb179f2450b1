//! # Events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across two categories:
//! - **Notifications**: the caller-facing contract (output, error, exited, restarted)
//! - **Soft-restart events**: scheduling and watchdog activity
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! (redacted) text line, exit codes and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use gatewayvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::OutputLine).with_line("Configuration settings updated.");
//!
//! assert_eq!(ev.kind, EventKind::OutputLine);
//! assert_eq!(ev.line.as_deref(), Some("Configuration settings updated."));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Notifications ===
    /// One line of gateway output (already redacted).
    ///
    /// Sets:
    /// - `line`: the text
    OutputLine,

    /// One line of gateway error output, or an error surfaced by the supervisor.
    ///
    /// Sets:
    /// - `line`: the text
    ErrorLine,

    /// The gateway exited and will not be re-attached.
    ///
    /// Sets:
    /// - `exit_code`: process exit code, `None` when it cannot be retrieved
    ///   (re-attached processes are not children of the supervisor)
    Exited,

    /// The gateway completed an expected restart and was re-attached,
    /// or a soft restart was abandoned after its watchdog fired twice.
    Restarted,

    // === Soft restart ===
    /// A soft restart request was scheduled.
    ///
    /// Sets:
    /// - `attempt`: attempt number within the current reset period
    /// - `delay_ms`: delay before the request is written
    SoftRestartScheduled,

    /// The soft-restart watchdog fired before a restart was observed.
    ///
    /// Sets:
    /// - `attempt`: attempt number that timed out
    /// - `reason`: "retry" or "gave up"
    SoftRestartTimedOut,
}

/// Supervisor event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Text line (output / error), never containing the password.
    pub line: Option<Arc<str>>,
    /// Process exit code.
    pub exit_code: Option<i32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            line: None,
            exit_code: None,
            delay_ms: None,
            attempt: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    #[inline]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Shorthand for an [`EventKind::OutputLine`] event.
    #[inline]
    pub fn output(line: impl Into<Arc<str>>) -> Self {
        Event::now(EventKind::OutputLine).with_line(line)
    }

    /// Shorthand for an [`EventKind::ErrorLine`] event.
    #[inline]
    pub fn error(line: impl Into<Arc<str>>) -> Self {
        Event::now(EventKind::ErrorLine).with_line(line)
    }

    #[inline]
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::now(EventKind::Restarted);
        let b = Event::now(EventKind::Restarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_round_trips_through_millis() {
        let ev = Event::now(EventKind::SoftRestartScheduled).with_delay(Duration::from_secs(300));
        assert_eq!(ev.delay(), Some(Duration::from_secs(300)));
    }
}
