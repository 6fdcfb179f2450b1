//! # ReadySlot: one-shot, resettable readiness signal.
//!
//! Backed by a [`tokio::sync::watch`] channel holding `Option<Readiness>`.
//! The first [`ReadySlot::resolve`] after a [`ReadySlot::reset`] wins; later
//! resolutions are ignored until the next reset. Waiters never poll.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::StartResult;

/// Why a wait ended without a readiness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AbortReason {
    /// The weekly re-authentication boundary was crossed.
    TokenExpired,
    /// The caller stopped the supervisor.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Readiness {
    Ready,
    Failed(StartResult),
    Aborted(AbortReason),
}

pub(crate) struct ReadySlot {
    tx: watch::Sender<Option<Readiness>>,
}

impl ReadySlot {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Clears any previous verdict.
    pub(crate) fn reset(&self) {
        self.tx.send_replace(None);
    }

    /// Stores `value` unless a verdict is already present.
    pub(crate) fn resolve(&self, value: Readiness) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        })
    }

    /// Waits up to `timeout` for a verdict; `None` on timeout.
    pub(crate) async fn wait(&self, timeout: Duration) -> Option<Readiness> {
        let mut rx = self.tx.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(value)) => (*value).clone(),
            _ => None,
        }
    }
}
