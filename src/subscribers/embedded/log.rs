//! # LogWriter: tracing-backed event writer
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Use it for demos or when the host has no handler of its own.
//!
//! ## Example output
//! ```text
//! INFO  gateway output line="Configuration settings updated."
//! WARN  gateway exited exit_code=Some(1)
//! INFO  gateway restarted
//! INFO  soft restart scheduled attempt=2 delay_ms=300000
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::OutputLine => {
                info!(line = e.line.as_deref().unwrap_or(""), "gateway output");
            }
            EventKind::ErrorLine => {
                warn!(line = e.line.as_deref().unwrap_or(""), "gateway error");
            }
            EventKind::Exited => {
                warn!(exit_code = ?e.exit_code, "gateway exited");
            }
            EventKind::Restarted => {
                info!("gateway restarted");
            }
            EventKind::SoftRestartScheduled => {
                info!(attempt = ?e.attempt, delay_ms = ?e.delay_ms, "soft restart scheduled");
            }
            EventKind::SoftRestartTimedOut => {
                warn!(attempt = ?e.attempt, reason = ?e.reason, "soft restart timed out");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
