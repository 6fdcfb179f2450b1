//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging caller-side handlers into the
//! supervisor. Each subscriber is driven by a dedicated worker loop fed by a bounded
//! queue that is owned by the [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching) – they do **not** block the
//!   supervisor nor other subscribers.
//! - Each subscriber **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If a queue overflows, events for that
//!   subscriber are **dropped** (warn).
//!
//! ## Example
//! ```rust
//! use gatewayvisor::{Event, EventKind, Subscribe};
//!
//! struct ExitAlarm;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for ExitAlarm {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::Exited {
//!             // page someone...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "exit-alarm" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
