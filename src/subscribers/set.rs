//! # SubscriberSet: delivery of gateway events to callbacks
//!
//! The supervisor's subscriber listener hands every bus event to
//! [`SubscriberSet::emit`]. Each callback owns a bounded queue and a worker
//! task, so a slow or broken callback never holds up the gateway's output
//! forwarders or the operation lock.
//!
//! ## Delivery
//! - Lines arrive already redacted, in the order the bus saw them.
//! - A full queue drops the event for that callback only; the gap shows up
//!   as a jump in [`Event::seq`](crate::events::Event).
//! - A panicking callback is logged and keeps receiving later events.
//! - On dispose, events already queued are delivered before the workers exit.
//!
//! ```text
//!   subscriber_listener ─► emit(&Event) ─┬─► [queue] ─► worker ─► on_event()
//!                                        └─► [queue] ─► worker ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, warn};

use crate::events::Event;

use super::Subscribe;

struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Callbacks registered on the builder, each behind its own queue.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    name: sub.name(),
                    queue,
                };
                (lane, tokio::spawn(deliver(sub, rx)))
            })
            .unzip();
        Self { lanes, workers }
    }

    /// Queues `event` for every callback without waiting on any of them.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for lane in &self.lanes {
            let reason = match lane.queue.try_send(Arc::clone(&ev)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "queue full",
                Err(mpsc::error::TrySendError::Closed(_)) => "worker gone",
            };
            warn!(subscriber = lane.name, seq = ev.seq, kind = ?ev.kind, reason, "gateway event dropped");
        }
    }

    /// Closes the queues and waits for the workers to drain them.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>) {
    while let Some(ev) = rx.recv().await {
        let call = std::panic::AssertUnwindSafe(sub.on_event(&ev));
        if let Err(panic) = call.catch_unwind().await {
            error!(subscriber = sub.name(), seq = ev.seq, panic = ?panic, "subscriber panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.seen.lock().push(ev.kind);
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _ev: &Event) {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn fans_out_in_order_and_survives_panics() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![Arc::new(Panicker) as Arc<dyn Subscribe>, rec.clone()]);
        assert_eq!(set.len(), 2);

        set.emit(&Event::output("a"));
        set.emit(&Event::now(EventKind::Exited));
        set.emit(&Event::now(EventKind::Restarted));
        tokio::time::sleep(Duration::from_millis(50)).await;
        set.shutdown().await;

        assert_eq!(
            *rec.seen.lock(),
            vec![EventKind::OutputLine, EventKind::Exited, EventKind::Restarted]
        );
    }

    struct Stuck {
        release: tokio::sync::Notify,
        seen: Mutex<usize>,
    }

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _ev: &Event) {
            self.release.notified().await;
            *self.seen.lock() += 1;
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn full_queue_drops_only_for_the_slow_callback() {
        let stuck = Arc::new(Stuck {
            release: tokio::sync::Notify::new(),
            seen: Mutex::new(0),
        });
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![stuck.clone() as Arc<dyn Subscribe>, rec.clone()]);

        set.emit(&Event::output("first"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        // worker holds "first"; the queue takes one more
        for line in ["second", "third", "fourth"] {
            set.emit(&Event::output(line));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(rec.seen.lock().len(), 4);

        stuck.release.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stuck.release.notify_one();
        set.shutdown().await;
        assert_eq!(*stuck.seen.lock(), 2);
    }
}
