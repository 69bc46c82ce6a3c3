//! # SubscriberSet: fan-out from the runtime forwarder to every subscriber.
//!
//! ```text
//! emit(&ev) ─► Arc<Event> ─┬─► [queue: LogWriter] ─► worker ─► on_event
//!                          ├─► [queue: metrics]   ─► worker ─► on_event
//!                          └─► (not wanted)          skipped
//!
//!  worker panic  ─► Bus: SubscriberPanicked { source, reason }
//!  queue full    ─► Bus: SubscriberOverflow { source, "full" }
//!  worker gone   ─► Bus: SubscriberOverflow { source, "closed" }
//! ```
//!
//! ## Rules
//! - `emit` never awaits; queues are bounded per subscriber.
//! - Each subscriber sees the events it wants in publish order; there is no ordering
//!   across subscribers.
//! - Overflow reports are never reported as overflowing themselves.
//! - `shutdown` lets every worker drain its queue before returning.
//!
//! Panics are caught with `AssertUnwindSafe`; a subscriber that panics while holding
//! a lock may leave its own state inconsistent.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::panic_message;
use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

struct Lane {
    sub: Arc<dyn Subscribe>,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Bounded, panic-isolated delivery to a fixed list of subscribers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Needs a running tokio runtime.
    ///
    /// Panic and overflow reports are published on `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers): (Vec<Lane>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let worker = tokio::spawn(run_worker(Arc::clone(&sub), rx, bus.clone()));
                (Lane { sub, queue }, worker)
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber that wants its kind.
    pub fn emit(&self, event: &Event) {
        let shared = Arc::new(event.clone());
        for lane in &self.lanes {
            if !lane.sub.wants(shared.kind) {
                continue;
            }
            let reason = match lane.queue.try_send(Arc::clone(&shared)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if !shared.is_subscriber_overflow() {
                self.bus
                    .publish(Event::subscriber_overflow(lane.sub.name(), reason));
            }
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

    /// Closes every queue and waits until the workers have drained them.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "subscriber worker did not finish cleanly");
            }
        }
    }
}

async fn run_worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        if let Err(payload) = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await {
            bus.publish(Event::subscriber_panicked(
                sub.name(),
                panic_message(payload.as_ref()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        seen: Arc<Mutex<Vec<EventKind>>>,
        only: Option<EventKind>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }

        fn wants(&self, kind: EventKind) -> bool {
            self.only.is_none_or(|only| only == kind)
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber exploded");
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_drains_on_shutdown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(
            vec![Arc::new(Recorder {
                seen: seen.clone(),
                only: None,
            })],
            Bus::new(8),
        );
        assert_eq!(set.len(), 1);

        set.emit(&Event::new(EventKind::ListenerStarted));
        set.emit(&Event::new(EventKind::ListenerStopped));
        set.shutdown().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::ListenerStarted, EventKind::ListenerStopped]
        );
    }

    #[tokio::test]
    async fn unwanted_kinds_are_skipped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(
            vec![Arc::new(Recorder {
                seen: seen.clone(),
                only: Some(EventKind::FetchFailed),
            })],
            Bus::new(8),
        );

        set.emit(&Event::new(EventKind::BatchProcessed));
        set.emit(&Event::new(EventKind::FetchFailed));
        set.shutdown().await;

        assert_eq!(*seen.lock().unwrap(), vec![EventKind::FetchFailed]);
    }

    #[tokio::test]
    async fn panics_are_reported_on_the_bus() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Panicker)], bus);

        set.emit(&Event::new(EventKind::ListenerStarted));
        set.shutdown().await;

        let ev = rx.recv().await.expect("panic event");
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.source.as_deref(), Some("panicker"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));
    }
}
