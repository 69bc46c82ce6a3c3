//! # Subscribe: observe runtime events off the hot path.
//!
//! Signal deliveries, the orchestrator and listener units publish [`Event`]s on the bus.
//! A [`Subscribe`] implementation receives them through its own worker and queue, so a
//! slow exporter never delays a fetch or a signal callback.
//!
//! ```text
//! emit(ev) ──► wants(ev.kind)? ──no──► skipped
//!                    │ yes
//!                    ▼
//!              [bounded queue] ──► worker ──► on_event(&ev)
//!                    │ full
//!                    ▼
//!              SubscriberOverflow
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use async_trait::async_trait;
//! use consumervisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct Throughput(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for Throughput {
//!     async fn on_event(&self, ev: &Event) {
//!         self.0.fetch_add(u64::from(ev.count.unwrap_or(0)), Ordering::Relaxed);
//!     }
//!
//!     fn name(&self) -> &'static str { "throughput" }
//!
//!     fn wants(&self, kind: EventKind) -> bool {
//!         kind == EventKind::BatchProcessed
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Event consumer attached to a runtime.
///
/// `on_event` runs on a dedicated task; use async I/O there and handle errors in place.
/// A panic is caught and reported as `EventKind::SubscriberPanicked`.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name reported in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (at least 1). Overflowing events are dropped.
    fn queue_capacity(&self) -> usize {
        1024
    }

    /// Filters events before they are queued. The default accepts everything.
    fn wants(&self, kind: EventKind) -> bool {
        let _ = kind;
        true
    }
}
