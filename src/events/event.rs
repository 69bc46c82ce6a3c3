//! # Lifecycle events.
//!
//! Everything observable about a run is published as an [`Event`]: signal
//! deliveries, callback failures, orchestrator and listener lifecycle, batch
//! flow, and trouble inside subscriber workers.
//!
//! `seq` comes from one process-wide counter. Subscribers that buffer or
//! reorder should sort on it, not on `at`.
//!
//! ```rust
//! use consumervisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BatchProcessed)
//!     .with_source("orders/payments")
//!     .with_count(12);
//!
//! assert_eq!(ev.kind, EventKind::BatchProcessed);
//! assert_eq!(ev.source.as_deref(), Some("orders/payments"));
//! assert_eq!(ev.count, Some(12));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::signals::SignalKind;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened. Each variant lists the [`Event`] fields it fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A handled signal arrived, from the OS or from
    /// [`SignalHandle::raise`](crate::SignalHandle::raise).
    /// `signal`, and `count` = callbacks in the chain.
    SignalReceived,
    /// A signal callback returned `Err` or panicked.
    /// `signal`, `source` = callback, `reason`.
    CallbackFailed,

    /// The fetch loop is about to start. `count` = listener units.
    OrchestratorStarted,
    /// The fetch loop returned. `reason` is the error label on failure.
    OrchestratorStopped,

    /// `source` = listener.
    ListenerStarted,
    /// Fetching ended and the consumer was closed. `source` = listener.
    ListenerStopped,
    /// A non-empty batch went through the work wrapper.
    /// `source` = listener, `count` = messages.
    BatchProcessed,
    /// `fetch` failed and the run is ending. `source` = listener, `reason`.
    FetchFailed,

    /// A subscriber lane dropped an event. `source` = subscriber,
    /// `reason` = `"full"` or `"closed"`.
    SubscriberOverflow,
    /// A subscriber panicked in `on_event`. `source` = subscriber, `reason`.
    SubscriberPanicked,
}

/// One published occurrence. Optional fields depend on [`EventKind`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Position in the process-wide event order.
    pub seq: u64,
    /// When the event was built.
    pub at: SystemTime,
    pub kind: EventKind,
    /// Listener, callback or subscriber name.
    pub source: Option<Arc<str>>,
    pub signal: Option<SignalKind>,
    /// Messages, units or callbacks, depending on `kind`.
    pub count: Option<u32>,
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Stamps `seq` and `at`; every optional field starts empty.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            signal: None,
            count: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[inline]
    pub fn with_signal(mut self, signal: SignalKind) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Counts above `u32::MAX` are clamped.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub(crate) fn subscriber_overflow(subscriber: &'static str, why: &'static str) -> Self {
        Self::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(why)
    }

    pub(crate) fn subscriber_panicked(subscriber: &'static str, message: String) -> Self {
        Self::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(message)
    }

    /// Overflow reports are never re-reported as overflow.
    #[inline]
    pub(crate) fn is_subscriber_overflow(&self) -> bool {
        self.kind == EventKind::SubscriberOverflow
    }
}
