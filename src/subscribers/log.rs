//! # LogWriter: renders runtime events through `tracing`.
//!
//! ## Example output
//! ```text
//! INFO  consumervisor: orchestrator started listeners=2
//! INFO  consumervisor: listener started listener=orders/payments
//! DEBUG consumervisor: batch processed listener=orders/payments messages=12
//! ERROR consumervisor: fetch failed listener=orders/payments reason="poll failed: broker down"
//! WARN  consumervisor: signal callback failed signal=SIGINT callback=flush reason="..."
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let source = e.source.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::SignalReceived => {
                tracing::debug!(signal = ?e.signal, callbacks = ?e.count, "signal dispatched");
            }
            EventKind::CallbackFailed => {
                tracing::warn!(
                    signal = ?e.signal,
                    callback = source,
                    reason,
                    "signal callback failed"
                );
            }
            EventKind::OrchestratorStarted => {
                tracing::info!(listeners = ?e.count, "orchestrator started");
            }
            EventKind::OrchestratorStopped => {
                tracing::info!(reason, "orchestrator stopped");
            }
            EventKind::ListenerStarted => {
                tracing::info!(listener = source, "listener started");
            }
            EventKind::ListenerStopped => {
                tracing::info!(listener = source, "listener stopped");
            }
            EventKind::BatchProcessed => {
                tracing::debug!(listener = source, messages = ?e.count, "batch processed");
            }
            EventKind::FetchFailed => {
                tracing::error!(listener = source, reason, "fetch failed");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = source, reason, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = source, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
