//! # Demo: threaded
//!
//! One task per listener on a multi-threaded runtime, a timing work wrapper, and a
//! custom subscriber. Stops itself after a few seconds by raising SIGTERM through a
//! [`SignalHandle`](consumervisor::SignalHandle); a real SIGTERM or Ctrl-C works too.
//!
//! ## Flow
//! ```text
//! Orchestrator (PerListener)
//!   ├─► task: audit/orders.fetch()   ──► WorkFn(timing) ──► handler
//!   ├─► task: audit/shipments.fetch()──► WorkFn(timing) ──► handler
//!   └─► task: audit/returns.fetch()  ──► WorkFn(timing) ──► handler
//!
//! Bus ──► Counter (custom Subscribe) + LogWriter
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example threaded
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use consumervisor::{
    Batch, Config, DispatchPolicy, Event, EventKind, HandlerError, HandlerFn, HandlerRef,
    ListenerBinding, LogWriter, MemoryBroker, MemoryDriver, RuntimeBuilder, Scheduling, SignalKind,
    Subscribe, WorkFn, WorkRef,
};
use tracing_subscriber::EnvFilter;

/// Counts processed messages from `BatchProcessed` events.
#[derive(Default)]
struct Counter {
    messages: AtomicU64,
}

#[async_trait]
impl Subscribe for Counter {
    async fn on_event(&self, ev: &Event) {
        self.messages
            .fetch_add(u64::from(ev.count.unwrap_or(0)), Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "counter"
    }

    fn wants(&self, kind: EventKind) -> bool {
        kind == EventKind::BatchProcessed
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let topics = ["orders", "shipments", "returns"];
    let broker = MemoryBroker::new();
    for topic in topics {
        broker.create_topic(topic);
    }

    let audit = HandlerFn::arc("audit", |batch: Batch| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracing::debug!(topic = %batch.topic, messages = batch.len(), "audited");
        Ok::<_, HandlerError>(())
    });
    let bindings = topics.map(|topic| {
        ListenerBinding::new(topic, "audit", audit.clone())
            .with_dispatch(DispatchPolicy::PerMessage)
            .with_property("max.poll.records", "50")
    });

    let timing: WorkRef = WorkFn::arc(|handler: HandlerRef, batch: Batch| async move {
        let started = Instant::now();
        let topic = batch.topic.clone();
        let res = handler.handle(batch).await;
        tracing::trace!(%topic, elapsed = ?started.elapsed(), "handled");
        res
    });

    let counter = Arc::new(Counter::default());
    let cfg = Config::setup(|cfg| {
        cfg.scheduling = Scheduling::PerListener;
        cfg.signals = vec![SignalKind::Interrupt, SignalKind::Terminate];
    });
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![counter.clone(), Arc::new(LogWriter::new())];
    let runtime = RuntimeBuilder::new(cfg)
        .with_subscribers(subscribers)
        .with_bindings(bindings)
        .build(&MemoryDriver::new(broker.clone()).with_poll_timeout(Duration::from_millis(100)))?;

    for (i, topic) in topics.iter().cycle().take(600).enumerate() {
        broker.publish_keyed(topic, i.to_string(), format!("event-{i}"));
    }

    let signals = runtime.signal_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        if let Err(e) = signals.raise(SignalKind::Terminate) {
            tracing::warn!(error = %e, "could not raise SIGTERM");
        }
    });

    runtime.run(timing).await?;
    tracing::info!(
        processed = counter.messages.load(Ordering::Relaxed),
        "all listeners stopped"
    );
    Ok(())
}
