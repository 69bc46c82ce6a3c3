//! # Demo: consume
//!
//! One process, two listeners, round-robin scheduling, graceful stop on Ctrl-C.
//!
//! Shows how to:
//! - Bind handlers to topics with [`ListenerBinding`].
//! - Add a flush step after the built-in stop callback with [`RuntimeBuilder::on_signal`].
//! - Render runtime events through `tracing` with [`LogWriter`].
//!
//! ## Flow
//! ```text
//! producer task ──► MemoryBroker ──► Orchestrator (RoundRobin)
//!                                       ├─► billing/payments.fetch()
//!                                       └─► billing/refunds.fetch()
//! Ctrl-C ──► [run-state-stop, flush] ──► loop drains ──► exit
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info,consumervisor=debug cargo run --example consume
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use consumervisor::{
    Batch, CallbackError, CallbackFn, Config, HandlerError, HandlerFn, HandlerRef, Inline,
    ListenerBinding, LogWriter, MemoryBroker, MemoryDriver, RuntimeBuilder, SignalKind,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let broker = MemoryBroker::new();
    broker.create_topic("payments");
    broker.create_topic("refunds");

    let total = Arc::new(AtomicU64::new(0));
    let payments: HandlerRef = {
        let total = total.clone();
        HandlerFn::arc("payments", move |batch: Batch| {
            let total = total.clone();
            async move {
                for msg in &batch.messages {
                    let amount: u64 = std::str::from_utf8(&msg.payload)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| {
                            HandlerError::fail(format!("bad amount at offset {}", msg.offset))
                        })?;
                    total.fetch_add(amount, Ordering::Relaxed);
                }
                tracing::info!(messages = batch.len(), "payments settled");
                Ok::<_, HandlerError>(())
            }
        })
    };
    let refunds = HandlerFn::arc("refunds", |batch: Batch| async move {
        tracing::info!(messages = batch.len(), last = ?batch.last_offset(), "refunds queued");
        Ok::<_, HandlerError>(())
    });

    let flush = {
        let total = total.clone();
        CallbackFn::arc("flush", move |signal: SignalKind| -> Result<(), CallbackError> {
            tracing::info!(%signal, settled = total.load(Ordering::Relaxed), "flushing totals");
            Ok(())
        })
    };

    let runtime = RuntimeBuilder::new(Config::default())
        .with_subscribers(vec![Arc::new(LogWriter::new())])
        .with_binding(ListenerBinding::new("payments", "billing", payments))
        .with_binding(ListenerBinding::new("refunds", "billing", refunds))
        .on_signal(SignalKind::Interrupt, flush)
        .build(&MemoryDriver::new(broker.clone()).with_poll_timeout(Duration::from_millis(250)))?;

    let producer = {
        let broker = broker.clone();
        let state = runtime.state().clone();
        tokio::spawn(async move {
            let mut n: u64 = 0;
            while state.is_running() {
                n += 1;
                broker.publish("payments", (n * 10).to_string());
                if n % 5 == 0 {
                    broker.publish_keyed("refunds", n.to_string(), "full");
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
    };

    tracing::info!("consuming; press Ctrl-C to stop");
    runtime.run(Arc::new(Inline)).await?;
    producer.await?;

    tracing::info!(
        settled = total.load(Ordering::Relaxed),
        unread = broker.lag("payments", "billing"),
        "stopped"
    );
    Ok(())
}
