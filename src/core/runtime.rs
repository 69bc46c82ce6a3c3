//! # Runtime: wires signals, run flag, listeners and subscribers together.
//!
//! ```text
//! RuntimeBuilder::build(driver)
//!   ├─► Bus::new(cfg.bus_capacity)
//!   ├─► SignalSupervisor::with_signals(cfg.signals)
//!   │      └─► for each handled kind: [stop_callback(state), user callbacks...]
//!   └─► Orchestrator::new(bindings)          (validate + connect, startup-fatal)
//!
//! Runtime::run(work)
//!   ├─► forwarder: Bus ──► SubscriberSet::emit(&Event)
//!   ├─► SignalSupervisor::supervise(Orchestrator::run(work))
//!   │      signal ──► stop_callback ──► RunState=false ──► loop drains and returns
//!   └─► forwarder drained, subscribers shut down
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use consumervisor::{
//!     Batch, Config, HandlerError, HandlerFn, Inline, ListenerBinding, LogWriter,
//!     MemoryBroker, MemoryDriver, RuntimeBuilder,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = MemoryBroker::new();
//!     broker.create_topic("payments");
//!
//!     let handler = HandlerFn::arc("payments", |batch: Batch| async move {
//!         println!("got {} messages", batch.len());
//!         Ok::<_, HandlerError>(())
//!     });
//!
//!     let runtime = RuntimeBuilder::new(Config::default())
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .with_binding(ListenerBinding::new("payments", "orders", handler))
//!         .build(&MemoryDriver::new(broker))?;
//!
//!     // Runs until SIGINT or SIGQUIT.
//!     runtime.run(Arc::new(Inline)).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::Orchestrator;
use crate::error::RuntimeError;
use crate::events::{Bus, Event};
use crate::listener::{Driver, ListenerBinding, WorkRef};
use crate::signals::{CallbackRef, SignalHandle, SignalKind, SignalSupervisor, stop_callback};
use crate::state::RunState;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Collects configuration, bindings, callbacks and subscribers for a [`Runtime`].
pub struct RuntimeBuilder {
    cfg: Config,
    state: Option<RunState>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bindings: Vec<ListenerBinding>,
    callbacks: Vec<(SignalKind, CallbackRef)>,
}

impl RuntimeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            state: None,
            subscribers: Vec::new(),
            bindings: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one listener binding.
    pub fn with_binding(mut self, binding: ListenerBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Adds several listener bindings, keeping their order.
    pub fn with_bindings(mut self, bindings: impl IntoIterator<Item = ListenerBinding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Appends `callback` to the chain for `kind`, after the built-in stop callback.
    ///
    /// `kind` must be in [`Config::signals`]; otherwise [`build`](Self::build) fails.
    pub fn on_signal(mut self, kind: SignalKind, callback: CallbackRef) -> Self {
        self.callbacks.push((kind, callback));
        self
    }

    /// Uses an existing run flag instead of a fresh one.
    pub fn with_state(mut self, state: RunState) -> Self {
        self.state = Some(state);
        self
    }

    /// Registers callbacks and connects every listener.
    ///
    /// All failures here are startup-fatal (see [`RuntimeError::is_startup_fatal`]).
    pub fn build(self, driver: &dyn Driver) -> Result<Runtime, RuntimeError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let state = self.state.unwrap_or_default();

        let mut signals = SignalSupervisor::with_signals(bus.clone(), self.cfg.handled_signals());
        for kind in self.cfg.handled_signals() {
            signals.register(kind, stop_callback(&state))?;
        }
        for (kind, callback) in self.callbacks {
            signals.register(kind, callback)?;
        }

        let orchestrator =
            Orchestrator::new(&self.cfg, state.clone(), bus.clone(), driver, &self.bindings)?;

        tracing::debug!(
            listeners = orchestrator.len(),
            signals = ?signals.handled(),
            "runtime built"
        );
        Ok(Runtime {
            bus,
            state,
            signals,
            orchestrator,
            subscribers: self.subscribers,
        })
    }
}

/// A built runtime, ready to [`run`](Runtime::run).
pub struct Runtime {
    bus: Bus,
    state: RunState,
    signals: SignalSupervisor,
    orchestrator: Orchestrator,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Runtime {
    /// Shared run flag; stopping it ends the consumption loop.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Handle that raises handled signals programmatically.
    pub fn signal_handle(&self) -> SignalHandle {
        self.signals.handle()
    }

    /// Event bus; receivers see events published after they subscribe.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Signals trapped while running.
    pub fn handled_signals(&self) -> &[SignalKind] {
        self.signals.handled()
    }

    /// Listener names in construction order.
    pub fn listeners(&self) -> impl Iterator<Item = &str> {
        self.orchestrator.listeners()
    }

    /// Traps signals and runs the consumption loop until the run flag flips or a
    /// listener fails. Subscribers see every event published before this returns.
    pub async fn run(self, work: WorkRef) -> Result<(), RuntimeError> {
        let Self {
            bus,
            signals,
            orchestrator,
            subscribers,
            ..
        } = self;

        let done = CancellationToken::new();
        let forwarder = (!subscribers.is_empty()).then(|| {
            let set = SubscriberSet::new(subscribers, bus.clone());
            forward(bus.subscribe(), set, done.clone())
        });

        let res = signals.supervise(orchestrator.run(work)).await;

        done.cancel();
        if let Some(forwarder) = forwarder {
            match forwarder.await {
                Ok(set) => set.shutdown().await,
                Err(e) => tracing::warn!(error = %e, "event forwarder failed"),
            }
        }
        res
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("state", &self.state)
            .field("signals", &self.signals)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

/// Forwards bus events to the subscriber set until `done`, then drains what is queued.
fn forward(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    done: CancellationToken,
) -> JoinHandle<SubscriberSet> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event forwarder lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                () = done.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        set
    })
}
