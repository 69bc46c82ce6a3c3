//! # SignalSupervisor: traps OS signals and runs callback chains off the signal context.
//!
//! ## Architecture
//! ```text
//! setup (needs &mut self):
//!   register(kind, callback) ──► CallbackChain[kind].push(callback)
//!
//! supervise(body) (consumes self):
//!   install traps ──► tokio signal driver (write-to-pipe handler, nothing else)
//!         │
//!         ▼
//!   trap task per kind ──┐
//!   SignalHandle::raise ─┴──► [delivery queue] ──► dispatcher
//!                                                    │
//!                                   spawn_blocking per delivery (never joined)
//!                                                    ├─► log "received system signal <KIND>"
//!                                                    ├─► publish SignalReceived
//!                                                    └─► chain.invoke(kind)  (registration order)
//!   body.await ──► result returned; traps and dispatcher are aborted
//! ```
//!
//! ## Rules
//! - Registering a kind outside the handled set fails with `UnhandledSignal`.
//! - Traps are armed before `body` is first polled.
//! - `supervise` consumes the supervisor, so chains cannot change once supervision starts
//!   and each instance installs its traps once.
//! - Repeated deliveries are not deduplicated; each runs the chain again.
//! - Once tokio traps a signal, the default OS action stays replaced for the rest of the
//!   process, even after `supervise` returns.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Dispatch;
use tracing::instrument::WithSubscriber;

use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::signals::{CallbackChain, CallbackRef, SignalKind};

/// Registers callback chains per signal and supervises a unit of work.
///
/// One instance per process is the intended usage; nothing enforces it.
pub struct SignalSupervisor {
    handled: Vec<SignalKind>,
    chains: HashMap<SignalKind, CallbackChain>,
    bus: Bus,
    tx: mpsc::UnboundedSender<SignalKind>,
    rx: mpsc::UnboundedReceiver<SignalKind>,
}

impl SignalSupervisor {
    /// Creates a supervisor handling [`SignalKind::HANDLED`].
    #[must_use]
    pub fn new(bus: Bus) -> Self {
        Self::with_signals(bus, SignalKind::HANDLED)
    }

    /// Creates a supervisor handling exactly `kinds` (duplicates ignored).
    #[must_use]
    pub fn with_signals(bus: Bus, kinds: impl IntoIterator<Item = SignalKind>) -> Self {
        let mut handled = Vec::new();
        for kind in kinds {
            if !handled.contains(&kind) {
                handled.push(kind);
            }
        }
        let chains = handled.iter().map(|k| (*k, CallbackChain::new())).collect();
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handled,
            chains,
            bus,
            tx,
            rx,
        }
    }

    /// Signals this supervisor traps, in installation order.
    pub fn handled(&self) -> &[SignalKind] {
        &self.handled
    }

    /// Appends `callback` to the chain for `kind`.
    ///
    /// Returns [`RuntimeError::UnhandledSignal`] if `kind` is not handled.
    pub fn register(
        &mut self,
        kind: SignalKind,
        callback: CallbackRef,
    ) -> Result<(), RuntimeError> {
        let chain = self
            .chains
            .get_mut(&kind)
            .ok_or(RuntimeError::UnhandledSignal { signal: kind })?;
        chain.push(callback);
        Ok(())
    }

    /// Returns the chain registered for `kind` (`None` if `kind` is not handled).
    pub fn chain(&self, kind: SignalKind) -> Option<&CallbackChain> {
        self.chains.get(&kind)
    }

    /// Returns a handle that injects synthetic deliveries.
    pub fn handle(&self) -> SignalHandle {
        SignalHandle {
            handled: self.handled.clone().into(),
            tx: self.tx.clone(),
        }
    }

    /// Installs traps for every handled signal, then runs `body` to completion.
    ///
    /// Deliveries raised through a [`SignalHandle`] before this call are dispatched
    /// as soon as supervision starts. If a trap cannot be installed, `body` never runs.
    pub async fn supervise<F, T, E>(self, body: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<RuntimeError>,
    {
        let Self {
            handled,
            chains,
            bus,
            tx,
            rx,
        } = self;

        let traps = install(&handled, &tx)?;
        drop(tx);

        let dispatcher =
            tokio::spawn(dispatch(rx, Arc::new(chains), bus).with_current_subscriber());
        let _armed = Armed {
            traps,
            dispatcher: Some(dispatcher),
        };

        body.await
    }
}

impl std::fmt::Debug for SignalSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSupervisor")
            .field("handled", &self.handled)
            .field("chains", &self.chains)
            .finish()
    }
}

/// Injects deliveries into a [`SignalSupervisor`] as if the OS had sent them.
#[derive(Clone, Debug)]
pub struct SignalHandle {
    handled: Arc<[SignalKind]>,
    tx: mpsc::UnboundedSender<SignalKind>,
}

impl SignalHandle {
    /// Queues one delivery of `kind`. Never blocks.
    ///
    /// Fails with [`RuntimeError::UnhandledSignal`] for kinds the supervisor does not
    /// handle, and with [`RuntimeError::SupervisorClosed`] once supervision has ended.
    pub fn raise(&self, kind: SignalKind) -> Result<(), RuntimeError> {
        if !self.handled.contains(&kind) {
            return Err(RuntimeError::UnhandledSignal { signal: kind });
        }
        self.tx
            .send(kind)
            .map_err(|_| RuntimeError::SupervisorClosed)
    }
}

/// Aborts the trap tasks and the dispatcher when supervision ends, even on panic.
struct Armed {
    traps: Vec<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Drop for Armed {
    fn drop(&mut self) {
        for trap in &self.traps {
            trap.abort();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
    }
}

/// Receives deliveries and hands each one to a fresh blocking task.
async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<SignalKind>,
    chains: Arc<HashMap<SignalKind, CallbackChain>>,
    bus: Bus,
) {
    // Blocking tasks do not inherit the caller's subscriber on their own.
    let logger = tracing::dispatcher::get_default(Dispatch::clone);
    while let Some(kind) = rx.recv().await {
        let chains = Arc::clone(&chains);
        let bus = bus.clone();
        let logger = logger.clone();
        tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&logger, || deliver(kind, &chains, &bus));
        });
    }
}

/// Runs on the blocking pool, never inside the OS signal handler.
fn deliver(kind: SignalKind, chains: &HashMap<SignalKind, CallbackChain>, bus: &Bus) {
    tracing::info!("received system signal {kind}");

    let chain = chains.get(&kind);
    bus.publish(
        Event::new(EventKind::SignalReceived)
            .with_signal(kind)
            .with_count(chain.map_or(0, CallbackChain::len)),
    );
    if let Some(chain) = chain {
        chain.invoke(kind, bus);
    }
}

#[cfg(unix)]
fn install(
    handled: &[SignalKind],
    tx: &mpsc::UnboundedSender<SignalKind>,
) -> Result<Vec<JoinHandle<()>>, RuntimeError> {
    use tokio::signal::unix::signal;

    let mut traps = Vec::with_capacity(handled.len());
    for &kind in handled {
        let mut stream = match signal(kind.to_unix()) {
            Ok(stream) => stream,
            Err(source) => {
                traps.iter().for_each(JoinHandle::abort);
                return Err(RuntimeError::SignalInstall {
                    signal: kind,
                    source,
                });
            }
        };
        let tx = tx.clone();
        traps.push(tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(kind).is_err() {
                    break;
                }
            }
        }));
    }
    Ok(traps)
}

/// Only Ctrl-C (`Interrupt`) can be trapped here; other kinds are reachable through
/// [`SignalHandle::raise`].
#[cfg(windows)]
fn install(
    handled: &[SignalKind],
    tx: &mpsc::UnboundedSender<SignalKind>,
) -> Result<Vec<JoinHandle<()>>, RuntimeError> {
    let mut traps = Vec::new();
    if handled.contains(&SignalKind::Interrupt) {
        let mut ctrl_c =
            tokio::signal::windows::ctrl_c().map_err(|source| RuntimeError::SignalInstall {
                signal: SignalKind::Interrupt,
                source,
            })?;
        let tx = tx.clone();
        traps.push(tokio::spawn(async move {
            while ctrl_c.recv().await.is_some() {
                if tx.send(SignalKind::Interrupt).is_err() {
                    break;
                }
            }
        }));
    }
    Ok(traps)
}

#[cfg(not(any(unix, windows)))]
fn install(
    _handled: &[SignalKind],
    _tx: &mpsc::UnboundedSender<SignalKind>,
) -> Result<Vec<JoinHandle<()>>, RuntimeError> {
    Ok(Vec::new())
}
