//! # Orchestrator: drives every listener unit until the run flag flips.
//!
//! ## Construction
//! [`Orchestrator::new`] validates each binding and connects one consumer per binding,
//! in order. The first failure aborts construction (no later binding is connected)
//! and is startup-fatal.
//!
//! ## Scheduling
//! ```text
//! RoundRobin (single task):
//!   while running:
//!     for unit in units:            (construction order)
//!       if !running → break
//!       unit.fetch(work)?           (first error ends the pass and the loop)
//!     yield
//!
//! PerListener (one task per unit):
//!   task_i: while running && !halted: unit_i.fetch(work)?
//!           error/panic → halt siblings
//!   run joins task_0..task_n, returns the first error in construction order
//!   run dropped → every task abandons its fetch and closes its consumer
//! ```
//!
//! ## Rules
//! - No unit starts a fetch after the flag reads `false`; in-flight fetches complete.
//! - Every consumer is closed before `run` returns, on success and error paths.
//! - Listener tasks do not outlive a dropped `run` future.
//! - With no units, `run` waits for the flag instead of spinning.
//! - Panics inside a fetch surface as [`RuntimeError::ListenerPanicked`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Scheduling};
use crate::error::{RuntimeError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::listener::{Driver, ListenerBinding, ListenerUnit, Work, WorkRef};
use crate::state::RunState;

/// Owns the listener units and runs the consumption loop.
pub struct Orchestrator {
    scheduling: Scheduling,
    state: RunState,
    bus: Bus,
    units: Vec<ListenerUnit>,
}

impl Orchestrator {
    /// Connects one listener unit per binding.
    ///
    /// Fails with [`RuntimeError::InvalidBinding`] or [`RuntimeError::Connect`]; bindings
    /// after the failing one are never connected.
    pub fn new(
        cfg: &Config,
        state: RunState,
        bus: Bus,
        driver: &dyn Driver,
        bindings: &[ListenerBinding],
    ) -> Result<Self, RuntimeError> {
        let units = bindings
            .iter()
            .map(|binding| ListenerUnit::connect(binding, driver, bus.clone()))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| tracing::error!(error = %e, "failed to build listeners"))?;

        Ok(Self {
            scheduling: cfg.scheduling,
            state,
            bus,
            units,
        })
    }

    /// Listener names in construction order.
    pub fn listeners(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(ListenerUnit::name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The run flag this orchestrator obeys.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Fetches from every unit until the run flag flips or a fetch fails.
    pub async fn run(self, work: WorkRef) -> Result<(), RuntimeError> {
        let Self {
            scheduling,
            state,
            bus,
            units,
        } = self;

        bus.publish(Event::new(EventKind::OrchestratorStarted).with_count(units.len()));
        for unit in &units {
            bus.publish(Event::new(EventKind::ListenerStarted).with_source(unit.name()));
        }

        let res = match scheduling {
            Scheduling::RoundRobin => round_robin(units, &state, work.as_ref()).await,
            Scheduling::PerListener => per_listener(units, &state, work).await,
        };

        let mut stopped = Event::new(EventKind::OrchestratorStopped);
        if let Err(e) = &res {
            tracing::error!(error = %e, "consumption loop failed");
            stopped = stopped.with_reason(e.as_label());
        }
        bus.publish(stopped);
        res
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("scheduling", &self.scheduling)
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

async fn round_robin(
    mut units: Vec<ListenerUnit>,
    state: &RunState,
    work: &dyn Work,
) -> Result<(), RuntimeError> {
    if units.is_empty() {
        state.stopped().await;
        return Ok(());
    }

    let res = rotate(&mut units, state, work).await;
    for unit in units {
        unit.close().await;
    }
    res
}

async fn rotate(
    units: &mut [ListenerUnit],
    state: &RunState,
    work: &dyn Work,
) -> Result<(), RuntimeError> {
    while state.is_running() {
        for unit in units.iter_mut() {
            if !state.is_running() {
                break;
            }
            guarded_fetch(unit, work).await?;
        }
        // Lets signal deliveries progress on a current-thread runtime.
        tokio::task::yield_now().await;
    }
    Ok(())
}

async fn per_listener(
    units: Vec<ListenerUnit>,
    state: &RunState,
    work: WorkRef,
) -> Result<(), RuntimeError> {
    if units.is_empty() {
        state.stopped().await;
        return Ok(());
    }

    let halt = CancellationToken::new();
    let abandon = CancellationToken::new();
    // Fires when this future is dropped before the joins finish.
    let _abandon_on_drop = abandon.clone().drop_guard();

    let handles: Vec<(String, JoinHandle<Result<(), RuntimeError>>)> = units
        .into_iter()
        .map(|unit| {
            let name = unit.name().to_string();
            let task = drive(
                unit,
                state.clone(),
                halt.clone(),
                abandon.clone(),
                Arc::clone(&work),
            );
            (name, tokio::spawn(task))
        })
        .collect();

    let mut first = None;
    for (name, handle) in handles {
        let res = match handle.await {
            Ok(res) => res,
            Err(join) => Err(RuntimeError::ListenerPanicked {
                listener: name,
                reason: if join.is_panic() {
                    panic_message(join.into_panic().as_ref())
                } else {
                    "task cancelled".to_string()
                },
            }),
        };
        if let Err(e) = res {
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

/// Body of one per-listener task.
///
/// `halt` is checked between fetches. `abandon` means nobody is joining any more,
/// so it also cuts an in-flight fetch short; the consumer is closed either way.
async fn drive(
    mut unit: ListenerUnit,
    state: RunState,
    halt: CancellationToken,
    abandon: CancellationToken,
    work: WorkRef,
) -> Result<(), RuntimeError> {
    // Halts siblings unless this task ends cleanly.
    let guard = halt.clone().drop_guard();

    let mut res = Ok(());
    while state.is_running() && !halt.is_cancelled() {
        let fetched = tokio::select! {
            biased;
            () = abandon.cancelled() => {
                tracing::debug!(listener = unit.name(), "run dropped, closing listener");
                break;
            }
            fetched = guarded_fetch(&mut unit, work.as_ref()) => fetched,
        };
        if let Err(e) = fetched {
            res = Err(e);
            break;
        }
    }
    unit.close().await;

    if res.is_ok() {
        guard.disarm();
    }
    res
}

async fn guarded_fetch(unit: &mut ListenerUnit, work: &dyn Work) -> Result<usize, RuntimeError> {
    match AssertUnwindSafe(unit.fetch(work)).catch_unwind().await {
        Ok(res) => Ok(res?),
        Err(panic) => Err(RuntimeError::ListenerPanicked {
            listener: unit.name().to_string(),
            reason: panic_message(panic.as_ref()),
        }),
    }
}
