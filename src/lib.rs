//! # consumervisor
//!
//! **Consumervisor** runs long-lived message-consumption loops and shuts them down
//! gracefully when the process receives a termination signal.
//!
//! It provides a signal supervisor that moves signal-driven work off the signal
//! context, a shared run flag, and an orchestrator that keeps fetching from every
//! configured listener until that flag flips.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//!     │ ListenerBinding  │  │ ListenerBinding  │  │ ListenerBinding  │
//!     │ (group/topic #1) │  │ (group/topic #2) │  │ (group/topic #3) │
//!     └────────┬─────────┘  └────────┬─────────┘  └────────┬─────────┘
//!              ▼ validate + Driver::connect                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - ListenerUnit per binding (consumer handle)                     │
//! │  - RoundRobin: one loop, units in order                           │
//! │  - PerListener: one task per unit                                 │
//! │  - while RunState::is_running(): unit.fetch(work)                 │
//! └──────────────────────────────▲────────────────────────────────────┘
//!                                │ RunState (true → false, once)
//! ┌──────────────────────────────┴────────────────────────────────────┐
//! │  SignalSupervisor                                                 │
//! │  OS signal ─► tokio trap ─► queue ─► spawn_blocking per delivery  │
//! │                                         ├─ log delivery           │
//! │                                         └─ CallbackChain[kind]    │
//! │                                              stop, flush, ...     │
//! └───────────────────────────────────────────────────────────────────┘
//!
//!   Orchestrator / units / deliveries ── publish(Event) ──► Bus
//!                                                            │
//!                                          Runtime forwarder ▼
//!                                                     SubscriberSet
//!                                               ┌─────────┼─────────┐
//!                                               ▼         ▼         ▼
//!                                           LogWriter  metrics   custom
//! ```
//!
//! ### Shutdown
//! ```text
//! SIGINT ─► stop_callback ─► RunState = false
//!                                 │
//!   loop: in-flight fetch completes, no new fetch starts
//!                                 │
//!   consumers closed ─► Orchestrator::run returns ─► supervise returns ─► exit
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Signals**       | Trap signals, run ordered callbacks off the signal context.   | [`SignalSupervisor`], [`Callback`], [`SignalHandle`] |
//! | **Run flag**      | Shared monotonic `running?` flag.                             | [`RunState`]                                    |
//! | **Orchestration** | Fetch from every listener until stopped.                      | [`Orchestrator`], [`Scheduling`]                |
//! | **Listeners**     | Bindings, consumers and the per-binding fetch.                | [`ListenerBinding`], [`Consumer`], [`Driver`]   |
//! | **Processing**    | User entry point and the wrapper around each invocation.      | [`Handler`], [`Work`]                           |
//! | **Bootstrap**     | Wire everything and run.                                      | [`RuntimeBuilder`], [`Runtime`]                 |
//! | **Events**        | Observe lifecycle through subscribers.                        | [`Subscribe`], [`LogWriter`], [`Event`]         |
//! | **Errors**        | Typed startup and run failures.                               | [`RuntimeError`], [`ListenerError`]             |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use consumervisor::{
//!     Batch, Config, HandlerError, HandlerFn, Inline, ListenerBinding, MemoryBroker,
//!     MemoryDriver, RuntimeBuilder, SignalKind,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = MemoryBroker::new();
//!     broker.publish("payments", "hello");
//!
//!     let handler = HandlerFn::arc("payments", |batch: Batch| async move {
//!         println!("processing {} messages", batch.len());
//!         Ok::<_, HandlerError>(())
//!     });
//!
//!     let cfg = Config::setup(|cfg| cfg.signals = vec![SignalKind::Terminate]);
//!     let runtime = RuntimeBuilder::new(cfg)
//!         .with_binding(ListenerBinding::new("payments", "orders", handler))
//!         .build(&MemoryDriver::new(broker).with_poll_timeout(Duration::from_millis(10)))?;
//!
//!     // Same path as a real SIGTERM.
//!     runtime.signal_handle().raise(SignalKind::Terminate)?;
//!     runtime.run(Arc::new(Inline)).await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod drivers;
mod error;
mod events;
mod listener;
mod signals;
mod state;
mod subscribers;

// ---- Public re-exports ----

pub use config::{Config, Scheduling};
pub use self::core::{Orchestrator, Runtime, RuntimeBuilder};
pub use drivers::{MemoryBroker, MemoryConsumer, MemoryDriver};
pub use error::{
    BindingError, CallbackError, ConsumerError, HandlerError, ListenerError, RuntimeError,
};
pub use events::{Bus, Event, EventKind};
pub use listener::{
    Batch, Consumer, DispatchPolicy, Driver, Handler, HandlerFn, HandlerRef, Inline,
    ListenerBinding, ListenerUnit, Message, Work, WorkFn, WorkRef,
};
pub use signals::{
    Callback, CallbackChain, CallbackFn, CallbackRef, ParseSignalError, SignalHandle, SignalKind,
    SignalSupervisor, stop_callback,
};
pub use state::RunState;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
