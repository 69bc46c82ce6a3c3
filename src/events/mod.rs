//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the signal supervisor,
//! the orchestrator, listener units and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SignalSupervisor` deliveries, `CallbackChain`, `Orchestrator`,
//!   `ListenerUnit`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Runtime` forwards everything to its `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
