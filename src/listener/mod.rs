//! # Listeners: bindings, consumers and the per-binding fetch unit.
//!
//! ```text
//! ListenerBinding ──validate──► Driver::connect ──► Box<dyn Consumer>
//!                                                        │
//!                                       ListenerUnit { binding, consumer }
//!                                                        │
//!                                 fetch(work) ──► Work::perform ──► Handler::handle
//! ```

mod binding;
mod consumer;
mod message;
mod unit;
mod work;

#[cfg(test)]
pub(crate) mod scripted;

pub use binding::{DispatchPolicy, ListenerBinding};
pub use consumer::{Consumer, Driver};
pub use message::{Batch, Message};
pub use unit::ListenerUnit;
pub use work::{Handler, HandlerFn, HandlerRef, Inline, Work, WorkFn, WorkRef};
