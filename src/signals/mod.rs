//! Signal supervision.
//!
//! - [`SignalKind`] handled OS signals
//! - [`Callback`], [`CallbackFn`], [`CallbackRef`] work to run on delivery
//! - [`CallbackChain`] ordered callbacks for one signal
//! - [`SignalSupervisor`] traps signals and dispatches chains off the signal context
//! - [`SignalHandle`] injects synthetic deliveries

mod callback;
mod chain;
mod kind;
mod supervisor;

pub use callback::{Callback, CallbackFn, CallbackRef, stop_callback};
pub use chain::CallbackChain;
pub use kind::{ParseSignalError, SignalKind};
pub use supervisor::{SignalHandle, SignalSupervisor};
