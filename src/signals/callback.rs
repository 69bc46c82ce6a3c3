//! # Signal callbacks.
//!
//! [`Callback`] is the unit stored in a [`CallbackChain`](crate::CallbackChain);
//! [`CallbackFn`] wraps a closure. The handle type is [`CallbackRef`].
//!
//! Callbacks run on a blocking-pool thread spawned per delivery, never inside the
//! OS signal handler, so they may log, allocate and block briefly. They must be
//! idempotent: the supervisor does not deduplicate repeated deliveries.
//!
//! ## Example
//! ```rust
//! use consumervisor::{CallbackError, CallbackFn, CallbackRef, SignalKind};
//!
//! let cb: CallbackRef = CallbackFn::arc("flush", |signal: SignalKind| -> Result<(), CallbackError> {
//!     let _ = signal;
//!     Ok(())
//! });
//! assert_eq!(cb.name(), "flush");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::CallbackError;
use crate::signals::SignalKind;
use crate::state::RunState;

/// Shared handle to a callback.
pub type CallbackRef = Arc<dyn Callback>;

/// Work to perform when a handled signal is delivered.
pub trait Callback: Send + Sync + 'static {
    /// Stable, human-readable name used in logs and `CallbackFailed` events.
    fn name(&self) -> &str;

    /// Runs the callback for one delivery of `signal`.
    fn call(&self, signal: SignalKind) -> Result<(), CallbackError>;
}

/// Function-backed callback.
#[derive(Debug)]
pub struct CallbackFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> CallbackFn<F> {
    /// Creates a new function-backed callback.
    ///
    /// Prefer [`CallbackFn::arc`] when you immediately need a [`CallbackRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the callback and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Callback for CallbackFn<F>
where
    F: Fn(SignalKind) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, signal: SignalKind) -> Result<(), CallbackError> {
        (self.f)(signal)
    }
}

/// Returns a callback that stops `state`.
///
/// Idempotent: repeated deliveries keep the flag stopped.
pub fn stop_callback(state: &RunState) -> CallbackRef {
    let state = state.clone();
    CallbackFn::arc("run-state-stop", move |_signal: SignalKind| -> Result<(), CallbackError> {
        state.stop();
        Ok(())
    })
}
