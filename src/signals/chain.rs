//! # Ordered callback chain for one signal.
//!
//! ## Rules
//! - Append-only; callbacks run in registration order.
//! - An `Err` or panic from one callback is logged and reported as
//!   `EventKind::CallbackFailed`; the following callbacks still run.
//! - Callbacks run sequentially on the caller's thread.

use std::panic::{self, AssertUnwindSafe};

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::signals::{CallbackRef, SignalKind};

/// Ordered sequence of callbacks registered for one [`SignalKind`].
#[derive(Clone, Default)]
pub struct CallbackChain {
    callbacks: Vec<CallbackRef>,
}

impl CallbackChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback.
    pub fn push(&mut self, callback: CallbackRef) {
        self.callbacks.push(callback);
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Iterates callbacks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CallbackRef> {
        self.callbacks.iter()
    }

    /// Callback names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    /// Runs every callback once for `signal` and returns how many failed.
    pub(crate) fn invoke(&self, signal: SignalKind, bus: &Bus) -> usize {
        let mut failed = 0;
        for cb in &self.callbacks {
            let reason = match panic::catch_unwind(AssertUnwindSafe(|| cb.call(signal))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            failed += 1;
            tracing::error!(%signal, callback = cb.name(), %reason, "signal callback failed");
            bus.publish(
                Event::new(EventKind::CallbackFailed)
                    .with_signal(signal)
                    .with_source(cb.name())
                    .with_reason(reason),
            );
        }
        failed
    }
}

impl std::fmt::Debug for CallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallbackError;
    use crate::signals::CallbackFn;
    use std::sync::{Arc, Mutex};

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> CallbackRef {
        let log = log.clone();
        CallbackFn::arc(name, move |_: SignalKind| -> Result<(), CallbackError> {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    #[test]
    fn runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = CallbackChain::new();
        chain.push(recording("first", &log));
        chain.push(recording("second", &log));
        chain.push(recording("third", &log));

        let failed = chain.invoke(SignalKind::Interrupt, &Bus::new(8));

        assert_eq!(failed, 0);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_chain_is_a_no_op() {
        let chain = CallbackChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.invoke(SignalKind::Quit, &Bus::new(8)), 0);
    }

    #[tokio::test]
    async fn faulty_callbacks_do_not_stop_the_chain() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut chain = CallbackChain::new();
        chain.push(CallbackFn::arc("errs", |_: SignalKind| -> Result<(), CallbackError> {
            Err(CallbackError::fail("disk full"))
        }));
        chain.push(CallbackFn::arc("panics", |_: SignalKind| -> Result<(), CallbackError> {
            panic!("boom")
        }));
        chain.push(recording("survivor", &log));

        let failed = chain.invoke(SignalKind::Interrupt, &bus);

        assert_eq!(failed, 2);
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::CallbackFailed);
        assert_eq!(first.source.as_deref(), Some("errs"));
        assert_eq!(first.signal, Some(SignalKind::Interrupt));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.source.as_deref(), Some("panics"));
        assert_eq!(second.reason.as_deref(), Some("panicked: boom"));
    }

    #[test]
    fn names_follow_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = CallbackChain::new();
        for name in ["a", "b", "c", "d"] {
            chain.push(recording(name, &log));
        }
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.names(), vec!["a", "b", "c", "d"]);
    }
}
