//! Error types used by the consumervisor runtime, listeners and callbacks.
//!
//! - [`RuntimeError`] errors raised by the supervision runtime itself (startup and run).
//! - [`BindingError`] a listener binding failed validation.
//! - [`ListenerError`] one `fetch` of one listener failed.
//! - [`ConsumerError`] raised by a broker consumer client.
//! - [`HandlerError`] raised by user processing code.
//! - [`CallbackError`] raised by a signal callback.
//!
//! Every enum provides `as_label` (stable snake_case) for logs/metrics.

use std::any::Any;

use thiserror::Error;

use crate::signals::SignalKind;

/// # Errors produced by the consumervisor runtime.
///
/// Split into two classes:
/// - **startup-fatal**: the process must not proceed to `run` (see [`RuntimeError::is_startup_fatal`]);
/// - **run-fatal**: a listener failed while running; `run` terminates and the error
///   is left to an external process manager.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A listener binding failed validation.
    #[error("invalid listener binding {binding}: {source}")]
    InvalidBinding {
        /// Binding name (`group/topic`).
        binding: String,
        /// Validation failure.
        #[source]
        source: BindingError,
    },

    /// The consumer driver rejected a binding.
    #[error("listener {binding} failed to connect: {source}")]
    Connect {
        /// Binding name (`group/topic`).
        binding: String,
        /// Driver failure.
        #[source]
        source: ConsumerError,
    },

    /// A signal outside the handled set was registered or raised.
    #[error("signal {signal} is not handled by this supervisor")]
    UnhandledSignal {
        /// The offending signal.
        signal: SignalKind,
    },

    /// The OS-level handler for a signal could not be installed.
    #[error("failed to install handler for {signal}: {source}")]
    SignalInstall {
        /// Signal being installed.
        signal: SignalKind,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The signal supervisor finished and no longer accepts deliveries.
    #[error("signal supervisor is closed")]
    SupervisorClosed,

    /// A listener `fetch` failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// A per-listener task panicked.
    #[error("listener {listener} panicked: {reason}")]
    ListenerPanicked {
        /// Listener name.
        listener: String,
        /// Panic payload rendered as text.
        reason: String,
    },
}

impl RuntimeError {
    /// Stable snake_case label for logs and event reasons.
    ///
    /// # Example
    /// ```
    /// use consumervisor::{RuntimeError, SignalKind};
    ///
    /// let err = RuntimeError::UnhandledSignal { signal: SignalKind::Hangup };
    /// assert_eq!(err.as_label(), "runtime_unhandled_signal");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidBinding { .. } => "runtime_invalid_binding",
            RuntimeError::Connect { .. } => "runtime_connect_failed",
            RuntimeError::UnhandledSignal { .. } => "runtime_unhandled_signal",
            RuntimeError::SignalInstall { .. } => "runtime_signal_install",
            RuntimeError::SupervisorClosed => "runtime_supervisor_closed",
            RuntimeError::Listener(_) => "runtime_listener_failed",
            RuntimeError::ListenerPanicked { .. } => "runtime_listener_panicked",
        }
    }

    /// True for errors raised before the consumption loop starts.
    ///
    /// These are never retried: the process must not proceed to `run`.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::InvalidBinding { .. }
                | RuntimeError::Connect { .. }
                | RuntimeError::UnhandledSignal { .. }
                | RuntimeError::SignalInstall { .. }
        )
    }
}

/// # Listener binding validation failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// Topic is empty.
    #[error("topic is empty")]
    EmptyTopic,

    /// Topic is too long, reserved, or contains illegal characters.
    #[error("topic {topic:?} is invalid: {reason}")]
    InvalidTopic {
        /// The rejected topic.
        topic: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Consumer group is empty.
    #[error("group is empty")]
    EmptyGroup,

    /// Consumer group contains whitespace or control characters.
    #[error("group {group:?} contains whitespace or control characters")]
    InvalidGroup {
        /// The rejected group.
        group: String,
    },

    /// No broker address configured.
    #[error("no broker addresses configured")]
    NoBrokers,

    /// Broker address is not `host:port`.
    #[error("broker address {broker:?} is not host:port")]
    InvalidBroker {
        /// The rejected address.
        broker: String,
    },
}

impl BindingError {
    /// Snake_case label naming the rejected field.
    pub fn as_label(&self) -> &'static str {
        match self {
            BindingError::EmptyTopic => "binding_empty_topic",
            BindingError::InvalidTopic { .. } => "binding_invalid_topic",
            BindingError::EmptyGroup => "binding_empty_group",
            BindingError::InvalidGroup { .. } => "binding_invalid_group",
            BindingError::NoBrokers => "binding_no_brokers",
            BindingError::InvalidBroker { .. } => "binding_invalid_broker",
        }
    }
}

/// # Errors produced by one `fetch` of one listener.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The consumer failed to poll.
    #[error("listener {listener} poll failed: {source}")]
    Poll {
        /// Listener name.
        listener: String,
        /// Consumer failure.
        #[source]
        source: ConsumerError,
    },

    /// The work wrapper or handler failed while processing a batch.
    #[error("listener {listener} processing failed: {source}")]
    Work {
        /// Listener name.
        listener: String,
        /// Handler failure.
        #[source]
        source: HandlerError,
    },
}

impl ListenerError {
    /// Snake_case label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Poll { .. } => "listener_poll_failed",
            ListenerError::Work { .. } => "listener_work_failed",
        }
    }

    /// Name of the listener that failed.
    pub fn listener(&self) -> &str {
        match self {
            ListenerError::Poll { listener, .. } | ListenerError::Work { listener, .. } => listener,
        }
    }
}

/// # Errors produced by a broker consumer client.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// The driver could not create a consumer for a binding.
    #[error("connect failed: {error}")]
    Connect {
        /// The underlying error message.
        error: String,
    },

    /// Polling the broker failed.
    #[error("poll failed: {error}")]
    Poll {
        /// The underlying error message.
        error: String,
    },

    /// The consumer was already closed.
    #[error("consumer closed")]
    Closed,
}

impl ConsumerError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ConsumerError::Connect { .. } => "consumer_connect",
            ConsumerError::Poll { .. } => "consumer_poll",
            ConsumerError::Closed => "consumer_closed",
        }
    }
}

/// # Errors produced by user processing code.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Processing failed.
    #[error("processing failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail { error: error.into() }
    }

    /// Snake_case label.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
        }
    }
}

/// # Errors produced by signal callbacks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CallbackError {
    /// Callback failed.
    #[error("callback failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl CallbackError {
    /// Shorthand for [`CallbackError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        CallbackError::Fail { error: error.into() }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            CallbackError::Fail { .. } => "callback_failed",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_fatal_classification() {
        let invalid = RuntimeError::InvalidBinding {
            binding: "g/t".into(),
            source: BindingError::EmptyTopic,
        };
        assert!(invalid.is_startup_fatal());

        let run = RuntimeError::Listener(ListenerError::Poll {
            listener: "g/t".into(),
            source: ConsumerError::Closed,
        });
        assert!(!run.is_startup_fatal());
        assert_eq!(run.as_label(), "runtime_listener_failed");
    }

    #[test]
    fn listener_error_exposes_name() {
        let err = ListenerError::Work {
            listener: "orders/payments".into(),
            source: HandlerError::fail("boom"),
        };
        assert_eq!(err.listener(), "orders/payments");
        assert_eq!(
            err.to_string(),
            "listener orders/payments processing failed: processing failed: boom"
        );
    }

    #[test]
    fn panic_payloads_render() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
