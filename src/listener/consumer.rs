//! # Broker consumer seam.
//!
//! The runtime never talks to a broker directly. A [`Driver`] turns a validated
//! [`ListenerBinding`] into a [`Consumer`], and the listener unit owns that consumer
//! for the lifetime of the consumption loop.
//!
//! ## Contract
//! - `poll` returns the next batch, or an empty vector when nothing arrived within
//!   the client's own poll timeout. It must not loop forever.
//! - `close` is called exactly once, after the last `poll`, on success and error paths.
//! - Timeouts, offset commits and rebalancing are the client's business.

use async_trait::async_trait;

use crate::error::ConsumerError;
use crate::listener::{ListenerBinding, Message};

/// One connected broker consumer.
#[async_trait]
pub trait Consumer: Send + 'static {
    /// Pulls the next batch. An empty vector means an empty poll.
    async fn poll(&mut self) -> Result<Vec<Message>, ConsumerError>;

    /// Releases the client. The default does nothing.
    async fn close(&mut self) -> Result<(), ConsumerError> {
        Ok(())
    }
}

/// Creates consumers for bindings.
pub trait Driver: Send + Sync {
    /// Connects a consumer for `binding`.
    ///
    /// Called once per binding, in order, after the binding validated.
    fn connect(&self, binding: &ListenerBinding) -> Result<Box<dyn Consumer>, ConsumerError>;
}
