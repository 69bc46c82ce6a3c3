//! # Processing entry points and the work wrapper.
//!
//! - [`Handler`] is the user processing entry point referenced by a binding.
//! - [`Work`] wraps every handler invocation made by a listener's `fetch`
//!   (instrumentation, per-batch transactions, offloading, ...).
//!
//! ```text
//! ListenerUnit::fetch(work)
//!     └─► consumer.poll()
//!           └─► work.perform(handler, batch)   (once per batch or per message)
//!                 └─► handler.handle(batch)
//! ```
//!
//! ## Example
//! ```rust
//! use consumervisor::{Batch, HandlerError, HandlerFn, HandlerRef};
//!
//! let handler: HandlerRef = HandlerFn::arc("audit", |batch: Batch| async move {
//!     for msg in &batch.messages {
//!         let _ = &msg.payload;
//!     }
//!     Ok::<_, HandlerError>(())
//! });
//! assert_eq!(handler.name(), "audit");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::listener::Batch;

/// Shared handle to a processing entry point.
pub type HandlerRef = Arc<dyn Handler>;

/// Shared handle to a work wrapper.
pub type WorkRef = Arc<dyn Work>;

/// User processing entry point for one binding.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Stable, human-readable name.
    fn name(&self) -> &str;

    /// Processes one batch. An error stops the whole consumption loop.
    async fn handle(&self, batch: Batch) -> Result<(), HandlerError>;
}

/// Wraps each handler invocation made by a listener.
#[async_trait]
pub trait Work: Send + Sync + 'static {
    /// Runs `handler` on `batch`, possibly decorating the call.
    async fn perform(&self, handler: HandlerRef, batch: Batch) -> Result<(), HandlerError>;
}

/// Work wrapper that calls the handler directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;

#[async_trait]
impl Work for Inline {
    async fn perform(&self, handler: HandlerRef, batch: Batch) -> Result<(), HandlerError> {
        handler.handle(batch).await
    }
}

/// Function-backed handler.
///
/// The closure creates a fresh future per batch; share state explicitly through `Arc`.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Batch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, batch: Batch) -> Result<(), HandlerError> {
        (self.f)(batch).await
    }
}

/// Function-backed work wrapper.
///
/// ```rust
/// use consumervisor::{Batch, HandlerError, HandlerRef, WorkFn, WorkRef};
///
/// let work: WorkRef = WorkFn::arc(|handler: HandlerRef, batch: Batch| async move {
///     let n = batch.len();
///     let res = handler.handle(batch).await;
///     tracing::debug!(handler = handler.name(), messages = n, "batch handled");
///     res
/// });
/// # let _ = work;
/// ```
#[derive(Debug)]
pub struct WorkFn<F> {
    f: F,
}

impl<F> WorkFn<F> {
    /// Creates a new function-backed work wrapper.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the wrapper and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Work for WorkFn<F>
where
    F: Fn(HandlerRef, Batch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn perform(&self, handler: HandlerRef, batch: Batch) -> Result<(), HandlerError> {
        (self.f)(handler, batch).await
    }
}
