//! # Process run flag.
//!
//! [`RunState`] is the shared `running?` flag consulted by the orchestrator's loop
//! condition and flipped by shutdown callbacks.
//!
//! ## Rules
//! - Starts `true` (running).
//! - The only transition is `true → false`; it is never reversed.
//! - `stop()` is idempotent, so callbacks may run it any number of times.
//! - Reads never take a lock; any number of tasks may observe the flag.
//!
//! The flag is backed by a [`CancellationToken`], which gives lock-free reads and an
//! awaitable [`RunState::stopped`] for free. Applications that already own a token
//! can hand it over with [`RunState::from_token`].

use tokio_util::sync::CancellationToken;

/// Shared, monotonic `running?` flag.
///
/// Clones share the same underlying flag.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    token: CancellationToken,
}

impl RunState {
    /// Creates a new flag in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flag that is already stopped.
    #[must_use]
    pub fn stopped_already() -> Self {
        let state = Self::new();
        state.stop();
        state
    }

    /// Adopts an application-owned token as the flag storage.
    ///
    /// Cancelling the token stops the flag and vice versa.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Returns `true` until [`stop`](Self::stop) has been called.
    #[inline]
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Flips the flag to stopped. Calling it again has no effect.
    #[inline]
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Completes once the flag is stopped (immediately if it already is).
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }

    /// Returns the backing token, e.g. to derive child tokens for application work.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
