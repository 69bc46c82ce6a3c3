//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the consumption runtime.
//!
//! Config is used in three places:
//! 1. **Signal supervision**: which signals get trapped ([`Config::signals`])
//! 2. **Orchestration**: which scheduling model drives the listeners ([`Config::scheduling`])
//! 3. **Event system**: bus capacity for event delivery ([`Config::bus_capacity`])
//!
//! ## Freezing
//! [`Config::setup`] starts from defaults, lets the caller adjust fields, and hands the
//! result back by value. Once passed to [`RuntimeBuilder`](crate::RuntimeBuilder) or
//! [`Orchestrator::new`](crate::Orchestrator::new) the runtime owns its copy, so later
//! edits by the caller have no effect.

use crate::signals::SignalKind;

/// How the orchestrator schedules listener units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scheduling {
    /// One loop visits every unit in construction order, one `fetch` each per pass.
    ///
    /// Strictly ordered; a stalled unit delays its siblings.
    #[default]
    RoundRobin,
    /// One task per unit, each running its own `while running { fetch }` loop.
    ///
    /// Units progress independently; `run` joins every task before returning.
    PerListener,
}

/// Global configuration for the consumption runtime.
///
/// ## Field semantics
/// - `scheduling`: listener scheduling model
/// - `signals`: handled signal set (empty = no OS traps installed)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Listener scheduling model.
    pub scheduling: Scheduling,

    /// Signals trapped by the signal supervisor.
    ///
    /// Duplicates are ignored. Defaults to [`SignalKind::HANDLED`].
    pub signals: Vec<SignalKind>,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl Config {
    /// Builds a configuration from defaults adjusted by `f`.
    ///
    /// # Example
    /// ```
    /// use consumervisor::{Config, Scheduling};
    ///
    /// let cfg = Config::setup(|cfg| {
    ///     cfg.scheduling = Scheduling::PerListener;
    ///     cfg.bus_capacity = 64;
    /// });
    /// assert_eq!(cfg.scheduling, Scheduling::PerListener);
    /// ```
    #[must_use]
    pub fn setup(f: impl FnOnce(&mut Config)) -> Config {
        let mut cfg = Config::default();
        f(&mut cfg);
        cfg
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the handled signals without duplicates, in configured order.
    pub fn handled_signals(&self) -> Vec<SignalKind> {
        let mut out = Vec::with_capacity(self.signals.len());
        for kind in &self.signals {
            if !out.contains(kind) {
                out.push(*kind);
            }
        }
        out
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `scheduling = RoundRobin`
    /// - `signals = [SIGINT, SIGQUIT]`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            scheduling: Scheduling::default(),
            signals: SignalKind::HANDLED.to_vec(),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_trap_interrupt_and_quit() {
        let cfg = Config::default();
        assert_eq!(cfg.scheduling, Scheduling::RoundRobin);
        assert_eq!(
            cfg.handled_signals(),
            vec![SignalKind::Interrupt, SignalKind::Quit]
        );
    }

    #[test]
    fn handled_signals_drops_duplicates() {
        let cfg = Config::setup(|cfg| {
            cfg.signals = vec![
                SignalKind::Terminate,
                SignalKind::Interrupt,
                SignalKind::Terminate,
            ];
        });
        assert_eq!(
            cfg.handled_signals(),
            vec![SignalKind::Terminate, SignalKind::Interrupt]
        );
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config::setup(|cfg| cfg.bus_capacity = 0);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
