//! # Event subscribers for the consumervisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Bus ──► Runtime forwarder ──► SubscriberSet::emit(&Event)
//!                                   ├──► [queue 1] ──► worker ──► LogWriter::on_event()
//!                                   ├──► [queue 2] ──► worker ──► Metrics::on_event()
//!                                   └──► [queue N] ──► worker ──► Custom::on_event()
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
