//! Consumer drivers shipped with the crate.
//!
//! - [`memory`]: an in-process broker for tests, demos and local runs.

pub mod memory;

pub use memory::{MemoryBroker, MemoryConsumer, MemoryDriver};
