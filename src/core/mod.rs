//! Runtime core: orchestration and bootstrap.
//!
//! - [`orchestrator`]: drives listener units while the run flag is up;
//! - [`runtime`]: builds the signal supervisor, run flag and orchestrator, then runs them.

mod orchestrator;
mod runtime;

pub use orchestrator::Orchestrator;
pub use runtime::{Runtime, RuntimeBuilder};
