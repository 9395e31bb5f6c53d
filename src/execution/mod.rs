//! Route execution: calldata encoding, the step engine and the run orchestrator

pub mod calldata;
pub mod engine;
pub mod orchestrator;

pub use calldata::*;
pub use engine::*;
pub use orchestrator::*;
