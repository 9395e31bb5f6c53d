//! Validation of externally supplied values

pub mod inputs;

pub use inputs::*;
