//! Chain adapters: the trait seam plus simulated and timeout-bounded implementations

pub mod adapter;
pub mod simulated;
pub mod timeout;

pub use adapter::*;
pub use simulated::*;
pub use timeout::*;
