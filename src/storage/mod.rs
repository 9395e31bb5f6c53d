//! Subscription persistence and the execution journal

pub mod store;
pub mod journal;

pub use store::*;
pub use journal::*;
