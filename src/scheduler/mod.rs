//! Tick-driven scheduling of due subscriptions

pub mod driver;

pub use driver::*;
