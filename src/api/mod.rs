//! Service facade for subscription, route, gas and risk operations

pub mod service;
pub mod demo;

pub use service::*;
pub use demo::*;
