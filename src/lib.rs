//! AutoPay Router - recurring cross-chain payments
//!
//! Plans swap/bridge/transfer routes with ranked fallbacks, keeps payer
//! wallets topped up with gas, screens transfers for risk and executes due
//! subscriptions on a fixed tick with bounded retries.

pub mod config;
pub mod types;
pub mod errors;
pub mod chain;
pub mod network;
pub mod routing;
pub mod gas;
pub mod risk;
pub mod execution;
pub mod scheduler;
pub mod storage;
pub mod validation;
pub mod api;
pub mod tools;
pub mod utils;

// Re-export commonly used items
pub use config::{Config, CONFIG};
pub use errors::{AutopayError, AutopayResult};
pub use types::*;

// Type alias for our concrete provider
pub type ConcreteProvider = alloy::providers::RootProvider<alloy::transports::BoxTransport>;
