//! Router configuration settings and environment variable handling

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::env;
use crate::types::Chain;

// Gas sufficiency
pub const GAS_BUFFER_MULTIPLIER: Decimal = dec!(1.5);
pub const GAS_FUNDING_TOKEN: &str = "USDC";

// Risk scanning
pub const HIGH_VALUE_THRESHOLD: Decimal = dec!(1000);
pub const CONFIDENCE_LIVE: f64 = 0.95;
pub const CONFIDENCE_LIVE_FLOOR: f64 = 0.80;
pub const CONFIDENCE_DEGRADED_CEILING: f64 = 0.70;
pub const CONFIDENCE_DEGRADED_FLOOR: f64 = 0.50;

// Route quotes
pub const ROUTE_CACHE_TTL_SECS: i64 = 300;
pub const MAX_FALLBACK_ROUTES: usize = 3;
pub const MAX_SLIPPAGE_BPS: u32 = 500; // 5%

// Gas units per step kind
pub const TRANSFER_GAS_UNITS: u64 = 21_000;
pub const APPROVE_GAS_UNITS: u64 = 50_000;
pub const SWAP_GAS_UNITS: u64 = 150_000;
pub const BRIDGE_GAS_UNITS: u64 = 200_000;

// Execution
pub const MAX_EXECUTION_ATTEMPTS: u32 = 3;
pub const RECENT_EXECUTIONS_LIMIT: usize = 10;

// Driver defaults
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;
pub const MIN_TICK_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_CHAIN_CALL_TIMEOUT_MS: u64 = 5_000;
pub const MAX_CHAIN_CALL_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRY_BACKOFF_SECS: u64 = 3_600;
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub tick_interval_secs: u64,
    pub chain_call_timeout_ms: u64,
    pub max_consecutive_failures: u32,
    pub retry_backoff_secs: u64,
    pub max_retry_backoff_secs: u64,
    pub max_concurrent_executions: usize,
    pub max_execution_attempts: u32,
    // Routing and gas
    pub gas_funding_chain: Chain,
    pub slippage_tolerance_bps: u32,
    // Simulated chain
    pub simulation_seed: u64,
    pub simulated_failure_rate_bps: u32,
    // Live RPC
    pub use_rpc_adapter: bool,
    // Risk
    pub risk_blocklist: HashSet<String>,
    // Daemon
    pub seed_demo_subscriptions: bool,
    pub enable_execution_journal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            chain_call_timeout_ms: DEFAULT_CHAIN_CALL_TIMEOUT_MS,
            max_consecutive_failures: 3,
            retry_backoff_secs: DEFAULT_RETRY_BACKOFF_SECS,
            max_retry_backoff_secs: DEFAULT_MAX_RETRY_BACKOFF_SECS,
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
            max_execution_attempts: MAX_EXECUTION_ATTEMPTS,
            gas_funding_chain: Chain::Ethereum,
            slippage_tolerance_bps: 50, // 0.5%
            simulation_seed: 42,
            simulated_failure_rate_bps: 0,
            use_rpc_adapter: false,
            risk_blocklist: HashSet::new(),
            seed_demo_subscriptions: false,
            enable_execution_journal: true,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            tick_interval_secs: env::var("TICK_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.tick_interval_secs)
                .max(MIN_TICK_INTERVAL_SECS),
            chain_call_timeout_ms: env::var("CHAIN_CALL_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.chain_call_timeout_ms)
                .clamp(100, MAX_CHAIN_CALL_TIMEOUT_MS),
            max_consecutive_failures: env::var("MAX_CONSECUTIVE_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_consecutive_failures)
                .max(1),
            retry_backoff_secs: env::var("RETRY_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_backoff_secs),
            max_retry_backoff_secs: env::var("MAX_RETRY_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retry_backoff_secs),
            max_concurrent_executions: env::var("MAX_CONCURRENT_EXECUTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_executions)
                .max(1),
            max_execution_attempts: MAX_EXECUTION_ATTEMPTS,
            gas_funding_chain: env::var("GAS_FUNDING_CHAIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.gas_funding_chain),
            slippage_tolerance_bps: env::var("SLIPPAGE_TOLERANCE_BPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.slippage_tolerance_bps)
                .min(MAX_SLIPPAGE_BPS),
            simulation_seed: env::var("SIMULATION_SEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.simulation_seed),
            simulated_failure_rate_bps: env::var("SIMULATED_FAILURE_RATE_BPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.simulated_failure_rate_bps)
                .min(10_000),
            use_rpc_adapter: env::var("USE_RPC_ADAPTER")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            risk_blocklist: env::var("RISK_BLOCKLIST")
                .map(|s| parse_blocklist(&s))
                .unwrap_or_default(),
            seed_demo_subscriptions: env::var("SEED_DEMO_SUBSCRIPTIONS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            enable_execution_journal: env::var("ENABLE_EXECUTION_JOURNAL")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// `RPC_URL_<CHAIN>` override, else the chain's public endpoint.
    pub fn rpc_url(&self, chain: Chain) -> String {
        env::var(format!("RPC_URL_{}", chain.as_str().to_ascii_uppercase()))
            .unwrap_or_else(|_| chain.default_rpc_url().to_string())
    }

    pub fn slippage_tolerance(&self) -> Decimal {
        Decimal::from(self.slippage_tolerance_bps) / dec!(10000)
    }
}

/// Comma separated addresses, lower-cased.
pub fn parse_blocklist(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocklist_is_trimmed_and_lowercased() {
        let list = parse_blocklist(" 0xAbC , ,0xdef");
        assert_eq!(list.len(), 2);
        assert!(list.contains("0xabc"));
        assert!(list.contains("0xdef"));
    }

    #[test]
    fn slippage_tolerance_is_a_fraction() {
        let config = Config::default();
        assert_eq!(config.slippage_tolerance(), dec!(0.005));
    }
}
