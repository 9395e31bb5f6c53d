//! Chain-facing collaborator: balances, gas prices, contract reads and simulation

use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::errors::AutopayResult;
use crate::types::{Chain, NativeBalance};

/// An unsigned call to be simulated on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub chain: Chain,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    /// Human-readable step label for logs.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub tx_hash: B256,
    pub gas_used: u64,
}

/// Every method fails with `ChainUnavailable` when the chain cannot be
/// reached and `SimulationFailure` when a simulated call reverts.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    async fn native_balance(&self, chain: Chain, wallet: Address) -> AutopayResult<NativeBalance>;

    async fn gas_price_gwei(&self, chain: Chain) -> AutopayResult<Decimal>;

    async fn has_code(&self, chain: Chain, address: Address) -> AutopayResult<bool>;

    /// `Ok(None)` when the address answers but is not a readable token.
    async fn token_metadata(&self, chain: Chain, token: Address) -> AutopayResult<Option<TokenMetadata>>;

    async fn simulate(&self, tx: &TxRequest) -> AutopayResult<SimulationOutcome>;
}
