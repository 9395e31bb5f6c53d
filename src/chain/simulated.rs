//! Deterministic in-process chain used by the daemon's simulation mode and tests

use alloy::primitives::{Address, keccak256};
use async_trait::async_trait;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use super::{ChainAdapter, SimulationOutcome, TokenMetadata, TxRequest};
use crate::errors::{AutopayError, AutopayResult};
use crate::types::{Chain, NativeBalance, known_tokens};

/// Chain facts come from tables; revert injection is seeded and derived from
/// the transaction content, so identical inputs always give identical results.
pub struct SimulatedChain {
    seed: u64,
    failure_rate_bps: u32,
    default_native_balance: Decimal,
    balances: HashMap<(Chain, Address), Decimal>,
    contracts: HashSet<(Chain, Address)>,
    metadata: HashMap<(Chain, Address), TokenMetadata>,
    gas_prices: HashMap<Chain, Decimal>,
    revert_targets: RwLock<HashSet<(Chain, Address)>>,
    unreachable_code: HashSet<(Chain, Address)>,
    latency: Duration,
    unavailable: RwLock<HashSet<Chain>>,
    submitted: RwLock<Vec<TxRequest>>,
}

impl SimulatedChain {
    pub fn new(seed: u64) -> Self {
        let mut chain = Self {
            seed,
            failure_rate_bps: 0,
            default_native_balance: dec!(0.05),
            balances: HashMap::new(),
            contracts: HashSet::new(),
            metadata: HashMap::new(),
            gas_prices: HashMap::from([
                (Chain::Ethereum, dec!(25)),
                (Chain::Base, dec!(0.1)),
                (Chain::Arbitrum, dec!(0.5)),
                (Chain::Polygon, dec!(30)),
                (Chain::Optimism, dec!(0.2)),
            ]),
            revert_targets: RwLock::new(HashSet::new()),
            unreachable_code: HashSet::new(),
            latency: Duration::ZERO,
            unavailable: RwLock::new(HashSet::new()),
            submitted: RwLock::new(Vec::new()),
        };
        for c in Chain::ALL {
            for token in known_tokens(c) {
                chain.contracts.insert((c, token.address));
                chain.metadata.insert(
                    (c, token.address),
                    TokenMetadata {
                        name: token.symbol.clone(),
                        symbol: token.symbol,
                        decimals: token.decimals as u8,
                    },
                );
            }
        }
        chain
    }

    pub fn with_failure_rate_bps(mut self, bps: u32) -> Self {
        self.failure_rate_bps = bps.min(10_000);
        self
    }

    /// Native balance (in native units) reported for wallets without an explicit entry.
    pub fn with_default_native_balance(mut self, native: Decimal) -> Self {
        self.default_native_balance = native;
        self
    }

    pub fn with_native_balance(mut self, chain: Chain, wallet: Address, native: Decimal) -> Self {
        self.balances.insert((chain, wallet), native);
        self
    }

    /// Sets the balance so that it is worth exactly `usd` at the simulated price.
    pub fn with_native_balance_usd(self, chain: Chain, wallet: Address, usd: Decimal) -> Self {
        let native = usd / chain.native_usd_price();
        self.with_native_balance(chain, wallet, native)
    }

    pub fn with_contract(mut self, chain: Chain, address: Address) -> Self {
        self.contracts.insert((chain, address));
        self
    }

    /// Deployed code that does not answer ERC-20 metadata calls.
    pub fn without_metadata(mut self, chain: Chain, address: Address) -> Self {
        self.metadata.remove(&(chain, address));
        self
    }

    pub fn with_gas_price(mut self, chain: Chain, gwei: Decimal) -> Self {
        self.gas_prices.insert(chain, gwei);
        self
    }

    /// Every simulated call to `target` on `chain` reverts.
    pub fn with_reverting_target(mut self, chain: Chain, target: Address) -> Self {
        self.revert_targets.get_mut().insert((chain, target));
        self
    }

    pub async fn set_reverting(&self, chain: Chain, target: Address, reverting: bool) {
        let mut targets = self.revert_targets.write().await;
        if reverting {
            targets.insert((chain, target));
        } else {
            targets.remove(&(chain, target));
        }
    }

    /// Code lookups for `address` fail as if the RPC timed out; every other
    /// call on `chain` still answers.
    pub fn with_unreachable_code(mut self, chain: Chain, address: Address) -> Self {
        self.unreachable_code.insert((chain, address));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_unavailable_chain(mut self, chain: Chain) -> Self {
        self.unavailable.get_mut().insert(chain);
        self
    }

    pub async fn set_available(&self, chain: Chain, available: bool) {
        let mut unavailable = self.unavailable.write().await;
        if available {
            unavailable.remove(&chain);
        } else {
            unavailable.insert(chain);
        }
    }

    /// Every transaction that simulated successfully, in order.
    pub async fn submitted(&self) -> Vec<TxRequest> {
        self.submitted.read().await.clone()
    }

    async fn reach(&self, chain: Chain, operation: &str) -> AutopayResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unavailable.read().await.contains(&chain) {
            return Err(AutopayError::ChainUnavailable {
                chain,
                operation: operation.to_string(),
                source: Some(anyhow::anyhow!("{} RPC unreachable", chain)),
            });
        }
        Ok(())
    }

    fn injected_revert(&self, tx: &TxRequest) -> bool {
        if self.failure_rate_bps == 0 {
            return false;
        }
        let mut material = self.seed.to_be_bytes().to_vec();
        material.extend_from_slice(&tx.chain.chain_id().to_be_bytes());
        material.extend_from_slice(tx.to.as_slice());
        material.extend_from_slice(&tx.data);
        let digest = keccak256(&material);
        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_be_bytes(seed_bytes));
        rng.random_range(0..10_000u32) < self.failure_rate_bps
    }
}

#[async_trait]
impl ChainAdapter for SimulatedChain {
    async fn native_balance(&self, chain: Chain, wallet: Address) -> AutopayResult<NativeBalance> {
        self.reach(chain, "native_balance").await?;
        let native = self
            .balances
            .get(&(chain, wallet))
            .copied()
            .unwrap_or(self.default_native_balance);
        Ok(NativeBalance {
            native,
            usd: native * chain.native_usd_price(),
        })
    }

    async fn gas_price_gwei(&self, chain: Chain) -> AutopayResult<Decimal> {
        self.reach(chain, "gas_price").await?;
        Ok(self.gas_prices.get(&chain).copied().unwrap_or(dec!(1)))
    }

    async fn has_code(&self, chain: Chain, address: Address) -> AutopayResult<bool> {
        self.reach(chain, "get_code").await?;
        if self.unreachable_code.contains(&(chain, address)) {
            return Err(AutopayError::ChainUnavailable {
                chain,
                operation: "get_code".to_string(),
                source: Some(anyhow::anyhow!("eth_getCode timed out for {:#x}", address)),
            });
        }
        Ok(self.contracts.contains(&(chain, address)))
    }

    async fn token_metadata(&self, chain: Chain, token: Address) -> AutopayResult<Option<TokenMetadata>> {
        self.reach(chain, "token_metadata").await?;
        Ok(self.metadata.get(&(chain, token)).cloned())
    }

    async fn simulate(&self, tx: &TxRequest) -> AutopayResult<SimulationOutcome> {
        self.reach(tx.chain, "simulate").await?;

        let targeted = self.revert_targets.read().await.contains(&(tx.chain, tx.to));
        if targeted || self.injected_revert(tx) {
            debug!(chain = %tx.chain, label = %tx.label, "Simulated revert");
            return Err(AutopayError::SimulationFailure {
                chain: tx.chain,
                step: tx.label.clone(),
                reason: "execution reverted".to_string(),
            });
        }

        let mut material = tx.chain.chain_id().to_be_bytes().to_vec();
        material.extend_from_slice(tx.from.as_slice());
        material.extend_from_slice(tx.to.as_slice());
        material.extend_from_slice(&tx.data);
        let tx_hash = keccak256(&material);

        self.submitted.write().await.push(tx.clone());
        Ok(SimulationOutcome {
            tx_hash,
            gas_used: tx.gas_limit,
        })
    }
}
