//! Per-call timeout decorator for any chain adapter

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use super::{ChainAdapter, SimulationOutcome, TokenMetadata, TxRequest};
use crate::errors::{AutopayError, AutopayResult};
use crate::types::{Chain, NativeBalance};

/// A call that outlives the budget becomes `ChainUnavailable`.
pub struct TimeoutChainAdapter {
    inner: Arc<dyn ChainAdapter>,
    timeout: Duration,
}

impl TimeoutChainAdapter {
    pub fn new(inner: Arc<dyn ChainAdapter>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        chain: Chain,
        operation: &str,
        call: impl Future<Output = AutopayResult<T>>,
    ) -> AutopayResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%chain, operation, timeout_ms = self.timeout.as_millis() as u64, "Chain call timed out");
                Err(AutopayError::ChainUnavailable {
                    chain,
                    operation: format!("{} timed out after {:?}", operation, self.timeout),
                    source: None,
                })
            }
        }
    }
}

#[async_trait]
impl ChainAdapter for TimeoutChainAdapter {
    async fn native_balance(&self, chain: Chain, wallet: Address) -> AutopayResult<NativeBalance> {
        self.bounded(chain, "native_balance", self.inner.native_balance(chain, wallet)).await
    }

    async fn gas_price_gwei(&self, chain: Chain) -> AutopayResult<Decimal> {
        self.bounded(chain, "gas_price", self.inner.gas_price_gwei(chain)).await
    }

    async fn has_code(&self, chain: Chain, address: Address) -> AutopayResult<bool> {
        self.bounded(chain, "get_code", self.inner.has_code(chain, address)).await
    }

    async fn token_metadata(&self, chain: Chain, token: Address) -> AutopayResult<Option<TokenMetadata>> {
        self.bounded(chain, "token_metadata", self.inner.token_metadata(chain, token)).await
    }

    async fn simulate(&self, tx: &TxRequest) -> AutopayResult<SimulationOutcome> {
        self.bounded(tx.chain, "simulate", self.inner.simulate(tx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedChain;

    #[tokio::test]
    async fn slow_calls_become_chain_unavailable() {
        let slow = Arc::new(SimulatedChain::new(1).with_latency(Duration::from_millis(200)));
        let adapter = TimeoutChainAdapter::new(slow, Duration::from_millis(10));
        let err = adapter.gas_price_gwei(Chain::Arbitrum).await.unwrap_err();
        assert!(matches!(err, AutopayError::ChainUnavailable { chain: Chain::Arbitrum, .. }));
    }

    #[test]
    fn fast_calls_pass_through() {
        let adapter = TimeoutChainAdapter::new(Arc::new(SimulatedChain::new(1)), Duration::from_secs(1));
        tokio_test::assert_ok!(tokio_test::block_on(adapter.gas_price_gwei(Chain::Ethereum)));
    }
}
