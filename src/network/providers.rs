//! Live chain adapter over alloy HTTP providers, read-only

use alloy::{
    primitives::{Address, keccak256},
    providers::{Provider, ProviderBuilder},
    rpc::types::eth::TransactionRequest,
    sol_types::{sol_data, SolType, SolValue},
    transports::{RpcError, TransportError},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use crate::{
    chain::{ChainAdapter, SimulationOutcome, TokenMetadata, TxRequest},
    config::Config,
    errors::{AutopayError, AutopayResult},
    network::retry::{retry_with_backoff, RetryConfig},
    types::{Chain, NativeBalance},
    utils::{from_wei, pow10},
    ConcreteProvider,
};

/// Simulation is an `eth_call` against latest state; nothing is signed or broadcast.
pub struct RpcChainAdapter {
    providers: HashMap<Chain, Arc<ConcreteProvider>>,
}

impl RpcChainAdapter {
    pub fn new(config: &Config) -> Result<Self> {
        let mut providers = HashMap::new();
        for chain in Chain::ALL {
            let rpc_url = config.rpc_url(chain);
            let provider: Arc<ConcreteProvider> = Arc::new(
                ProviderBuilder::new()
                    .on_http(rpc_url.parse().with_context(|| format!("Invalid RPC URL for {}", chain))?)
                    .boxed()
            );
            providers.insert(chain, provider);
        }
        Ok(Self { providers })
    }

    /// Fetches the head block of every chain once. Unreachable chains are
    /// reported to the caller, not treated as fatal.
    pub async fn check_connections(&self) -> Vec<(Chain, AutopayResult<u64>)> {
        let mut results = Vec::new();
        for (chain, provider) in &self.providers {
            info!("🔗 Testing connection to {}...", chain);
            let block = retry_with_backoff(
                || async {
                    provider.get_block_number().await
                        .context("Failed to get block number")
                },
                &RetryConfig {
                    max_attempts: 3,
                    initial_delay_ms: 500,
                    max_delay_ms: 5000,
                    exponential_base: 2.0,
                },
                *chain,
                "connection check",
            ).await;
            results.push((*chain, block));
        }
        results
    }

    fn provider(&self, chain: Chain) -> AutopayResult<&Arc<ConcreteProvider>> {
        self.providers.get(&chain).ok_or(AutopayError::ChainUnavailable {
            chain,
            operation: "provider lookup".to_string(),
            source: None,
        })
    }

    async fn read_call(&self, chain: Chain, to: Address, signature: &str) -> AutopayResult<Option<Vec<u8>>> {
        let provider = self.provider(chain)?;
        let tx = TransactionRequest::default()
            .to(to)
            .input(keccak256(signature)[..4].to_vec().into());
        match provider.call(&tx).await {
            Ok(bytes) => Ok(Some(bytes.to_vec())),
            // The contract answered with a revert: not a token, or not this method.
            Err(RpcError::ErrorResp(payload)) => {
                debug!(%chain, %to, signature, "Call reverted: {}", payload.message);
                Ok(None)
            }
            Err(e) => Err(AutopayError::chain_unavailable(chain, signature, e)),
        }
    }
}

fn unavailable(chain: Chain, operation: &str, error: TransportError) -> AutopayError {
    AutopayError::chain_unavailable(chain, operation, error)
}

#[async_trait]
impl ChainAdapter for RpcChainAdapter {
    async fn native_balance(&self, chain: Chain, wallet: Address) -> AutopayResult<NativeBalance> {
        let wei = self.provider(chain)?
            .get_balance(wallet)
            .await
            .map_err(|e| unavailable(chain, "get_balance", e))?;
        let native = from_wei(wei);
        Ok(NativeBalance {
            native,
            usd: native * chain.native_usd_price(),
        })
    }

    async fn gas_price_gwei(&self, chain: Chain) -> AutopayResult<Decimal> {
        let wei = self.provider(chain)?
            .get_gas_price()
            .await
            .map_err(|e| unavailable(chain, "get_gas_price", e))?;
        Ok(Decimal::from_u128(wei).unwrap_or_default() / pow10(9))
    }

    async fn has_code(&self, chain: Chain, address: Address) -> AutopayResult<bool> {
        let code = self.provider(chain)?
            .get_code_at(address)
            .await
            .map_err(|e| unavailable(chain, "get_code", e))?;
        Ok(!code.is_empty())
    }

    async fn token_metadata(&self, chain: Chain, token: Address) -> AutopayResult<Option<TokenMetadata>> {
        let Some(name) = self.read_call(chain, token, "name()").await? else {
            return Ok(None);
        };
        let Some(symbol) = self.read_call(chain, token, "symbol()").await? else {
            return Ok(None);
        };
        let Some(decimals) = self.read_call(chain, token, "decimals()").await? else {
            return Ok(None);
        };

        let decoded = (
            String::abi_decode(&name, true),
            String::abi_decode(&symbol, true),
            <sol_data::Uint<8> as SolType>::abi_decode(&decimals, true),
        );
        match decoded {
            (Ok(name), Ok(symbol), Ok(decimals)) => Ok(Some(TokenMetadata { name, symbol, decimals })),
            _ => {
                debug!(%chain, %token, "Token metadata did not decode as ERC-20");
                Ok(None)
            }
        }
    }

    async fn simulate(&self, tx: &TxRequest) -> AutopayResult<SimulationOutcome> {
        let provider = self.provider(tx.chain)?;
        let request = TransactionRequest::default()
            .from(tx.from)
            .to(tx.to)
            .value(tx.value)
            .input(tx.data.clone().into())
            .gas_limit(tx.gas_limit);

        match provider.call(&request).await {
            Ok(_) => {
                let mut material = tx.chain.chain_id().to_be_bytes().to_vec();
                material.extend_from_slice(tx.from.as_slice());
                material.extend_from_slice(tx.to.as_slice());
                material.extend_from_slice(&tx.data);
                Ok(SimulationOutcome {
                    tx_hash: keccak256(&material),
                    gas_used: tx.gas_limit,
                })
            }
            Err(RpcError::ErrorResp(payload)) => Err(AutopayError::SimulationFailure {
                chain: tx.chain,
                step: tx.label.clone(),
                reason: payload.message.to_string(),
            }),
            Err(e) => Err(unavailable(tx.chain, "eth_call", e)),
        }
    }
}
