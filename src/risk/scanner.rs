//! Risk scanning against live chain facts

use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use super::{ChainFacts, RiskSignals, assess};
use crate::chain::ChainAdapter;
use crate::errors::{AutopayError, AutopayResult};
use crate::types::{Chain, NATIVE_TOKEN_SENTINEL, RiskAssessment};

pub struct RiskScanner {
    chain: Arc<dyn ChainAdapter>,
    signals: Arc<dyn RiskSignals>,
}

impl RiskScanner {
    pub fn new(chain: Arc<dyn ChainAdapter>, signals: Arc<dyn RiskSignals>) -> Self {
        Self { chain, signals }
    }

    /// Deterministic for fixed inputs and chain facts. A fact that cannot be
    /// fetched degrades confidence instead of failing the scan.
    pub async fn scan(
        &self,
        chain: Chain,
        token: Address,
        receiver: Address,
        amount: Decimal,
    ) -> AutopayResult<RiskAssessment> {
        if amount < Decimal::ZERO {
            return Err(AutopayError::validation("amount", "must not be negative"));
        }

        let native_token = token == NATIVE_TOKEN_SENTINEL;
        let receiver_hex = format!("{:#x}", receiver);

        let (token_code, token_metadata, receiver_code, flagged) = tokio::join!(
            async {
                if native_token {
                    Ok(true)
                } else {
                    self.chain.has_code(chain, token).await
                }
            },
            async {
                if native_token {
                    Ok(true)
                } else {
                    self.chain.token_metadata(chain, token).await.map(|m| m.is_some())
                }
            },
            self.chain.has_code(chain, receiver),
            self.signals.is_flagged(chain, &receiver_hex),
        );

        let facts = ChainFacts {
            native_token,
            token_is_contract: live_fact(chain, "token code", token_code),
            token_metadata_resolved: live_fact(chain, "token metadata", token_metadata),
            receiver_is_contract: live_fact(chain, "receiver code", receiver_code),
        };

        let assessment = assess(&receiver_hex, amount, flagged, &facts);
        info!(
            %chain,
            receiver = %receiver_hex,
            level = %assessment.risk_level,
            flags = assessment.flags.len(),
            confidence = assessment.confidence,
            degraded = assessment.degraded,
            "Risk scan complete"
        );
        Ok(assessment)
    }
}

fn live_fact(chain: Chain, what: &str, result: AutopayResult<bool>) -> Option<bool> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_retryable() => {
            warn!(%chain, what, "Chain fact unavailable: {}", e);
            None
        }
        Err(e) => {
            debug!(%chain, what, "Chain fact failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedChain;
    use crate::risk::{FLAG_HIGH_VALUE, FLAG_NOT_CONTRACT, FLAG_UNKNOWN_TOKEN, StaticBlocklist};
    use crate::types::{RiskLevel, resolve_token};
    use alloy::primitives::address;
    use rust_decimal_macros::dec;

    const RECEIVER: Address = address!("742d35Cc6634C0532925a3b844Bc9e7595f0bEb1");

    fn scanner(chain: SimulatedChain) -> RiskScanner {
        RiskScanner::new(Arc::new(chain), Arc::new(StaticBlocklist::default()))
    }

    fn usdc(chain: Chain) -> Address {
        resolve_token(chain, "USDC").unwrap().address
    }

    #[tokio::test]
    async fn large_known_token_payment_is_medium() {
        let assessment = scanner(SimulatedChain::new(1))
            .scan(Chain::Base, usdc(Chain::Base), RECEIVER, dec!(1500))
            .await
            .unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert_eq!(assessment.flags, vec![FLAG_HIGH_VALUE.to_string()]);
        assert_eq!(assessment.confidence, 0.95);
    }

    #[tokio::test]
    async fn scam_receiver_is_high_regardless_of_amount() {
        let scam = address!("000000000000000000000000000000000000dEaD");
        let assessment = scanner(SimulatedChain::new(1))
            .scan(Chain::Base, usdc(Chain::Base), scam, dec!(1))
            .await
            .unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert!(assessment.is_blocking());
    }

    #[tokio::test]
    async fn undeployed_token_is_high() {
        let token = address!("5555555555555555555555555555555555555554");
        let assessment = scanner(SimulatedChain::new(1))
            .scan(Chain::Base, token, RECEIVER, dec!(5))
            .await
            .unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert!(assessment.flags.contains(&FLAG_NOT_CONTRACT.to_string()));
        assert!(assessment.flags.contains(&FLAG_UNKNOWN_TOKEN.to_string()));
    }

    #[tokio::test]
    async fn outage_degrades_confidence() {
        let assessment = scanner(SimulatedChain::new(1).with_unavailable_chain(Chain::Base))
            .scan(Chain::Base, usdc(Chain::Base), RECEIVER, dec!(5))
            .await
            .unwrap();
        assert!(assessment.degraded);
        assert_eq!(assessment.confidence, 0.50);
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn native_token_skips_contract_checks() {
        let assessment = scanner(SimulatedChain::new(1))
            .scan(Chain::Arbitrum, NATIVE_TOKEN_SENTINEL, RECEIVER, dec!(1))
            .await
            .unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(assessment.flags.is_empty());
    }
}
