//! Gas sufficiency checks and top-up planning

use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use crate::chain::ChainAdapter;
use crate::config::{BRIDGE_GAS_UNITS, GAS_BUFFER_MULTIPLIER, GAS_FUNDING_TOKEN, SWAP_GAS_UNITS};
use crate::errors::{AutopayError, AutopayResult};
use crate::routing::{QuoteSource, VenueQuote};
use crate::types::{Chain, GasPlan, RouteStep};
use crate::utils::gas_cost_usd;

/// Balance the wallet must hold for an estimated cost, buffer included.
pub fn required_gas_usd(estimated_gas_usd: Decimal) -> Decimal {
    estimated_gas_usd * GAS_BUFFER_MULTIPLIER
}

pub fn top_up_needed(balance_usd: Decimal, estimated_gas_usd: Decimal) -> bool {
    balance_usd < required_gas_usd(estimated_gas_usd)
}

pub struct GasChecker {
    chain: Arc<dyn ChainAdapter>,
    venues: Arc<dyn QuoteSource>,
    funding_chain: Chain,
}

impl GasChecker {
    pub fn new(chain: Arc<dyn ChainAdapter>, venues: Arc<dyn QuoteSource>, funding_chain: Chain) -> Self {
        Self {
            chain,
            venues,
            funding_chain,
        }
    }

    /// Always reads a fresh balance; nothing is cached between calls.
    pub async fn ensure(&self, chain: Chain, wallet: Address, estimated_gas_usd: Decimal) -> AutopayResult<GasPlan> {
        if estimated_gas_usd < Decimal::ZERO {
            return Err(AutopayError::validation("estimatedGasUSD", "must not be negative"));
        }

        let balance = self.chain.native_balance(chain, wallet).await?;
        let required_usd = required_gas_usd(estimated_gas_usd);
        let needed = top_up_needed(balance.usd, estimated_gas_usd);

        let top_up_steps = if needed {
            let deficit = required_usd - balance.usd;
            match self.top_up_steps(chain, deficit).await {
                Ok(steps) => Some(steps),
                Err(e) => {
                    warn!(%chain, %wallet, "Top-up could not be quoted: {}", e);
                    None
                }
            }
        } else {
            None
        };

        info!(
            %chain,
            %wallet,
            balance_usd = %balance.usd.round_dp(4),
            required_usd = %required_usd.round_dp(4),
            needed,
            "Gas sufficiency checked"
        );

        Ok(GasPlan {
            chain,
            wallet: wallet.to_string(),
            current_balance_usd: balance.usd,
            required_usd,
            needed,
            top_up_steps,
        })
    }

    /// Stable → native swap on the funding chain, then a bridge when the
    /// funding chain is not the target chain.
    async fn top_up_steps(&self, chain: Chain, deficit_usd: Decimal) -> AutopayResult<Vec<RouteStep>> {
        let funding = self.funding_chain;
        // Bought as the funding chain's native coin; the bridge delivers the target's.
        let native = funding.native_symbol();
        let funding_gwei = self.chain.gas_price_gwei(funding).await?;

        let mut swap_quotes = Vec::new();
        for venue in self.venues.swap_venues(funding) {
            if let Ok(quote) = self.venues.swap_quote(&venue, funding, GAS_FUNDING_TOKEN, native, deficit_usd).await {
                swap_quotes.push(quote);
            }
        }
        let swap = best_quote(swap_quotes)?;

        let mut steps = vec![RouteStep::Swap {
            chain: funding,
            venue: swap.venue.clone(),
            token_in: GAS_FUNDING_TOKEN.to_string(),
            token_out: native.to_string(),
            amount_in: deficit_usd,
            amount_out: swap.amount_out,
            gas_usd: gas_cost_usd(SWAP_GAS_UNITS, funding_gwei, funding.native_usd_price()),
        }];

        if funding != chain {
            let bridge_in = swap.amount_out;
            let mut bridge_quotes = Vec::new();
            for venue in self.venues.bridge_venues(funding, chain) {
                if let Ok(quote) = self.venues.bridge_quote(&venue, funding, chain, native, bridge_in).await {
                    bridge_quotes.push(quote);
                }
            }
            let bridge = best_quote(bridge_quotes)?;
            steps.push(RouteStep::Bridge {
                chain: funding,
                to_chain: chain,
                venue: bridge.venue.clone(),
                token: native.to_string(),
                amount_in: bridge_in,
                amount_out: bridge.amount_out,
                gas_usd: gas_cost_usd(BRIDGE_GAS_UNITS, funding_gwei, funding.native_usd_price()),
            });
        }
        Ok(steps)
    }
}

fn best_quote(quotes: Vec<VenueQuote>) -> AutopayResult<VenueQuote> {
    quotes
        .into_iter()
        .min_by(|a, b| b.amount_out.cmp(&a.amount_out).then_with(|| a.venue.cmp(&b.venue)))
        .ok_or_else(|| AutopayError::RouteUnavailable {
            reason: "no venue quotes for gas top-up".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedChain;
    use crate::routing::FeeScheduleVenues;
    use alloy::primitives::address;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    const WALLET: Address = address!("1234567890abcdef1234567890abcdef12345678");

    fn checker(chain: SimulatedChain, funding: Chain) -> GasChecker {
        GasChecker::new(Arc::new(chain), Arc::new(FeeScheduleVenues::new()), funding)
    }

    #[tokio::test]
    async fn equal_balance_and_estimate_needs_top_up() {
        let chain = SimulatedChain::new(1).with_native_balance_usd(Chain::Polygon, WALLET, dec!(0.10));
        let plan = checker(chain, Chain::Ethereum)
            .ensure(Chain::Polygon, WALLET, dec!(0.10))
            .await
            .unwrap();
        assert!(plan.needed);
        assert_eq!(plan.required_usd, dec!(0.150));
        assert_eq!(plan.current_balance_usd, dec!(0.10));

        let steps = plan.top_up_steps.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].chain(), Chain::Ethereum);
        assert_eq!(steps[1].kind(), crate::types::StepKind::Bridge);
        assert_eq!(steps[0].amount_in(), plan.required_usd - plan.current_balance_usd);
    }

    #[tokio::test]
    async fn funding_on_the_same_chain_skips_the_bridge() {
        let chain = SimulatedChain::new(1).with_native_balance(Chain::Base, WALLET, dec!(0));
        let plan = checker(chain, Chain::Base)
            .ensure(Chain::Base, WALLET, dec!(0.02))
            .await
            .unwrap();
        assert_eq!(plan.top_up_steps.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sufficient_balance_has_no_steps() {
        let chain = SimulatedChain::new(1).with_native_balance(Chain::Base, WALLET, dec!(1));
        let plan = checker(chain, Chain::Ethereum)
            .ensure(Chain::Base, WALLET, dec!(0.5))
            .await
            .unwrap();
        assert!(!plan.needed);
        assert!(plan.top_up_steps.is_none());
    }

    #[tokio::test]
    async fn negative_estimate_is_rejected() {
        let err = checker(SimulatedChain::new(1), Chain::Ethereum)
            .ensure(Chain::Base, WALLET, dec!(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, AutopayError::Validation { .. }));
    }

    proptest! {
        #[test]
        fn needed_iff_below_buffered_estimate(balance in 0u64..1_000_000, estimate in 0u64..1_000_000) {
            let balance = Decimal::new(balance as i64, 4);
            let estimate = Decimal::new(estimate as i64, 4);
            prop_assert_eq!(top_up_needed(balance, estimate), balance < estimate * dec!(1.5));
        }
    }
}
