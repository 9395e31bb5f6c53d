//! Route planning: swap/bridge/transfer layout, venue ranking and fallbacks

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, info};
use super::{QuoteSource, VenueQuote, venue_router};
use crate::chain::ChainAdapter;
use crate::config::{
    APPROVE_GAS_UNITS, BRIDGE_GAS_UNITS, MAX_FALLBACK_ROUTES, SWAP_GAS_UNITS, TRANSFER_GAS_UNITS,
};
use crate::errors::{AutopayError, AutopayResult};
use crate::types::{Chain, FallbackRoute, RoutePlan, RouteStep, StepKind};
use crate::utils::gas_cost_usd;

pub fn gas_units(kind: StepKind) -> u64 {
    match kind {
        StepKind::Approve => APPROVE_GAS_UNITS,
        StepKind::Swap => SWAP_GAS_UNITS,
        StepKind::Bridge => BRIDGE_GAS_UNITS,
        StepKind::Transfer => TRANSFER_GAS_UNITS,
    }
}

/// Which venue step a payment needs, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VenueLeg {
    None,
    Swap,
    Bridge,
}

fn venue_leg(from: Chain, to: Chain, token_in: &str, token_out: &str) -> VenueLeg {
    if from != to {
        VenueLeg::Bridge
    } else if !token_in.eq_ignore_ascii_case(token_out) {
        VenueLeg::Swap
    } else {
        VenueLeg::None
    }
}

struct GasPrices {
    source_gwei: Decimal,
    destination_gwei: Decimal,
}

pub struct RoutePlanner {
    chain: Arc<dyn ChainAdapter>,
    venues: Arc<dyn QuoteSource>,
    slippage_tolerance: Decimal,
}

impl RoutePlanner {
    pub fn new(chain: Arc<dyn ChainAdapter>, venues: Arc<dyn QuoteSource>, slippage_tolerance: Decimal) -> Self {
        Self {
            chain,
            venues,
            slippage_tolerance,
        }
    }

    pub async fn plan(
        &self,
        from_chain: Chain,
        to_chain: Chain,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
        receiver: &str,
    ) -> AutopayResult<RoutePlan> {
        if amount_in <= Decimal::ZERO {
            return Err(AutopayError::validation("amountIn", "must be greater than zero"));
        }

        let gas = self.gas_prices(from_chain, to_chain).await?;
        let leg = venue_leg(from_chain, to_chain, token_in, token_out);

        let mut quotes = match leg {
            VenueLeg::None => Vec::new(),
            VenueLeg::Swap => {
                let mut quotes = Vec::new();
                for venue in self.venues.swap_venues(from_chain) {
                    match self.venues.swap_quote(&venue, from_chain, token_in, token_out, amount_in).await {
                        Ok(quote) => quotes.push(quote),
                        Err(e) => debug!(%venue, "Dropping swap alternative: {}", e),
                    }
                }
                quotes
            }
            VenueLeg::Bridge => {
                let mut quotes = Vec::new();
                for venue in self.venues.bridge_venues(from_chain, to_chain) {
                    match self.venues.bridge_quote(&venue, from_chain, to_chain, token_in, amount_in).await {
                        Ok(quote) => quotes.push(quote),
                        Err(e) => debug!(%venue, "Dropping bridge alternative: {}", e),
                    }
                }
                quotes
            }
        };

        if leg != VenueLeg::None && quotes.is_empty() {
            return Err(AutopayError::RouteUnavailable {
                reason: format!(
                    "no venue quotes {} {} → {} {}",
                    token_in, from_chain, token_out, to_chain
                ),
            });
        }

        // Best output first; ties resolved by venue name.
        quotes.sort_by(|a, b| b.amount_out.cmp(&a.amount_out).then_with(|| a.venue.cmp(&b.venue)));

        let build = |quote: Option<&VenueQuote>| {
            self.build_steps(from_chain, to_chain, token_in, token_out, amount_in, receiver, quote, &gas)
        };

        let steps = build(quotes.first());
        let fallbacks: Vec<FallbackRoute> = quotes
            .iter()
            .skip(1)
            .take(MAX_FALLBACK_ROUTES)
            .map(|quote| {
                let steps = build(Some(quote));
                FallbackRoute {
                    via: quote.venue.clone(),
                    expected_output: steps.last().map(|s| s.amount_out()).unwrap_or_default(),
                    gas_estimate_usd: steps.iter().map(|s| s.gas_usd()).sum(),
                    steps,
                }
            })
            .collect();

        let plan = RoutePlan {
            from_chain,
            to_chain,
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            amount_in,
            gas_estimate_usd: steps.iter().map(|s| s.gas_usd()).sum(),
            steps,
            fallbacks,
        };

        info!(
            from = %from_chain,
            to = %to_chain,
            venue = plan.primary_venue().unwrap_or("direct"),
            expected_out = %plan.expected_output(),
            fallbacks = plan.fallbacks.len(),
            "Route planned"
        );
        Ok(plan)
    }

    /// Prices the step layout for a payment without quoting any venue.
    pub async fn estimate_gas_usd(
        &self,
        from_chain: Chain,
        to_chain: Chain,
        token_in: &str,
        token_out: &str,
    ) -> AutopayResult<Decimal> {
        let gas = self.gas_prices(from_chain, to_chain).await?;
        let source = |units| gas_cost_usd(units, gas.source_gwei, from_chain.native_usd_price());
        let needs_approve = !from_chain.is_native(token_in);

        let venue_gas = match venue_leg(from_chain, to_chain, token_in, token_out) {
            VenueLeg::None => Decimal::ZERO,
            VenueLeg::Swap => source(SWAP_GAS_UNITS),
            VenueLeg::Bridge => source(BRIDGE_GAS_UNITS),
        };
        let approve_gas = match venue_leg(from_chain, to_chain, token_in, token_out) {
            VenueLeg::None => Decimal::ZERO,
            _ if needs_approve => source(APPROVE_GAS_UNITS),
            _ => Decimal::ZERO,
        };
        let transfer_gas = gas_cost_usd(TRANSFER_GAS_UNITS, gas.destination_gwei, to_chain.native_usd_price());

        Ok(approve_gas + venue_gas + transfer_gas)
    }

    /// Fresh quote for one step at `amount_in`; planned amounts are never reused.
    pub async fn requote_step(&self, step: &RouteStep, amount_in: Decimal) -> AutopayResult<RouteStep> {
        let gwei = self.chain.gas_price_gwei(step.chain()).await?;
        let gas_usd = gas_cost_usd(gas_units(step.kind()), gwei, step.chain().native_usd_price());

        let requoted = match step {
            RouteStep::Approve { .. } | RouteStep::Transfer { .. } => step.with_amounts(amount_in, amount_in),
            RouteStep::Swap { chain, venue, token_in, token_out, .. } => {
                let quote = self.venues.swap_quote(venue, *chain, token_in, token_out, amount_in).await?;
                step.with_amounts(amount_in, quote.amount_out)
            }
            RouteStep::Bridge { chain, to_chain, venue, token, .. } => {
                let quote = self.venues.bridge_quote(venue, *chain, *to_chain, token, amount_in).await?;
                step.with_amounts(amount_in, quote.amount_out)
            }
        };
        Ok(requoted.with_gas_usd(gas_usd))
    }

    /// `(amountIn − finalOut) / amountIn`, as a fraction.
    pub fn slippage(plan: &RoutePlan) -> Decimal {
        if plan.amount_in.is_zero() {
            return Decimal::ZERO;
        }
        (plan.amount_in - plan.expected_output()) / plan.amount_in
    }

    pub fn risk_flags(&self, plan: &RoutePlan) -> Vec<String> {
        let slippage = Self::slippage(plan);
        if slippage > self.slippage_tolerance {
            vec![format!(
                "Slippage {} exceeds tolerance {}",
                format_percent(slippage),
                format_percent(self.slippage_tolerance)
            )]
        } else {
            Vec::new()
        }
    }

    async fn gas_prices(&self, from_chain: Chain, to_chain: Chain) -> AutopayResult<GasPrices> {
        if from_chain == to_chain {
            let gwei = self.chain.gas_price_gwei(from_chain).await?;
            return Ok(GasPrices {
                source_gwei: gwei,
                destination_gwei: gwei,
            });
        }
        let (source_gwei, destination_gwei) = tokio::try_join!(
            self.chain.gas_price_gwei(from_chain),
            self.chain.gas_price_gwei(to_chain),
        )?;
        Ok(GasPrices {
            source_gwei,
            destination_gwei,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_steps(
        &self,
        from_chain: Chain,
        to_chain: Chain,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
        receiver: &str,
        quote: Option<&VenueQuote>,
        gas: &GasPrices,
    ) -> Vec<RouteStep> {
        let source = |units| gas_cost_usd(units, gas.source_gwei, from_chain.native_usd_price());
        let mut steps = Vec::new();
        let mut running = amount_in;

        if let Some(quote) = quote {
            if !from_chain.is_native(token_in) {
                steps.push(RouteStep::Approve {
                    chain: from_chain,
                    token: token_in.to_string(),
                    spender: format!("{:#x}", venue_router(&quote.venue)),
                    venue: quote.venue.clone(),
                    amount_in: running,
                    amount_out: running,
                    gas_usd: source(APPROVE_GAS_UNITS),
                });
            }

            if from_chain == to_chain {
                steps.push(RouteStep::Swap {
                    chain: from_chain,
                    venue: quote.venue.clone(),
                    token_in: token_in.to_string(),
                    token_out: token_out.to_string(),
                    amount_in: running,
                    amount_out: quote.amount_out,
                    gas_usd: source(SWAP_GAS_UNITS),
                });
            } else {
                steps.push(RouteStep::Bridge {
                    chain: from_chain,
                    to_chain,
                    venue: quote.venue.clone(),
                    token: token_in.to_string(),
                    amount_in: running,
                    amount_out: quote.amount_out,
                    gas_usd: source(BRIDGE_GAS_UNITS),
                });
            }
            running = quote.amount_out;
        }

        steps.push(RouteStep::Transfer {
            chain: to_chain,
            token: token_out.to_string(),
            to: receiver.to_string(),
            amount_in: running,
            amount_out: running,
            gas_usd: gas_cost_usd(TRANSFER_GAS_UNITS, gas.destination_gwei, to_chain.native_usd_price()),
        });
        steps
    }
}

/// `0.005` → `"0.50%"`.
pub fn format_percent(fraction: Decimal) -> String {
    format!("{:.2}%", (fraction * dec!(100)).round_dp(2))
}
