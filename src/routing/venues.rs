//! Swap and bridge venues with a fixed fee schedule

use alloy::primitives::{Address, keccak256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use crate::errors::{AutopayError, AutopayResult};
use crate::types::Chain;

#[derive(Debug, Clone, PartialEq)]
pub struct VenueQuote {
    pub venue: String,
    pub amount_out: Decimal,
    pub router: Address,
}

/// Source of swap and bridge quotes.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn swap_venues(&self, chain: Chain) -> Vec<String>;

    fn bridge_venues(&self, from: Chain, to: Chain) -> Vec<String>;

    async fn swap_quote(
        &self,
        venue: &str,
        chain: Chain,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> AutopayResult<VenueQuote>;

    async fn bridge_quote(
        &self,
        venue: &str,
        from: Chain,
        to: Chain,
        token: &str,
        amount_in: Decimal,
    ) -> AutopayResult<VenueQuote>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VenueKind {
    Swap,
    Bridge,
}

struct Venue {
    name: &'static str,
    kind: VenueKind,
    fee_bps: u32,
    chains: &'static [Chain],
}

const ALL_CHAINS: &[Chain] = &Chain::ALL;
const NO_BASE: &[Chain] = &[Chain::Ethereum, Chain::Arbitrum, Chain::Polygon, Chain::Optimism];
const NO_OPTIMISM: &[Chain] = &[Chain::Ethereum, Chain::Base, Chain::Arbitrum, Chain::Polygon];

const VENUES: &[Venue] = &[
    Venue { name: "1inch", kind: VenueKind::Swap, fee_bps: 10, chains: ALL_CHAINS },
    Venue { name: "Uniswap V3", kind: VenueKind::Swap, fee_bps: 30, chains: ALL_CHAINS },
    Venue { name: "Curve", kind: VenueKind::Swap, fee_bps: 4, chains: NO_BASE },
    Venue { name: "Balancer", kind: VenueKind::Swap, fee_bps: 20, chains: NO_OPTIMISM },
    Venue { name: "SushiSwap", kind: VenueKind::Swap, fee_bps: 30, chains: NO_OPTIMISM },
    Venue { name: "Socket", kind: VenueKind::Bridge, fee_bps: 10, chains: ALL_CHAINS },
    Venue { name: "Across", kind: VenueKind::Bridge, fee_bps: 5, chains: ALL_CHAINS },
    Venue { name: "Stargate", kind: VenueKind::Bridge, fee_bps: 6, chains: ALL_CHAINS },
    Venue { name: "Hop Protocol", kind: VenueKind::Bridge, fee_bps: 20, chains: ALL_CHAINS },
    Venue { name: "Synapse", kind: VenueKind::Bridge, fee_bps: 15, chains: NO_BASE },
];

/// Deterministic router address for a venue, used as the call target and spender.
pub fn venue_router(venue: &str) -> Address {
    Address::from_slice(&keccak256(venue.as_bytes())[12..])
}

/// Quotes are `amount_in` less the venue's fixed fee. There is no randomness.
#[derive(Default)]
pub struct FeeScheduleVenues {
    unavailable: HashSet<String>,
}

impl FeeScheduleVenues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quotes from `venue` fail; used to exercise fallback behaviour.
    pub fn with_unavailable_venue(mut self, venue: &str) -> Self {
        self.unavailable.insert(venue.to_string());
        self
    }

    fn lookup(&self, venue: &str, kind: VenueKind) -> AutopayResult<&'static Venue> {
        let found = VENUES
            .iter()
            .find(|v| v.kind == kind && v.name == venue)
            .ok_or_else(|| AutopayError::RouteUnavailable {
                reason: format!("unknown venue '{}'", venue),
            })?;
        if self.unavailable.contains(venue) {
            return Err(AutopayError::RouteUnavailable {
                reason: format!("{} is not quoting", venue),
            });
        }
        Ok(found)
    }

    fn net_of_fee(amount_in: Decimal, fee_bps: u32) -> AutopayResult<Decimal> {
        amount_in
            .checked_mul(dec!(10000) - Decimal::from(fee_bps))
            .map(|gross| gross / dec!(10000))
            .ok_or_else(|| AutopayError::validation("amountIn", format!("{} is too large to quote", amount_in)))
    }
}

#[async_trait]
impl QuoteSource for FeeScheduleVenues {
    fn swap_venues(&self, chain: Chain) -> Vec<String> {
        VENUES
            .iter()
            .filter(|v| v.kind == VenueKind::Swap && v.chains.contains(&chain))
            .map(|v| v.name.to_string())
            .collect()
    }

    fn bridge_venues(&self, from: Chain, to: Chain) -> Vec<String> {
        VENUES
            .iter()
            .filter(|v| v.kind == VenueKind::Bridge && v.chains.contains(&from) && v.chains.contains(&to))
            .map(|v| v.name.to_string())
            .collect()
    }

    async fn swap_quote(
        &self,
        venue: &str,
        chain: Chain,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> AutopayResult<VenueQuote> {
        let v = self.lookup(venue, VenueKind::Swap)?;
        if !v.chains.contains(&chain) {
            return Err(AutopayError::RouteUnavailable {
                reason: format!("{} does not swap {}→{} on {}", venue, token_in, token_out, chain),
            });
        }
        Ok(VenueQuote {
            venue: v.name.to_string(),
            amount_out: Self::net_of_fee(amount_in, v.fee_bps)?,
            router: venue_router(v.name),
        })
    }

    async fn bridge_quote(
        &self,
        venue: &str,
        from: Chain,
        to: Chain,
        token: &str,
        amount_in: Decimal,
    ) -> AutopayResult<VenueQuote> {
        let v = self.lookup(venue, VenueKind::Bridge)?;
        if !v.chains.contains(&from) || !v.chains.contains(&to) {
            return Err(AutopayError::RouteUnavailable {
                reason: format!("{} does not bridge {} from {} to {}", venue, token, from, to),
            });
        }
        Ok(VenueQuote {
            venue: v.name.to_string(),
            amount_out: Self::net_of_fee(amount_in, v.fee_bps)?,
            router: venue_router(v.name),
        })
    }
}
