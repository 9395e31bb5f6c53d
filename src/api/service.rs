//! Request/response operations over subscriptions, routes, gas and risk

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::chain::ChainAdapter;
use crate::config::{Config, RECENT_EXECUTIONS_LIMIT, ROUTE_CACHE_TTL_SECS, TRANSFER_GAS_UNITS};
use crate::errors::{AutopayError, AutopayResult};
use crate::execution::bundle;
use crate::gas::GasChecker;
use crate::risk::{RiskScanner, RiskSignals};
use crate::routing::{QuoteSource, RoutePlanner, RouteQuoteCache, format_percent, route_key};
use crate::storage::SubscriptionStore;
use crate::types::{
    Chain, CreateSubscriptionRequest, GasEnsureRequest, GasEnsureResponse, GasPriceTier, GasPricesResponse,
    NewSubscription, RiskAssessment, RiskScanRequest, RouteQuoteRequest, RouteQuoteResponse, RouteRisk,
    Subscription, SubscriptionDetails, SubscriptionSummary, resolve_token,
};
use crate::utils::{gas_cost_usd, to_base_units};
use crate::validation::{
    parse_address, parse_amount, parse_cadence, parse_chain, parse_non_negative, require_non_empty,
};

pub struct AutopayService {
    store: Arc<dyn SubscriptionStore>,
    chain: Arc<dyn ChainAdapter>,
    planner: RoutePlanner,
    gas: GasChecker,
    risk: RiskScanner,
    cache: RouteQuoteCache,
    slippage_tolerance: Decimal,
}

impl AutopayService {
    pub fn new(
        chain: Arc<dyn ChainAdapter>,
        venues: Arc<dyn QuoteSource>,
        signals: Arc<dyn RiskSignals>,
        store: Arc<dyn SubscriptionStore>,
        config: &Config,
    ) -> Self {
        let slippage_tolerance = config.slippage_tolerance();
        Self {
            planner: RoutePlanner::new(chain.clone(), venues.clone(), slippage_tolerance),
            gas: GasChecker::new(chain.clone(), venues, config.gas_funding_chain),
            risk: RiskScanner::new(chain.clone(), signals),
            cache: RouteQuoteCache::new(ROUTE_CACHE_TTL_SECS),
            store,
            chain,
            slippage_tolerance,
        }
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    /// First run is one cadence period from now.
    pub async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
        now: DateTime<Utc>,
    ) -> AutopayResult<Subscription> {
        let name = require_non_empty("name", &request.name)?.to_string();
        let token_symbol = require_non_empty("tokenSymbol", &request.token_symbol)?.to_string();
        let amount = parse_amount("amount", &request.amount)?;
        let receiver = parse_address("receiverAddress", &request.receiver_address)?;
        let owner = parse_address("ownerAddress", &request.owner_address)?;
        let from_chain = parse_chain("fromChain", &request.from_chain)?;
        let to_chain = parse_chain("toChain", &request.to_chain)?;
        let cadence = parse_cadence("frequency", &request.frequency)?;

        let token_address = match request.token_address.as_deref().filter(|a| !a.trim().is_empty()) {
            Some(raw) => parse_address("tokenAddress", raw)?,
            None => resolve_token(from_chain, &token_symbol)
                .map(|token| token.address)
                .ok_or_else(|| {
                    AutopayError::validation(
                        "tokenAddress",
                        format!("'{}' is not a known token on {}; provide its address", token_symbol, from_chain),
                    )
                })?,
        };

        if let Some(token) = resolve_token(from_chain, &format!("{:#x}", token_address)) {
            to_base_units(amount, token.decimals)?;
        }

        let subscription = self
            .store
            .create(
                NewSubscription {
                    name,
                    description: request.description.filter(|d| !d.trim().is_empty()),
                    owner: format!("{:#x}", owner),
                    token_symbol,
                    token_address: format!("{:#x}", token_address),
                    amount,
                    receiver_address: format!("{:#x}", receiver),
                    from_chain,
                    to_chain,
                    cadence,
                    next_run_date: cadence.advance(now),
                },
                now,
            )
            .await?;

        info!(
            subscription_id = %subscription.id,
            amount = %subscription.amount,
            token = %subscription.token_symbol,
            route = %format!("{} → {}", from_chain, to_chain),
            cadence = %cadence,
            "Subscription created"
        );
        Ok(subscription)
    }

    /// Newest first, each with its latest execution.
    pub async fn list_subscriptions(&self) -> AutopayResult<Vec<SubscriptionSummary>> {
        let subscriptions = self.store.list().await?;
        let mut summaries = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let last_execution = self.store.executions(&subscription.id, 1).await?.into_iter().next();
            summaries.push(SubscriptionSummary {
                subscription,
                last_execution,
            });
        }
        Ok(summaries)
    }

    /// Deactivates; subscriptions are never deleted. An execution already in
    /// flight stops before its next untaken step.
    pub async fn cancel_subscription(&self, id: &str) -> AutopayResult<Subscription> {
        let id = require_non_empty("id", id)?;
        let subscription = self
            .store
            .update_with(id, Box::new(|s| s.is_active = false))
            .await?;
        info!(subscription_id = %subscription.id, "Subscription cancelled");
        Ok(subscription)
    }

    pub async fn subscription_details(&self, id: &str) -> AutopayResult<SubscriptionDetails> {
        let subscription = self.store.get(id).await?;
        let executions = self.store.executions(id, RECENT_EXECUTIONS_LIMIT).await?;
        Ok(SubscriptionDetails {
            subscription,
            executions,
        })
    }

    pub async fn quote_route(&self, request: RouteQuoteRequest, now: DateTime<Utc>) -> AutopayResult<RouteQuoteResponse> {
        let from_chain = parse_chain("fromChain", &request.from_chain)?;
        let to_chain = parse_chain("toChain", &request.to_chain)?;
        let token_in = require_non_empty("tokenIn", &request.token_in)?;
        let token_out = require_non_empty("tokenOut", &request.token_out)?;
        let amount_in = parse_amount("amountIn", &request.amount_in)?;
        let receiver = parse_address("receiverAddress", &request.receiver_address)?;
        let receiver_hex = format!("{:#x}", receiver);

        let key = route_key(from_chain, to_chain, token_in, amount_in);
        if let Some(cached) = self.cache.get(&key, token_out, &receiver_hex, now).await {
            debug!(%key, "Route quote served from cache");
            return Ok(cached);
        }

        let plan = self
            .planner
            .plan(from_chain, to_chain, token_in, token_out, amount_in, &receiver_hex)
            .await?;
        let calldata = bundle(&plan.steps, receiver, self.slippage_tolerance, now)?;

        let response = RouteQuoteResponse {
            from_chain,
            to_chain,
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            amount_in,
            gas_estimate_usd: format!("{:.4}", plan.gas_estimate_usd.round_dp(4)),
            risk: RouteRisk {
                slippage: format_percent(RoutePlanner::slippage(&plan)),
                flags: self.planner.risk_flags(&plan),
            },
            steps: plan.steps,
            fallback_routes: plan.fallbacks,
            bundle: calldata,
        };

        self.cache
            .insert(key, token_out, &receiver_hex, response.clone(), now)
            .await;
        Ok(response)
    }

    /// Lookup by `"{from}-{to}-{tokenIn}-{amountIn}"`.
    pub async fn cached_quote(&self, key: &str, now: DateTime<Utc>) -> AutopayResult<RouteQuoteResponse> {
        self.cache
            .get_by_key(key, now)
            .await
            .ok_or_else(|| AutopayError::NotFound { id: key.to_string() })
    }

    pub async fn ensure_gas(&self, request: GasEnsureRequest) -> AutopayResult<GasEnsureResponse> {
        let chain = parse_chain("chain", &request.chain)?;
        let wallet = parse_address("userAddress", &request.user_address)?;
        let estimate = parse_non_negative("estimatedGasUSD", &request.estimated_gas_usd)?;

        let plan = self.gas.ensure(chain, wallet, estimate).await?;
        Ok(GasEnsureResponse {
            needed: plan.needed,
            current_balance_usd: format!("{:.2}", plan.current_balance_usd.round_dp(2)),
            required_usd: format!("{:.2}", plan.required_usd.round_dp(2)),
            top_up_steps: plan.top_up_steps,
        })
    }

    /// Current gas tiers for every supported chain; chains that cannot be
    /// reached are left out.
    pub async fn gas_prices(&self, now: DateTime<Utc>) -> GasPricesResponse {
        let mut gas_prices = BTreeMap::new();
        for chain in Chain::ALL {
            match self.chain.gas_price_gwei(chain).await {
                Ok(gwei) => {
                    gas_prices.insert(
                        chain,
                        GasPriceTier {
                            gwei,
                            usd: gas_cost_usd(TRANSFER_GAS_UNITS, gwei, chain.native_usd_price()).round_dp(6),
                            fast: gwei * dec!(1.2),
                            standard: gwei,
                            safe: gwei * dec!(0.8),
                        },
                    );
                }
                Err(e) => warn!(%chain, "Skipping gas price: {}", e),
            }
        }
        GasPricesResponse {
            gas_prices,
            timestamp: now,
        }
    }

    /// `tokenAddress` may also be a known symbol.
    pub async fn scan_risk(&self, request: RiskScanRequest) -> AutopayResult<RiskAssessment> {
        let chain = parse_chain("chain", &request.chain)?;
        let token = require_non_empty("tokenAddress", &request.token_address)?;
        let token = if token.starts_with("0x") {
            parse_address("tokenAddress", token)?
        } else {
            resolve_token(chain, token)
                .map(|t| t.address)
                .ok_or_else(|| AutopayError::validation("tokenAddress", format!("'{}' is not a known token on {}", token, chain)))?
        };
        let receiver = parse_address("receiverAddress", &request.receiver_address)?;
        let amount = parse_non_negative("amount", &request.amount)?;

        self.risk.scan(chain, token, receiver, amount).await
    }
}
