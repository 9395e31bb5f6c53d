//! Request and response shapes for the route, gas, risk and subscription operations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::{Chain, ExecutionRecord, FallbackRoute, RouteStep, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuoteRequest {
    pub from_chain: String,
    pub to_chain: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub receiver_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuoteResponse {
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub steps: Vec<RouteStep>,
    #[serde(rename = "gasEstimateUSD")]
    pub gas_estimate_usd: String,
    pub risk: RouteRisk,
    pub fallback_routes: Vec<FallbackRoute>,
    pub bundle: Vec<BundleTx>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRisk {
    pub slippage: String,
    pub flags: Vec<String>,
}

/// Unsigned calldata for one step, hex encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleTx {
    pub chain: Chain,
    pub tx: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEnsureRequest {
    pub chain: String,
    pub user_address: String,
    #[serde(rename = "estimatedGasUSD")]
    pub estimated_gas_usd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEnsureResponse {
    pub needed: bool,
    #[serde(rename = "currentBalanceUSD")]
    pub current_balance_usd: String,
    #[serde(rename = "requiredUSD")]
    pub required_usd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_up_steps: Option<Vec<RouteStep>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScanRequest {
    pub token_address: String,
    pub receiver_address: String,
    pub chain: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub token_symbol: String,
    #[serde(default)]
    pub token_address: Option<String>,
    pub amount: String,
    pub receiver_address: String,
    pub owner_address: String,
    pub from_chain: String,
    pub to_chain: String,
    pub frequency: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub last_execution: Option<ExecutionRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub executions: Vec<ExecutionRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPricesResponse {
    pub gas_prices: std::collections::BTreeMap<Chain, super::GasPriceTier>,
    pub timestamp: DateTime<Utc>,
}
