//! Gas sufficiency types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::{Chain, RouteStep};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPlan {
    pub chain: Chain,
    pub wallet: String,
    pub current_balance_usd: Decimal,
    pub required_usd: Decimal,
    pub needed: bool,
    /// Swap into the native gas token, then bridge when the funding chain differs.
    pub top_up_steps: Option<Vec<RouteStep>>,
}

impl GasPlan {
    pub fn deficit_usd(&self) -> Decimal {
        (self.required_usd - self.current_balance_usd).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeBalance {
    pub native: Decimal,
    pub usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasPriceTier {
    pub gwei: Decimal,
    /// Cost of a plain 21k-gas transfer.
    pub usd: Decimal,
    pub fast: Decimal,
    pub standard: Decimal,
    pub safe: Decimal,
}
