//! Mathematical utility functions

use alloy::primitives::U256;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::str::FromStr;
use crate::errors::{AutopayError, AutopayResult};

/// Largest scale a `Decimal` can hold.
const MAX_DECIMALS: u32 = 28;

pub fn pow10(n: i32) -> Decimal {
    match n {
        0 => dec!(1),
        6 => dec!(1_000_000),
        9 => dec!(1_000_000_000),
        18 => dec!(1_000_000_000_000_000_000),
        _ => {
            let mut result = dec!(1);
            if n > 0 {
                for _ in 0..n {
                    result *= dec!(10);
                }
            } else {
                for _ in 0..(-n) {
                    result /= dec!(10);
                }
            }
            result
        }
    }
}

/// Token amount to integer base units, truncating sub-unit dust. Amounts
/// too large to scale are rejected rather than wrapped or zeroed.
pub fn to_base_units(amount: Decimal, decimals: u32) -> AutopayResult<U256> {
    if decimals > MAX_DECIMALS {
        return Err(AutopayError::validation(
            "decimals",
            format!("{} decimals is beyond supported precision", decimals),
        ));
    }
    let scaled = amount
        .checked_mul(pow10(decimals as i32))
        .ok_or_else(|| {
            AutopayError::validation(
                "amount",
                format!("{} is too large for a {}-decimal token", amount, decimals),
            )
        })?
        .trunc();
    U256::from_str(&scaled.normalize().to_string()).map_err(|e| {
        AutopayError::validation("amount", format!("{} has no base-unit form: {}", amount, e))
    })
}

/// Wei to whole native units. Saturates at `Decimal::MAX` for absurd balances.
pub fn from_wei(wei: U256) -> Decimal {
    Decimal::from_str(&wei.to_string())
        .map(|d| d / pow10(18))
        .unwrap_or(Decimal::MAX)
}

/// Gas cost in USD for `units` at `gwei`, priced in the native coin.
pub fn gas_cost_usd(units: u64, gwei: Decimal, native_usd: Decimal) -> Decimal {
    Decimal::from(units) * gwei / pow10(9) * native_usd
}
