//! Input validation for amounts, addresses, chains and cadences

use alloy::primitives::Address;
use rust_decimal::prelude::*;
use std::str::FromStr;
use crate::errors::{AutopayError, AutopayResult};
use crate::types::{Cadence, Chain};

pub fn require_non_empty<'a>(field: &str, value: &'a str) -> AutopayResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AutopayError::validation(field, "is required"));
    }
    Ok(trimmed)
}

/// Decimal string, parsed exactly. Never goes through floating point.
pub fn parse_decimal(field: &str, raw: &str) -> AutopayResult<Decimal> {
    let raw = require_non_empty(field, raw)?;
    Decimal::from_str(raw).map_err(|_| AutopayError::validation(field, format!("'{}' is not a decimal amount", raw)))
}

/// Strictly positive amount.
pub fn parse_amount(field: &str, raw: &str) -> AutopayResult<Decimal> {
    let amount = parse_decimal(field, raw)?;
    if amount <= Decimal::ZERO {
        return Err(AutopayError::validation(field, "must be greater than zero"));
    }
    Ok(amount)
}

pub fn parse_non_negative(field: &str, raw: &str) -> AutopayResult<Decimal> {
    let amount = parse_decimal(field, raw)?;
    if amount < Decimal::ZERO {
        return Err(AutopayError::validation(field, "must not be negative"));
    }
    Ok(amount)
}

pub fn parse_address(field: &str, raw: &str) -> AutopayResult<Address> {
    let raw = require_non_empty(field, raw)?;
    if !raw.starts_with("0x") || raw.len() != 42 {
        return Err(AutopayError::validation(field, format!("'{}' is not a 20-byte hex address", raw)));
    }
    Address::from_str(raw).map_err(|e| AutopayError::validation(field, format!("'{}': {}", raw, e)))
}

pub fn parse_chain(field: &str, raw: &str) -> AutopayResult<Chain> {
    raw.parse().map_err(|e: String| AutopayError::validation(field, e))
}

pub fn parse_cadence(field: &str, raw: &str) -> AutopayResult<Cadence> {
    raw.parse().map_err(|e: String| AutopayError::validation(field, e))
}
