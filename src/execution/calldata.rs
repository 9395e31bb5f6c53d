//! Calldata for route steps: ERC-20 approve/transfer, router swaps and bridge deposits

use alloy::primitives::{Address, Bytes, U256, hex, keccak256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use crate::chain::TxRequest;
use crate::errors::{AutopayError, AutopayResult};
use crate::routing::{gas_units, venue_router};
use crate::types::{BundleTx, Chain, RouteStep, TokenInfo, resolve_token};
use crate::utils::to_base_units;

const DEADLINE_SECS: i64 = 1200;

fn selector(signature: &str) -> Vec<u8> {
    keccak256(signature)[..4].to_vec()
}

fn push_address(encoded: &mut Vec<u8>, address: Address) {
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(address.as_slice());
}

pub fn encode_approve(spender: Address, amount: U256) -> Vec<u8> {
    let mut encoded = selector("approve(address,uint256)");
    push_address(&mut encoded, spender);
    encoded.extend_from_slice(&amount.to_be_bytes::<32>());
    encoded
}

pub fn encode_transfer(to: Address, amount: U256) -> Vec<u8> {
    let mut encoded = selector("transfer(address,uint256)");
    push_address(&mut encoded, to);
    encoded.extend_from_slice(&amount.to_be_bytes::<32>());
    encoded
}

pub fn encode_swap(amount_in: U256, amount_out_min: U256, path: &[Address], to: Address, deadline: U256) -> Vec<u8> {
    let mut encoded = selector("swapExactTokensForTokens(uint256,uint256,address[],address,uint256)");

    encoded.extend_from_slice(&amount_in.to_be_bytes::<32>());
    encoded.extend_from_slice(&amount_out_min.to_be_bytes::<32>());
    // Offset of the dynamic path array: five head words.
    encoded.extend_from_slice(&U256::from(160).to_be_bytes::<32>());
    push_address(&mut encoded, to);
    encoded.extend_from_slice(&deadline.to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(path.len()).to_be_bytes::<32>());

    for addr in path {
        push_address(&mut encoded, *addr);
    }
    encoded
}

pub fn encode_bridge_deposit(token: Address, amount: U256, destination_chain_id: u64, recipient: Address) -> Vec<u8> {
    let mut encoded = selector("deposit(address,uint256,uint256,address)");
    push_address(&mut encoded, token);
    encoded.extend_from_slice(&amount.to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(destination_chain_id).to_be_bytes::<32>());
    push_address(&mut encoded, recipient);
    encoded
}

fn token(chain: Chain, symbol_or_address: &str) -> AutopayResult<TokenInfo> {
    resolve_token(chain, symbol_or_address).ok_or_else(|| {
        AutopayError::validation("token", format!("'{}' is not a known token on {}", symbol_or_address, chain))
    })
}

fn parse_address(field: &str, raw: &str) -> AutopayResult<Address> {
    Address::from_str(raw.trim())
        .map_err(|e| AutopayError::validation(field, format!("invalid address '{}': {}", raw, e)))
}

fn min_out(amount_out: Decimal, slippage_tolerance: Decimal) -> Decimal {
    amount_out * (dec!(1) - slippage_tolerance)
}

/// Unsigned transaction for one step, sent from `payer`.
pub fn step_transaction(
    step: &RouteStep,
    payer: Address,
    slippage_tolerance: Decimal,
    now: DateTime<Utc>,
) -> AutopayResult<TxRequest> {
    let deadline = U256::from((now.timestamp() + DEADLINE_SECS).max(0) as u64);

    let (to, value, data) = match step {
        RouteStep::Approve { chain, token: symbol, spender, amount_in, .. } => {
            let info = token(*chain, symbol)?;
            let spender = parse_address("spender", spender)?;
            let amount = to_base_units(*amount_in, info.decimals)?;
            (info.address, U256::ZERO, encode_approve(spender, amount))
        }
        RouteStep::Swap { chain, venue, token_in, token_out, amount_in, amount_out, .. } => {
            let input = token(*chain, token_in)?;
            let output = token(*chain, token_out)?;
            let amount = to_base_units(*amount_in, input.decimals)?;
            let minimum = to_base_units(min_out(*amount_out, slippage_tolerance), output.decimals)?;
            let value = if input.native { amount } else { U256::ZERO };
            let data = encode_swap(amount, minimum, &[input.address, output.address], payer, deadline);
            (venue_router(venue), value, data)
        }
        RouteStep::Bridge { chain, to_chain, venue, token: symbol, amount_in, .. } => {
            let info = token(*chain, symbol)?;
            let amount = to_base_units(*amount_in, info.decimals)?;
            let value = if info.native { amount } else { U256::ZERO };
            let data = encode_bridge_deposit(info.address, amount, to_chain.chain_id(), payer);
            (venue_router(venue), value, data)
        }
        RouteStep::Transfer { chain, token: symbol, to, amount_in, .. } => {
            let info = token(*chain, symbol)?;
            let receiver = parse_address("receiverAddress", to)?;
            let amount = to_base_units(*amount_in, info.decimals)?;
            if info.native {
                (receiver, amount, Vec::new())
            } else {
                (info.address, U256::ZERO, encode_transfer(receiver, amount))
            }
        }
    };

    Ok(TxRequest {
        chain: step.chain(),
        from: payer,
        to,
        value,
        data: Bytes::from(data),
        gas_limit: gas_units(step.kind()),
        label: step.label(),
    })
}

/// One `{chain, tx}` entry per step, calldata hex encoded.
pub fn bundle(
    steps: &[RouteStep],
    payer: Address,
    slippage_tolerance: Decimal,
    now: DateTime<Utc>,
) -> AutopayResult<Vec<BundleTx>> {
    steps
        .iter()
        .map(|step| {
            let tx = step_transaction(step, payer, slippage_tolerance, now)?;
            Ok(BundleTx {
                chain: tx.chain,
                tx: hex::encode_prefixed(&tx.data),
            })
        })
        .collect()
}
