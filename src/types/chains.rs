//! Supported chains and the known token table

use alloy::primitives::{Address, address};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder address used in calldata when the moved asset is the chain's native coin.
pub const NATIVE_TOKEN_SENTINEL: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Base,
    Arbitrum,
    Polygon,
    Optimism,
}

impl Chain {
    pub const ALL: [Chain; 5] = [
        Chain::Ethereum,
        Chain::Base,
        Chain::Arbitrum,
        Chain::Polygon,
        Chain::Optimism,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Base => "base",
            Chain::Arbitrum => "arbitrum",
            Chain::Polygon => "polygon",
            Chain::Optimism => "optimism",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Base => 8453,
            Chain::Arbitrum => 42161,
            Chain::Polygon => 137,
            Chain::Optimism => 10,
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Polygon => "POL",
            _ => "ETH",
        }
    }

    /// Simulated native-coin price. There is no oracle behind this table.
    pub fn native_usd_price(&self) -> Decimal {
        match self {
            Chain::Polygon => dec!(0.8),
            _ => dec!(2400),
        }
    }

    /// Public RPC endpoint used when no `RPC_URL_<CHAIN>` override is set.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://eth.llamarpc.com",
            Chain::Base => "https://mainnet.base.org",
            Chain::Arbitrum => "https://arb1.arbitrum.io/rpc",
            Chain::Polygon => "https://polygon-rpc.com",
            Chain::Optimism => "https://mainnet.optimism.io",
        }
    }

    pub fn is_native(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(self.native_symbol())
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "mainnet" => Ok(Chain::Ethereum),
            "base" => Ok(Chain::Base),
            "arbitrum" => Ok(Chain::Arbitrum),
            "polygon" => Ok(Chain::Polygon),
            "optimism" => Ok(Chain::Optimism),
            other => Err(format!("unsupported chain '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
    pub decimals: u32,
    pub native: bool,
}

// (chain, symbol, address, decimals)
const KNOWN_TOKENS: &[(Chain, &str, Address, u32)] = &[
    (Chain::Ethereum, "USDC", address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6),
    (Chain::Ethereum, "USDT", address!("dAC17F958D2ee523a2206206994597C13D831ec7"), 6),
    (Chain::Ethereum, "WETH", address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), 18),
    (Chain::Ethereum, "WBTC", address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"), 8),
    (Chain::Base, "USDC", address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"), 6),
    (Chain::Base, "WETH", address!("4200000000000000000000000000000000000006"), 18),
    (Chain::Arbitrum, "USDC", address!("af88d065e77c8cC2239327C5EDb3A432268e5831"), 6),
    (Chain::Arbitrum, "USDT", address!("Fd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"), 6),
    (Chain::Arbitrum, "WETH", address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"), 18),
    (Chain::Polygon, "USDC", address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174"), 6),
    (Chain::Polygon, "USDT", address!("c2132D05D31c914a87C6611C10748AEb04B58e8F"), 6),
    (Chain::Polygon, "WETH", address!("7ceB23fD6bC0adD59E62ac25578270cFf1b9f619"), 18),
    (Chain::Optimism, "USDC", address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85"), 6),
    (Chain::Optimism, "USDT", address!("94b008aA00579c1307B0EF2c499aD98a8ce58e58"), 6),
    (Chain::Optimism, "WETH", address!("4200000000000000000000000000000000000006"), 18),
];

pub fn known_tokens(chain: Chain) -> impl Iterator<Item = TokenInfo> {
    KNOWN_TOKENS
        .iter()
        .filter(move |(c, _, _, _)| *c == chain)
        .map(|(_, symbol, address, decimals)| TokenInfo {
            symbol: symbol.to_string(),
            address: *address,
            decimals: *decimals,
            native: false,
        })
}

/// Resolves a token given either as a symbol from the known table, the
/// chain's native symbol, or a raw 20-byte hex address.
pub fn resolve_token(chain: Chain, token: &str) -> Option<TokenInfo> {
    let token = token.trim();
    if chain.is_native(token) {
        return Some(TokenInfo {
            symbol: chain.native_symbol().to_string(),
            address: NATIVE_TOKEN_SENTINEL,
            decimals: 18,
            native: true,
        });
    }

    if token.starts_with("0x") {
        let address = Address::from_str(token).ok()?;
        let known = KNOWN_TOKENS
            .iter()
            .find(|(c, _, a, _)| *c == chain && *a == address);
        return Some(match known {
            Some((_, symbol, address, decimals)) => TokenInfo {
                symbol: symbol.to_string(),
                address: *address,
                decimals: *decimals,
                native: false,
            },
            None => TokenInfo {
                symbol: format!("{:#x}", address),
                address,
                decimals: 18,
                native: false,
            },
        });
    }

    KNOWN_TOKENS
        .iter()
        .find(|(c, symbol, _, _)| *c == chain && symbol.eq_ignore_ascii_case(token))
        .map(|(_, symbol, address, decimals)| TokenInfo {
            symbol: symbol.to_string(),
            address: *address,
            decimals: *decimals,
            native: false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chain_names_case_insensitively() {
        assert_eq!("Base".parse::<Chain>().unwrap(), Chain::Base);
        assert_eq!("mainnet".parse::<Chain>().unwrap(), Chain::Ethereum);
        assert!("solana".parse::<Chain>().is_err());
    }

    #[test]
    fn resolves_symbols_addresses_and_native() {
        let usdc = resolve_token(Chain::Base, "usdc").unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.symbol, "USDC");

        let by_address = resolve_token(Chain::Base, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap();
        assert_eq!(by_address.symbol, "USDC");

        let eth = resolve_token(Chain::Arbitrum, "ETH").unwrap();
        assert!(eth.native);
        assert_eq!(eth.address, NATIVE_TOKEN_SENTINEL);

        assert!(resolve_token(Chain::Base, "USDT").is_none());
    }
}
