//! Risk rules, applied in a fixed order; no rule ever lowers the level

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashSet;
use crate::config::{
    CONFIDENCE_DEGRADED_CEILING, CONFIDENCE_DEGRADED_FLOOR, CONFIDENCE_LIVE, CONFIDENCE_LIVE_FLOOR,
    HIGH_VALUE_THRESHOLD,
};
use crate::types::{Chain, RiskAssessment, RiskLevel};

pub const FLAG_HIGH_VALUE: &str = "High value transaction";
pub const FLAG_SCAM_PATTERN: &str = "Suspicious receiver address pattern";
pub const FLAG_SECURITY_PROVIDER: &str = "Receiver flagged by security providers";
pub const FLAG_NOT_CONTRACT: &str = "Token address is not a deployed contract";
pub const FLAG_UNVERIFIABLE: &str = "Token contract could not be verified";
pub const FLAG_UNKNOWN_TOKEN: &str = "Unknown or unverified token";
pub const FLAG_RECEIVER_CONTRACT: &str = "Receiver is a contract";

/// Known scam shapes on the lower-cased `0x` address.
pub fn matches_scam_pattern(address: &str) -> bool {
    let address = address.trim().to_ascii_lowercase();
    let digits = address.strip_prefix("0x").unwrap_or(&address);
    let all_identical = digits
        .chars()
        .next()
        .map(|first| !digits.is_empty() && digits.chars().all(|c| c == first))
        .unwrap_or(false);

    address.starts_with("0x000")
        || address.starts_with("0xdead")
        || address.starts_with("0x1111")
        || all_identical
        || digits.contains("123456789")
}

/// External reputation signal for receivers.
#[async_trait]
pub trait RiskSignals: Send + Sync {
    async fn is_flagged(&self, chain: Chain, address: &str) -> bool;
}

#[derive(Debug, Default, Clone)]
pub struct StaticBlocklist {
    addresses: HashSet<String>,
}

impl StaticBlocklist {
    pub fn new(addresses: HashSet<String>) -> Self {
        Self {
            addresses: addresses.into_iter().map(|a| a.to_ascii_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl RiskSignals for StaticBlocklist {
    async fn is_flagged(&self, _chain: Chain, address: &str) -> bool {
        self.addresses.contains(&address.to_ascii_lowercase())
    }
}

/// Chain facts behind a scan. `None` means the fact could not be fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainFacts {
    pub native_token: bool,
    pub token_is_contract: Option<bool>,
    pub token_metadata_resolved: Option<bool>,
    pub receiver_is_contract: Option<bool>,
}

impl ChainFacts {
    pub fn degraded_checks(&self) -> usize {
        [
            self.token_is_contract.is_none(),
            self.token_metadata_resolved.is_none(),
            self.receiver_is_contract.is_none(),
        ]
        .iter()
        .filter(|missing| **missing)
        .count()
    }

    /// Unavailable facts replaced by their harmless outcome.
    pub fn assume_benign(&self) -> Self {
        Self {
            native_token: self.native_token,
            token_is_contract: Some(self.token_is_contract.unwrap_or(true)),
            token_metadata_resolved: Some(self.token_metadata_resolved.unwrap_or(true)),
            receiver_is_contract: Some(self.receiver_is_contract.unwrap_or(false)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Findings {
    pub level: RiskLevel,
    pub flags: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Findings {
    fn new() -> Self {
        Self {
            level: RiskLevel::Low,
            flags: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    fn raise(&mut self, level: RiskLevel, flag: &str, recommendation: &str) {
        self.level = self.level.max(level);
        self.flags.push(flag.to_string());
        self.recommendations.push(recommendation.to_string());
    }
}

pub fn evaluate(receiver: &str, amount: Decimal, flagged_by_signals: bool, facts: &ChainFacts) -> Findings {
    let mut findings = Findings::new();

    if amount > HIGH_VALUE_THRESHOLD {
        findings.raise(
            RiskLevel::Medium,
            FLAG_HIGH_VALUE,
            "Consider splitting into smaller transactions",
        );
    }

    if matches_scam_pattern(receiver) {
        findings.raise(
            RiskLevel::High,
            FLAG_SCAM_PATTERN,
            "Reject this transfer: the receiver matches a known scam pattern",
        );
    }

    if flagged_by_signals {
        findings.raise(
            RiskLevel::High,
            FLAG_SECURITY_PROVIDER,
            "Do not proceed: the receiver is on a blocklist",
        );
    }

    if !facts.native_token {
        match facts.token_is_contract {
            Some(true) => {}
            Some(false) => findings.raise(
                RiskLevel::High,
                FLAG_NOT_CONTRACT,
                "Double-check the token address; no contract is deployed there",
            ),
            None => findings.raise(
                RiskLevel::High,
                FLAG_UNVERIFIABLE,
                "Retry once the chain is reachable",
            ),
        }

        if facts.token_metadata_resolved != Some(true) {
            findings.raise(
                RiskLevel::Medium,
                FLAG_UNKNOWN_TOKEN,
                "Verify the token contract on a block explorer",
            );
        }
    }

    if facts.receiver_is_contract == Some(true) {
        findings.flags.push(FLAG_RECEIVER_CONTRACT.to_string());
        findings
            .recommendations
            .push("Confirm the receiving contract is audited and trusted".to_string());
    }

    findings
}

/// 0.95 when every check was live; otherwise 0.70 down to 0.50, lower the
/// more checks fell back.
pub fn confidence(facts: &ChainFacts) -> f64 {
    match facts.degraded_checks() {
        0 => CONFIDENCE_LIVE.clamp(CONFIDENCE_LIVE_FLOOR, 1.0),
        1 => CONFIDENCE_DEGRADED_CEILING,
        2 => (CONFIDENCE_DEGRADED_CEILING + CONFIDENCE_DEGRADED_FLOOR) / 2.0,
        _ => CONFIDENCE_DEGRADED_FLOOR,
    }
}

pub fn assess(receiver: &str, amount: Decimal, flagged_by_signals: bool, facts: &ChainFacts) -> RiskAssessment {
    let findings = evaluate(receiver, amount, flagged_by_signals, facts);
    let awaiting_chain_facts = findings.level == RiskLevel::High
        && facts.degraded_checks() > 0
        && evaluate(receiver, amount, flagged_by_signals, &facts.assume_benign()).level < RiskLevel::High;
    RiskAssessment {
        awaiting_chain_facts,
        risk_level: findings.level,
        flags: findings.flags,
        recommendations: findings.recommendations,
        confidence: confidence(facts),
        degraded: facts.degraded_checks() > 0,
    }
}
