//! Risk assessment types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered so that `max` picks the more severe level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub flags: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    /// True when at least one chain fact could not be fetched.
    #[serde(default)]
    pub degraded: bool,
    /// True when the level is `high` only because some chain fact could not
    /// be fetched; live facts may still clear it.
    #[serde(default)]
    pub awaiting_chain_facts: bool,
}

impl RiskAssessment {
    pub fn is_blocking(&self) -> bool {
        self.risk_level == RiskLevel::High
    }
}
