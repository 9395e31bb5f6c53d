//! Custom error types for the router

use crate::types::{Chain, RiskLevel};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutopayError {
    #[error("Validation failed: {field} - {message}")]
    Validation {
        field: String,
        message: String,
    },

    #[error("Chain unavailable: {chain} during {operation}")]
    ChainUnavailable {
        chain: Chain,
        operation: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Insufficient gas on {chain}: balance ${balance_usd} below required ${required_usd}")]
    InsufficientGas {
        chain: Chain,
        balance_usd: String,
        required_usd: String,
    },

    #[error("No route available: {reason}")]
    RouteUnavailable {
        reason: String,
    },

    #[error("Transfer blocked by risk scan ({level}): {}", flags.join("; "))]
    RiskBlocked {
        level: RiskLevel,
        flags: Vec<String>,
    },

    #[error("Simulation failed on {chain} at {step}: {reason}")]
    SimulationFailure {
        chain: Chain,
        step: String,
        reason: String,
    },

    #[error("Subscription not found: {id}")]
    NotFound {
        id: String,
    },

    #[error("Store error: {context}")]
    Store {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type AutopayResult<T> = Result<T, AutopayError>;

impl AutopayError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AutopayError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn chain_unavailable(
        chain: Chain,
        operation: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        AutopayError::ChainUnavailable {
            chain,
            operation: operation.into(),
            source: Some(source.into()),
        }
    }

    /// Transient failures the orchestrator may retry within the attempt bound.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutopayError::ChainUnavailable { .. }
                | AutopayError::SimulationFailure { .. }
                | AutopayError::InsufficientGas { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_risk_blocks_are_never_retried() {
        assert!(!AutopayError::validation("amount", "must be positive").is_retryable());
        let blocked = AutopayError::RiskBlocked {
            level: RiskLevel::High,
            flags: vec!["Suspicious receiver address pattern".to_string()],
        };
        assert!(!blocked.is_retryable());
        assert_eq!(
            blocked.to_string(),
            "Transfer blocked by risk scan (high): Suspicious receiver address pattern"
        );
    }

    #[test]
    fn chain_unavailable_keeps_its_source() {
        let err = AutopayError::chain_unavailable(
            Chain::Base,
            "native_balance",
            anyhow::anyhow!("connection reset"),
        );
        assert!(err.is_retryable());
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("connection reset"));
    }
}
