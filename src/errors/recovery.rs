//! Error recovery strategies

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use super::AutopayError;
use crate::network::backoff_delay;

/// What the orchestrator does next after a failed step or phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Try the next untried fallback route in this attempt.
    SwitchFallback,
    /// End the attempt and retry the run after `delay`.
    RetryLater { delay: Duration },
    /// Terminal for this scheduled run.
    Abort,
}

pub struct ErrorRecovery {
    pub error_counts: Arc<RwLock<HashMap<&'static str, u32>>>,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl ErrorRecovery {
    pub fn new(base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            error_counts: Arc::new(RwLock::new(HashMap::new())),
            base_backoff,
            max_backoff,
        }
    }

    /// `attempt` is 1-based: the attempt that just failed.
    pub async fn handle_error(&self, error: &AutopayError, attempt: u32) -> RecoveryAction {
        let error_type = classify_error(error);
        *self.error_counts.write().await.entry(error_type).or_insert(0) += 1;

        let action = match error {
            AutopayError::SimulationFailure { .. } | AutopayError::RouteUnavailable { .. } => {
                RecoveryAction::SwitchFallback
            }
            AutopayError::ChainUnavailable { .. } | AutopayError::InsufficientGas { .. } => {
                RecoveryAction::RetryLater {
                    delay: backoff_delay(attempt, self.base_backoff, self.max_backoff),
                }
            }
            AutopayError::Validation { .. }
            | AutopayError::RiskBlocked { .. }
            | AutopayError::NotFound { .. }
            | AutopayError::Store { .. } => RecoveryAction::Abort,
        };
        debug!(error_type, attempt, ?action, "Recovery decision");
        action
    }

    pub async fn snapshot(&self) -> HashMap<&'static str, u32> {
        self.error_counts.read().await.clone()
    }
}

fn classify_error(error: &AutopayError) -> &'static str {
    match error {
        AutopayError::Validation { .. } => "validation",
        AutopayError::ChainUnavailable { .. } => "chain_unavailable",
        AutopayError::InsufficientGas { .. } => "insufficient_gas",
        AutopayError::RouteUnavailable { .. } => "route_unavailable",
        AutopayError::RiskBlocked { .. } => "risk_blocked",
        AutopayError::SimulationFailure { .. } => "simulation_failure",
        AutopayError::NotFound { .. } => "not_found",
        AutopayError::Store { .. } => "store",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chain;

    #[tokio::test]
    async fn reverts_switch_fallback_and_outages_back_off() {
        let recovery = ErrorRecovery::new(Duration::from_secs(60), Duration::from_secs(600));
        let revert = AutopayError::SimulationFailure {
            chain: Chain::Base,
            step: "swap".to_string(),
            reason: "execution reverted".to_string(),
        };
        assert_eq!(recovery.handle_error(&revert, 1).await, RecoveryAction::SwitchFallback);

        let outage = AutopayError::ChainUnavailable {
            chain: Chain::Base,
            operation: "simulate".to_string(),
            source: None,
        };
        assert_eq!(
            recovery.handle_error(&outage, 2).await,
            RecoveryAction::RetryLater { delay: Duration::from_secs(120) }
        );

        let counts = recovery.snapshot().await;
        assert_eq!(counts.get("simulation_failure"), Some(&1));
        assert_eq!(counts.get("chain_unavailable"), Some(&1));
    }
}
