//! Execution record types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use super::RouteStep;

pub const EXECUTION_RECORD_SCHEMA_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    RiskBlocked,
    Cancelled,
    RouteUnavailable,
    RetriesExhausted,
    InvalidSubscription,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::RiskBlocked => "risk-blocked",
            FailureReason::Cancelled => "cancelled",
            FailureReason::RouteUnavailable => "route-unavailable",
            FailureReason::RetriesExhausted => "retries-exhausted",
            FailureReason::InvalidSubscription => "invalid-subscription",
        })
    }
}

/// Phases of one scheduled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionPhase {
    Scheduled,
    GasChecking,
    RiskScanning,
    Planning,
    Executing,
    Succeeded,
    FailedRetryable,
    FailedTerminal,
}

/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub schema_version: u16,
    pub id: String,
    pub subscription_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub output_amount: Option<Decimal>,
    #[serde(rename = "gasCostUSD")]
    pub gas_cost_usd: Decimal,
    pub steps: Vec<RouteStep>,
    pub fallback_used: bool,
    pub attempts: u32,
    pub retry_count: u32,
    pub failure_reason: Option<FailureReason>,
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Human-readable status line, surfaced verbatim by the dashboard.
    pub fn status_line(&self) -> String {
        match (&self.status, &self.failure_reason, &self.error) {
            (ExecutionStatus::Success, _, _) => format!(
                "success: delivered {} (gas ${:.4})",
                self.output_amount.unwrap_or_default(),
                self.gas_cost_usd
            ),
            (ExecutionStatus::Failed, Some(reason), Some(error)) => {
                format!("failed ({}): {} after {} attempt(s)", reason, error, self.attempts)
            }
            (ExecutionStatus::Failed, Some(reason), None) => {
                format!("failed ({}) after {} attempt(s)", reason, self.attempts)
            }
            (ExecutionStatus::Failed, None, error) => format!(
                "failed: {}",
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
