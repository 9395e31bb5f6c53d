//! Route steps, plans and fallback alternatives

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::Chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Approve,
    Swap,
    Bridge,
    Transfer,
}

/// One atomic on-chain action. Serialized with a `type` tag so stored
/// execution history stays decodable when variants gain fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RouteStep {
    Approve {
        chain: Chain,
        token: String,
        spender: String,
        venue: String,
        amount_in: Decimal,
        amount_out: Decimal,
        gas_usd: Decimal,
    },
    Swap {
        chain: Chain,
        venue: String,
        token_in: String,
        token_out: String,
        amount_in: Decimal,
        amount_out: Decimal,
        gas_usd: Decimal,
    },
    Bridge {
        chain: Chain,
        to_chain: Chain,
        venue: String,
        token: String,
        amount_in: Decimal,
        amount_out: Decimal,
        gas_usd: Decimal,
    },
    Transfer {
        chain: Chain,
        token: String,
        to: String,
        amount_in: Decimal,
        amount_out: Decimal,
        gas_usd: Decimal,
    },
}

impl RouteStep {
    pub fn kind(&self) -> StepKind {
        match self {
            RouteStep::Approve { .. } => StepKind::Approve,
            RouteStep::Swap { .. } => StepKind::Swap,
            RouteStep::Bridge { .. } => StepKind::Bridge,
            RouteStep::Transfer { .. } => StepKind::Transfer,
        }
    }

    pub fn chain(&self) -> Chain {
        match self {
            RouteStep::Approve { chain, .. }
            | RouteStep::Swap { chain, .. }
            | RouteStep::Bridge { chain, .. }
            | RouteStep::Transfer { chain, .. } => *chain,
        }
    }

    pub fn venue(&self) -> Option<&str> {
        match self {
            RouteStep::Approve { venue, .. }
            | RouteStep::Swap { venue, .. }
            | RouteStep::Bridge { venue, .. } => Some(venue),
            RouteStep::Transfer { .. } => None,
        }
    }

    pub fn amount_in(&self) -> Decimal {
        match self {
            RouteStep::Approve { amount_in, .. }
            | RouteStep::Swap { amount_in, .. }
            | RouteStep::Bridge { amount_in, .. }
            | RouteStep::Transfer { amount_in, .. } => *amount_in,
        }
    }

    pub fn amount_out(&self) -> Decimal {
        match self {
            RouteStep::Approve { amount_out, .. }
            | RouteStep::Swap { amount_out, .. }
            | RouteStep::Bridge { amount_out, .. }
            | RouteStep::Transfer { amount_out, .. } => *amount_out,
        }
    }

    pub fn gas_usd(&self) -> Decimal {
        match self {
            RouteStep::Approve { gas_usd, .. }
            | RouteStep::Swap { gas_usd, .. }
            | RouteStep::Bridge { gas_usd, .. }
            | RouteStep::Transfer { gas_usd, .. } => *gas_usd,
        }
    }

    /// Same step with new amounts; used when a step is re-quoted.
    pub fn with_amounts(&self, new_in: Decimal, new_out: Decimal) -> RouteStep {
        let mut step = self.clone();
        match &mut step {
            RouteStep::Approve { amount_in, amount_out, .. }
            | RouteStep::Swap { amount_in, amount_out, .. }
            | RouteStep::Bridge { amount_in, amount_out, .. }
            | RouteStep::Transfer { amount_in, amount_out, .. } => {
                *amount_in = new_in;
                *amount_out = new_out;
            }
        }
        step
    }

    pub fn with_gas_usd(&self, new_gas: Decimal) -> RouteStep {
        let mut step = self.clone();
        match &mut step {
            RouteStep::Approve { gas_usd, .. }
            | RouteStep::Swap { gas_usd, .. }
            | RouteStep::Bridge { gas_usd, .. }
            | RouteStep::Transfer { gas_usd, .. } => *gas_usd = new_gas,
        }
        step
    }

    pub fn label(&self) -> String {
        match self.venue() {
            Some(venue) => format!("{:?} via {} on {}", self.kind(), venue, self.chain()),
            None => format!("{:?} on {}", self.kind(), self.chain()),
        }
    }
}

/// Ranked alternative to the primary route, computed over the original input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRoute {
    pub via: String,
    #[serde(rename = "estOut")]
    pub expected_output: Decimal,
    pub steps: Vec<RouteStep>,
    #[serde(rename = "gasEstimateUSD")]
    pub gas_estimate_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub steps: Vec<RouteStep>,
    /// Sorted by descending expected output.
    pub fallbacks: Vec<FallbackRoute>,
    #[serde(rename = "gasEstimateUSD")]
    pub gas_estimate_usd: Decimal,
}

impl RoutePlan {
    pub fn expected_output(&self) -> Decimal {
        self.steps
            .last()
            .map(|s| s.amount_out())
            .unwrap_or(self.amount_in)
    }

    pub fn primary_venue(&self) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| matches!(s.kind(), StepKind::Swap | StepKind::Bridge))
            .and_then(|s| s.venue())
    }
}

/// Checks the chaining invariant: every step consumes exactly what the
/// previous one produced and no step outputs more than it received.
pub fn steps_are_chained(steps: &[RouteStep]) -> bool {
    steps.iter().all(|s| s.amount_out() <= s.amount_in())
        && steps
            .windows(2)
            .all(|pair| pair[0].amount_out() == pair[1].amount_in())
}
