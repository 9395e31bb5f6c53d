//! Step-by-step route execution against the chain adapter

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use super::step_transaction;
use crate::chain::ChainAdapter;
use crate::errors::AutopayError;
use crate::routing::RoutePlanner;
use crate::storage::SubscriptionStore;
use crate::types::RouteStep;

/// How far a run over a step list got.
#[derive(Debug)]
pub enum StepsOutcome {
    /// Every step settled; carries the final output amount.
    Completed(Decimal),
    /// The subscription was deactivated; `next_index` was never taken.
    Cancelled { next_index: usize },
    Failed {
        index: usize,
        running_amount: Decimal,
        error: AutopayError,
    },
}

pub struct RouteExecutionEngine {
    chain: Arc<dyn ChainAdapter>,
    planner: Arc<RoutePlanner>,
    store: Arc<dyn SubscriptionStore>,
    slippage_tolerance: Decimal,
}

impl RouteExecutionEngine {
    pub fn new(
        chain: Arc<dyn ChainAdapter>,
        planner: Arc<RoutePlanner>,
        store: Arc<dyn SubscriptionStore>,
        slippage_tolerance: Decimal,
    ) -> Self {
        Self {
            chain,
            planner,
            store,
            slippage_tolerance,
        }
    }

    /// Runs `steps[start..]`, feeding each step's fresh output into the next.
    /// Settled steps are appended to `settled` as they land and are never
    /// rolled back.
    pub async fn run_steps(
        &self,
        subscription_id: &str,
        payer: Address,
        steps: &[RouteStep],
        start: usize,
        mut running_amount: Decimal,
        settled: &mut Vec<RouteStep>,
        now: DateTime<Utc>,
    ) -> StepsOutcome {
        for (index, planned) in steps.iter().enumerate().skip(start) {
            match self.store.get(subscription_id).await {
                Ok(current) if !current.is_active => {
                    warn!(subscription_id, step = index, "Subscription deactivated mid-execution, stopping");
                    return StepsOutcome::Cancelled { next_index: index };
                }
                Ok(_) => {}
                Err(error) => {
                    return StepsOutcome::Failed { index, running_amount, error };
                }
            }

            let step = match self.planner.requote_step(planned, running_amount).await {
                Ok(step) => step,
                Err(error) => return StepsOutcome::Failed { index, running_amount, error },
            };

            let tx = match step_transaction(&step, payer, self.slippage_tolerance, now) {
                Ok(tx) => tx,
                Err(error) => return StepsOutcome::Failed { index, running_amount, error },
            };

            match self.chain.simulate(&tx).await {
                Ok(outcome) => {
                    info!(
                        subscription_id,
                        step = %step.label(),
                        amount_out = %step.amount_out(),
                        tx_hash = %outcome.tx_hash,
                        "Step settled"
                    );
                    running_amount = step.amount_out();
                    settled.push(step);
                }
                Err(error) => {
                    warn!(subscription_id, step = %step.label(), "Step failed: {}", error);
                    return StepsOutcome::Failed { index, running_amount, error };
                }
            }
        }
        StepsOutcome::Completed(running_amount)
    }
}
