//! Per-subscription execution state machine
//!
//! One scheduled run moves through gas checking, risk scanning, planning and
//! step execution. Each phase is strictly sequential; a failed phase ends the
//! attempt as retryable or terminal and the outcome is written back to the
//! store atomically.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use super::{RouteExecutionEngine, StepsOutcome};
use crate::chain::ChainAdapter;
use crate::config::Config;
use crate::errors::{AutopayError, AutopayResult, ErrorRecovery, RecoveryAction};
use crate::gas::GasChecker;
use crate::network::backoff_delay;
use crate::risk::{RiskScanner, RiskSignals};
use crate::routing::{QuoteSource, RoutePlanner, select_fallback};
use crate::storage::{ExecutionJournal, SubscriptionStore};
use crate::types::{
    Chain, EXECUTION_RECORD_SCHEMA_VERSION, ExecutionPhase, ExecutionRecord, ExecutionStatus, FailureReason,
    PendingRun, ResumePoint, RouteStep, StepKind, Subscription, resolve_token,
};
use crate::validation::parse_address;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_attempts: u32,
    pub max_consecutive_failures: u32,
    pub retry_backoff: Duration,
    pub max_retry_backoff: Duration,
    pub slippage_tolerance: Decimal,
    pub gas_funding_chain: Chain,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_execution_attempts,
            max_consecutive_failures: config.max_consecutive_failures,
            retry_backoff: Duration::from_secs(config.retry_backoff_secs),
            max_retry_backoff: Duration::from_secs(config.max_retry_backoff_secs),
            slippage_tolerance: config.slippage_tolerance(),
            gas_funding_chain: config.gas_funding_chain,
        }
    }
}

/// How one attempt at a scheduled run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Succeeded(ExecutionRecord),
    /// Stored on the subscription and retried after `retry_not_before`.
    FailedRetryable(PendingRun),
    FailedTerminal(ExecutionRecord),
}

impl RunOutcome {
    pub fn record(&self) -> Option<&ExecutionRecord> {
        match self {
            RunOutcome::Succeeded(record) | RunOutcome::FailedTerminal(record) => Some(record),
            RunOutcome::FailedRetryable(_) => None,
        }
    }

    pub fn phase(&self) -> ExecutionPhase {
        match self {
            RunOutcome::Succeeded(_) => ExecutionPhase::Succeeded,
            RunOutcome::FailedRetryable(_) => ExecutionPhase::FailedRetryable,
            RunOutcome::FailedTerminal(_) => ExecutionPhase::FailedTerminal,
        }
    }
}

enum AttemptResult {
    Delivered(Decimal),
    Retry {
        error: AutopayError,
        delay: Duration,
        resume: Option<ResumePoint>,
    },
    Terminal {
        reason: FailureReason,
        error: String,
    },
}

/// Mutable bookkeeping for the attempt in progress.
struct RunState {
    attempt: u32,
    scheduled_for: DateTime<Utc>,
    settled: Vec<RouteStep>,
    fallback_used: bool,
}

impl RunState {
    fn for_subscription(subscription: &Subscription) -> Self {
        let pending = subscription.pending.as_ref();
        Self {
            attempt: subscription.attempts_so_far() + 1,
            scheduled_for: subscription.scheduled_for(),
            settled: pending.map(|p| p.settled.clone()).unwrap_or_default(),
            fallback_used: pending.map(|p| p.fallback_used).unwrap_or(false),
        }
    }

    fn record(
        &self,
        subscription_id: &str,
        now: DateTime<Utc>,
        output_amount: Option<Decimal>,
        failure: Option<(FailureReason, String)>,
    ) -> ExecutionRecord {
        let (status, failure_reason, error) = match failure {
            None => (ExecutionStatus::Success, None, None),
            Some((reason, error)) => (ExecutionStatus::Failed, Some(reason), Some(error)),
        };
        ExecutionRecord {
            schema_version: EXECUTION_RECORD_SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            subscription_id: subscription_id.to_string(),
            scheduled_for: self.scheduled_for,
            timestamp: now,
            status,
            output_amount,
            gas_cost_usd: self.settled.iter().map(|s| s.gas_usd()).sum(),
            steps: self.settled.clone(),
            fallback_used: self.fallback_used,
            attempts: self.attempt,
            retry_count: self.attempt.saturating_sub(1),
            failure_reason,
            error,
        }
    }
}

/// Addresses and token reference checked once per attempt.
struct Parties {
    payer: Address,
    receiver: Address,
    token: String,
    token_address: Address,
}

pub struct PaymentOrchestrator {
    store: Arc<dyn SubscriptionStore>,
    gas: GasChecker,
    risk: RiskScanner,
    planner: Arc<RoutePlanner>,
    engine: RouteExecutionEngine,
    recovery: ErrorRecovery,
    settings: OrchestratorSettings,
    journal: Option<ExecutionJournal>,
}

impl PaymentOrchestrator {
    pub fn new(
        chain: Arc<dyn ChainAdapter>,
        venues: Arc<dyn QuoteSource>,
        signals: Arc<dyn RiskSignals>,
        store: Arc<dyn SubscriptionStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        let planner = Arc::new(RoutePlanner::new(chain.clone(), venues.clone(), settings.slippage_tolerance));
        Self {
            gas: GasChecker::new(chain.clone(), venues, settings.gas_funding_chain),
            risk: RiskScanner::new(chain.clone(), signals),
            engine: RouteExecutionEngine::new(chain, planner.clone(), store.clone(), settings.slippage_tolerance),
            recovery: ErrorRecovery::new(settings.retry_backoff, settings.max_retry_backoff),
            planner,
            store,
            settings,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: ExecutionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn recovery(&self) -> &ErrorRecovery {
        &self.recovery
    }

    /// Runs one attempt for a subscription if it is still due, then persists
    /// the outcome. Returns `None` when the subscription was not due.
    pub async fn run(&self, subscription_id: &str, now: DateTime<Utc>) -> AutopayResult<Option<RunOutcome>> {
        let subscription = self.store.get(subscription_id).await?;
        if !subscription.is_due(now) {
            debug!(subscription_id, "Not due, skipping");
            return Ok(None);
        }

        let outcome = self.execute(&subscription, now).await;
        self.apply(&subscription, &outcome, now).await?;
        Ok(Some(outcome))
    }

    /// One attempt at the subscription's current scheduled run. Does not
    /// touch the store except for the active-flag checks between steps.
    pub async fn execute(&self, subscription: &Subscription, now: DateTime<Utc>) -> RunOutcome {
        let mut state = RunState::for_subscription(subscription);
        info!(
            subscription_id = %subscription.id,
            attempt = state.attempt,
            scheduled_for = %state.scheduled_for,
            phase = ?ExecutionPhase::Scheduled,
            "Starting execution"
        );

        let result = self.attempt(subscription, &mut state, now).await;

        match result {
            AttemptResult::Delivered(output) => {
                let record = state.record(&subscription.id, now, Some(output), None);
                info!(
                    subscription_id = %subscription.id,
                    output = %output,
                    gas_usd = %record.gas_cost_usd.round_dp(4),
                    fallback_used = record.fallback_used,
                    "Payment delivered"
                );
                RunOutcome::Succeeded(record)
            }
            AttemptResult::Terminal { reason, error } => {
                warn!(subscription_id = %subscription.id, %reason, "Execution failed terminally: {}", error);
                RunOutcome::FailedTerminal(state.record(&subscription.id, now, None, Some((reason, error))))
            }
            AttemptResult::Retry { error, .. } if state.attempt >= self.settings.max_attempts => {
                warn!(
                    subscription_id = %subscription.id,
                    attempts = state.attempt,
                    "Attempts exhausted: {}",
                    error
                );
                RunOutcome::FailedTerminal(state.record(
                    &subscription.id,
                    now,
                    None,
                    Some((FailureReason::RetriesExhausted, error.to_string())),
                ))
            }
            AttemptResult::Retry { error, delay, resume } => {
                let backoff = chrono::Duration::from_std(delay)
                    .unwrap_or_else(|_| chrono::Duration::seconds(self.settings.max_retry_backoff.as_secs() as i64));
                info!(
                    subscription_id = %subscription.id,
                    attempt = state.attempt,
                    retry_in_secs = delay.as_secs(),
                    "Execution will be retried: {}",
                    error
                );
                RunOutcome::FailedRetryable(PendingRun {
                    scheduled_for: state.scheduled_for,
                    attempts: state.attempt,
                    retry_not_before: now + backoff,
                    fallback_used: state.fallback_used,
                    last_error: error.to_string(),
                    settled: state.settled,
                    resume,
                })
            }
        }
    }

    async fn attempt(&self, subscription: &Subscription, state: &mut RunState, now: DateTime<Utc>) -> AttemptResult {
        let parties = match check_parties(subscription) {
            Ok(parties) => parties,
            Err(e) => {
                return AttemptResult::Terminal {
                    reason: FailureReason::InvalidSubscription,
                    error: e.to_string(),
                };
            }
        };

        debug!(subscription_id = %subscription.id, phase = ?ExecutionPhase::GasChecking);
        if let Some(result) = self.gas_phase(subscription, &parties, state, now).await {
            return result;
        }

        debug!(subscription_id = %subscription.id, phase = ?ExecutionPhase::RiskScanning);
        if let Some(result) = self.risk_phase(subscription, &parties, state.attempt).await {
            return result;
        }

        debug!(subscription_id = %subscription.id, phase = ?ExecutionPhase::Planning);
        let resume = match subscription.pending.as_ref().and_then(|p| p.resume.clone()) {
            Some(resume) => {
                info!(
                    subscription_id = %subscription.id,
                    next_step = resume.next_index,
                    running_amount = %resume.running_amount,
                    "Resuming route after settled steps"
                );
                resume
            }
            None => match self
                .planner
                .plan(
                    subscription.from_chain,
                    subscription.to_chain,
                    &parties.token,
                    &parties.token,
                    subscription.amount,
                    &subscription.receiver_address,
                )
                .await
            {
                Ok(plan) => ResumePoint {
                    route: plan.steps.clone(),
                    running_amount: plan.amount_in,
                    next_index: 0,
                    plan,
                },
                Err(e) => return self.phase_failure(e, state.attempt).await,
            },
        };

        debug!(subscription_id = %subscription.id, phase = ?ExecutionPhase::Executing);
        self.execute_route(subscription, parties.payer, resume, state, now).await
    }

    async fn gas_phase(
        &self,
        subscription: &Subscription,
        parties: &Parties,
        state: &mut RunState,
        now: DateTime<Utc>,
    ) -> Option<AttemptResult> {
        let chain = subscription.from_chain;
        let estimate = match self
            .planner
            .estimate_gas_usd(chain, subscription.to_chain, &parties.token, &parties.token)
            .await
        {
            Ok(estimate) => estimate,
            Err(e) => return Some(self.retry_later(e, state.attempt, None)),
        };

        let plan = match self.gas.ensure(chain, parties.payer, estimate).await {
            Ok(plan) => plan,
            Err(e) => return Some(self.retry_later(e, state.attempt, None)),
        };
        if !plan.needed {
            return None;
        }

        let Some(steps) = plan.top_up_steps.clone() else {
            let error = AutopayError::InsufficientGas {
                chain,
                balance_usd: plan.current_balance_usd.round_dp(2).to_string(),
                required_usd: plan.required_usd.round_dp(2).to_string(),
            };
            return Some(self.retry_later(error, state.attempt, None));
        };

        info!(
            subscription_id = %subscription.id,
            %chain,
            deficit_usd = %plan.deficit_usd().round_dp(4),
            steps = steps.len(),
            "Executing gas top-up"
        );
        let start_amount = steps.first().map(|s| s.amount_in()).unwrap_or_default();
        match self
            .engine
            .run_steps(&subscription.id, parties.payer, &steps, 0, start_amount, &mut state.settled, now)
            .await
        {
            StepsOutcome::Completed(_) => None,
            StepsOutcome::Cancelled { next_index } => Some(cancelled(next_index)),
            StepsOutcome::Failed { error, .. } => Some(self.retry_later(error, state.attempt, None)),
        }
    }

    async fn risk_phase(&self, subscription: &Subscription, parties: &Parties, attempt: u32) -> Option<AttemptResult> {
        let assessment = match self
            .risk
            .scan(subscription.from_chain, parties.token_address, parties.receiver, subscription.amount)
            .await
        {
            Ok(assessment) => assessment,
            Err(e) => return Some(self.phase_failure(e, attempt).await),
        };

        if !assessment.is_blocking() {
            debug!(
                subscription_id = %subscription.id,
                level = %assessment.risk_level,
                flags = assessment.flags.len(),
                "Risk scan passed"
            );
            return None;
        }

        if assessment.awaiting_chain_facts {
            let error = AutopayError::ChainUnavailable {
                chain: subscription.from_chain,
                operation: "risk scan".to_string(),
                source: None,
            };
            return Some(self.retry_later(error, attempt, None));
        }

        let error = AutopayError::RiskBlocked {
            level: assessment.risk_level,
            flags: assessment.flags,
        };
        Some(AttemptResult::Terminal {
            reason: FailureReason::RiskBlocked,
            error: error.to_string(),
        })
    }

    /// Runs the route from its resume point, switching to fallbacks on step
    /// failures until funds have left the source chain's first venue.
    async fn execute_route(
        &self,
        subscription: &Subscription,
        payer: Address,
        resume: ResumePoint,
        state: &mut RunState,
        now: DateTime<Utc>,
    ) -> AttemptResult {
        let ResumePoint { plan, mut route, next_index, mut running_amount } = resume;
        let mut start = next_index;
        let mut tried: HashSet<String> = route_venue(&route).into_iter().collect();

        loop {
            let outcome = self
                .engine
                .run_steps(&subscription.id, payer, &route, start, running_amount, &mut state.settled, now)
                .await;

            let (index, amount_at_failure, error) = match outcome {
                StepsOutcome::Completed(output) => return AttemptResult::Delivered(output),
                StepsOutcome::Cancelled { next_index } => return cancelled(next_index),
                StepsOutcome::Failed { index, running_amount, error } => (index, running_amount, error),
            };

            let resume = ResumePoint {
                plan: plan.clone(),
                route: route.clone(),
                next_index: index,
                running_amount: amount_at_failure,
            };

            match self.recovery.handle_error(&error, state.attempt).await {
                RecoveryAction::SwitchFallback if !resume.has_moved_value() => {
                    match select_fallback(&plan.fallbacks, &tried) {
                        Some(fallback) => {
                            warn!(
                                subscription_id = %subscription.id,
                                via = %fallback.via,
                                expected_output = %fallback.expected_output,
                                "Switching to fallback route: {}",
                                error
                            );
                            tried.insert(fallback.via.clone());
                            state.fallback_used = true;
                            route = fallback.steps.clone();
                            start = 0;
                            running_amount = plan.amount_in;
                        }
                        None => {
                            warn!(subscription_id = %subscription.id, "All fallback routes failed");
                            return self.retry_later(error, state.attempt, None);
                        }
                    }
                }
                RecoveryAction::SwitchFallback => {
                    return self.retry_later(error, state.attempt, Some(resume));
                }
                RecoveryAction::RetryLater { delay } => {
                    return AttemptResult::Retry {
                        error,
                        delay,
                        resume: Some(resume),
                    };
                }
                RecoveryAction::Abort => {
                    return AttemptResult::Terminal {
                        reason: failure_reason(&error),
                        error: error.to_string(),
                    };
                }
            }
        }
    }

    /// Failures outside step execution. A missing route is final here since
    /// there is no fallback left to switch to.
    async fn phase_failure(&self, error: AutopayError, attempt: u32) -> AttemptResult {
        match self.recovery.handle_error(&error, attempt).await {
            RecoveryAction::RetryLater { delay } => AttemptResult::Retry {
                error,
                delay,
                resume: None,
            },
            RecoveryAction::SwitchFallback if !matches!(error, AutopayError::RouteUnavailable { .. }) => {
                self.retry_later(error, attempt, None)
            }
            RecoveryAction::SwitchFallback | RecoveryAction::Abort => AttemptResult::Terminal {
                reason: failure_reason(&error),
                error: error.to_string(),
            },
        }
    }

    fn retry_later(&self, error: AutopayError, attempt: u32, resume: Option<ResumePoint>) -> AttemptResult {
        AttemptResult::Retry {
            error,
            delay: backoff_delay(attempt, self.settings.retry_backoff, self.settings.max_retry_backoff),
            resume,
        }
    }

    /// Writes the outcome back. Terminal outcomes append the immutable record
    /// and advance the schedule; the active flag is only ever cleared here.
    pub async fn apply(
        &self,
        subscription: &Subscription,
        outcome: &RunOutcome,
        now: DateTime<Utc>,
    ) -> AutopayResult<Subscription> {
        let record = match outcome {
            RunOutcome::FailedRetryable(pending) => {
                let pending = pending.clone();
                return self
                    .store
                    .update_with(&subscription.id, Box::new(move |s| s.pending = Some(pending)))
                    .await;
            }
            RunOutcome::Succeeded(record) | RunOutcome::FailedTerminal(record) => record,
        };

        self.store.append_execution(record.clone()).await?;
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(record) {
                warn!(execution_id = %record.id, "Failed to journal execution record: {}", e);
            }
        }

        let success = record.is_success();
        let counts_as_failure = !success && record.failure_reason != Some(FailureReason::Cancelled);
        let scheduled_for = record.scheduled_for;
        let threshold = self.settings.max_consecutive_failures;

        let updated = self
            .store
            .update_with(
                &subscription.id,
                Box::new(move |s| {
                    s.next_run_date = s.cadence.next_after(scheduled_for, now);
                    s.pending = None;
                    if success {
                        s.consecutive_failures = 0;
                    } else if counts_as_failure {
                        s.consecutive_failures += 1;
                        if s.consecutive_failures >= threshold {
                            s.is_active = false;
                        }
                    }
                }),
            )
            .await?;

        if counts_as_failure && !updated.is_active && subscription.is_active {
            error!(
                subscription_id = %updated.id,
                consecutive_failures = updated.consecutive_failures,
                "Subscription deactivated after repeated failures"
            );
        }
        info!(
            subscription_id = %updated.id,
            next_run = %updated.next_run_date,
            "Schedule advanced"
        );
        Ok(updated)
    }
}

fn check_parties(subscription: &Subscription) -> AutopayResult<Parties> {
    let payer = parse_address("ownerAddress", &subscription.owner)?;
    let receiver = parse_address("receiverAddress", &subscription.receiver_address)?;
    if subscription.amount <= Decimal::ZERO {
        return Err(AutopayError::validation("amount", "must be greater than zero"));
    }

    let chain = subscription.from_chain;
    let by_symbol = resolve_token(chain, &subscription.token_symbol);
    let (token, info) = match by_symbol {
        Some(info) => (subscription.token_symbol.clone(), info),
        None => {
            let info = resolve_token(chain, &subscription.token_address).ok_or_else(|| {
                AutopayError::validation(
                    "tokenAddress",
                    format!("'{}' does not resolve on {}", subscription.token_address, chain),
                )
            })?;
            (subscription.token_address.clone(), info)
        }
    };

    Ok(Parties {
        payer,
        receiver,
        token,
        token_address: info.address,
    })
}

fn route_venue(route: &[RouteStep]) -> Option<String> {
    route
        .iter()
        .find(|s| matches!(s.kind(), StepKind::Swap | StepKind::Bridge))
        .and_then(|s| s.venue())
        .map(str::to_string)
}

fn cancelled(next_index: usize) -> AttemptResult {
    AttemptResult::Terminal {
        reason: FailureReason::Cancelled,
        error: format!("Subscription deactivated before step {}", next_index + 1),
    }
}

fn failure_reason(error: &AutopayError) -> FailureReason {
    match error {
        AutopayError::Validation { .. } | AutopayError::NotFound { .. } => FailureReason::InvalidSubscription,
        AutopayError::RiskBlocked { .. } => FailureReason::RiskBlocked,
        AutopayError::RouteUnavailable { .. } => FailureReason::RouteUnavailable,
        _ => FailureReason::RetriesExhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedChain;
    use crate::risk::StaticBlocklist;
    use crate::routing::FeeScheduleVenues;
    use crate::storage::InMemorySubscriptionStore;
    use crate::types::{Cadence, NewSubscription};
    use alloy::primitives::address;
    use rust_decimal_macros::dec;

    const OWNER: &str = "0x1234567890abcdef1234567890abcdef12345678";
    const RECEIVER: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb1";

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            max_attempts: 3,
            max_consecutive_failures: 3,
            retry_backoff: Duration::from_secs(60),
            max_retry_backoff: Duration::from_secs(3600),
            slippage_tolerance: dec!(0.005),
            gas_funding_chain: Chain::Ethereum,
        }
    }

    fn orchestrator(chain: SimulatedChain, store: Arc<InMemorySubscriptionStore>) -> PaymentOrchestrator {
        PaymentOrchestrator::new(
            Arc::new(chain),
            Arc::new(FeeScheduleVenues::new()),
            Arc::new(StaticBlocklist::new(HashSet::new())),
            store,
            settings(),
        )
    }

    const OWNER_WALLET: Address = address!("1234567890abcdef1234567890abcdef12345678");

    fn orchestrator_with_venues(
        chain: SimulatedChain,
        venues: FeeScheduleVenues,
        store: Arc<InMemorySubscriptionStore>,
    ) -> PaymentOrchestrator {
        PaymentOrchestrator::new(
            Arc::new(chain),
            Arc::new(venues),
            Arc::new(StaticBlocklist::new(HashSet::new())),
            store,
            settings(),
        )
    }

    async fn subscribe(
        store: &InMemorySubscriptionStore,
        from: Chain,
        to: Chain,
        amount: Decimal,
        receiver: &str,
        now: DateTime<Utc>,
    ) -> Subscription {
        store
            .create(
                NewSubscription {
                    name: "Payroll".to_string(),
                    description: None,
                    owner: OWNER.to_string(),
                    token_symbol: "USDC".to_string(),
                    token_address: resolve_token(from, "USDC").map(|t| format!("{:#x}", t.address)).unwrap_or_default(),
                    amount,
                    receiver_address: receiver.to_string(),
                    from_chain: from,
                    to_chain: to,
                    cadence: Cadence::Weekly,
                    next_run_date: now,
                },
                now,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn same_chain_transfer_succeeds_and_advances_schedule() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(&store, Chain::Base, Chain::Base, dec!(25), RECEIVER, now).await;
        let orchestrator = orchestrator(SimulatedChain::new(7), store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let record = outcome.record().unwrap();
        assert!(record.is_success());
        assert_eq!(record.output_amount, Some(dec!(25)));
        assert_eq!(record.steps.len(), 1);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.retry_count, 0);

        let updated = store.get(&sub.id).await.unwrap();
        assert_eq!(updated.next_run_date, Cadence::Weekly.next_after(now, now));
        assert!(updated.pending.is_none());
    }

    #[tokio::test]
    async fn scam_receiver_is_blocked_without_retry() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(
            &store,
            Chain::Base,
            Chain::Base,
            dec!(5),
            "0x000000000000000000000000000000000000beef",
            now,
        )
        .await;
        let orchestrator = orchestrator(SimulatedChain::new(7), store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let record = outcome.record().unwrap();
        assert_eq!(record.failure_reason, Some(FailureReason::RiskBlocked));
        assert!(record.steps.is_empty());
        assert_eq!(store.get(&sub.id).await.unwrap().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn scam_receiver_stays_blocked_when_receiver_code_is_unreachable() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let scam = "0x000000000000000000000000000000000000beef";
        let sub = subscribe(&store, Chain::Base, Chain::Base, dec!(5), scam, now).await;
        let chain = SimulatedChain::new(7)
            .with_unreachable_code(Chain::Base, address!("000000000000000000000000000000000000beef"));
        let orchestrator = orchestrator(chain, store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let RunOutcome::FailedTerminal(record) = &outcome else {
            panic!("expected a terminal outcome, got {:?}", outcome);
        };
        assert_eq!(record.failure_reason, Some(FailureReason::RiskBlocked));
        assert_eq!(record.attempts, 1);
        assert!(store.get(&sub.id).await.unwrap().pending.is_none());
    }

    #[tokio::test]
    async fn unverifiable_token_is_retried_not_blocked() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(&store, Chain::Base, Chain::Base, dec!(5), RECEIVER, now).await;
        let usdc = resolve_token(Chain::Base, "USDC").unwrap().address;
        let chain = SimulatedChain::new(7).with_unreachable_code(Chain::Base, usdc);
        let orchestrator = orchestrator(chain, store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let RunOutcome::FailedRetryable(pending) = outcome else {
            panic!("expected a retryable outcome, got {:?}", outcome);
        };
        assert!(pending.last_error.contains("risk scan"));
        assert!(store.executions(&sub.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unencodable_amount_ends_terminal_and_advances() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let huge = dec!(100000000000000000000000);
        let sub = subscribe(&store, Chain::Base, Chain::Base, huge, RECEIVER, now).await;
        let orchestrator = orchestrator(SimulatedChain::new(7), store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let record = outcome.record().unwrap();
        assert_eq!(record.failure_reason, Some(FailureReason::InvalidSubscription));
        assert!(record.error.as_deref().unwrap_or_default().contains("too large"));

        let updated = store.get(&sub.id).await.unwrap();
        assert!(updated.next_run_date > now);
        assert!(!updated.is_due(now));
    }

    #[tokio::test]
    async fn empty_gas_tank_is_topped_up_before_the_route() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(&store, Chain::Base, Chain::Base, dec!(25), RECEIVER, now).await;
        let chain = SimulatedChain::new(7).with_native_balance(Chain::Base, OWNER_WALLET, dec!(0));
        let orchestrator = orchestrator(chain, store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let record = outcome.record().unwrap();
        assert!(record.is_success());
        assert_eq!(record.output_amount, Some(dec!(25)));

        let kinds: Vec<StepKind> = record.steps.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![StepKind::Swap, StepKind::Bridge, StepKind::Transfer]);
        assert_eq!(record.steps[0].chain(), Chain::Ethereum);
        assert!(matches!(
            &record.steps[1],
            RouteStep::Bridge { to_chain: Chain::Base, token, .. } if token == "ETH"
        ));
        assert!(record.gas_cost_usd > record.steps[2].gas_usd());
    }

    #[tokio::test]
    async fn reverting_top_up_is_retryable() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(&store, Chain::Base, Chain::Base, dec!(25), RECEIVER, now).await;
        let venues = FeeScheduleVenues::new();
        let mut chain = SimulatedChain::new(7).with_native_balance(Chain::Base, OWNER_WALLET, dec!(0));
        for venue in venues.swap_venues(Chain::Ethereum) {
            chain = chain.with_reverting_target(Chain::Ethereum, crate::routing::venue_router(&venue));
        }
        let orchestrator = orchestrator_with_venues(chain, venues, store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let RunOutcome::FailedRetryable(pending) = outcome else {
            panic!("expected a retryable outcome, got {:?}", outcome);
        };
        assert_eq!(pending.attempts, 1);
        assert!(pending.settled.is_empty());
        assert!(pending.last_error.contains("Simulation failed on ethereum"));
        assert!(store.executions(&sub.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unquotable_top_up_is_insufficient_gas() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(&store, Chain::Base, Chain::Base, dec!(25), RECEIVER, now).await;
        let mut venues = FeeScheduleVenues::new();
        for venue in FeeScheduleVenues::new().swap_venues(Chain::Ethereum) {
            venues = venues.with_unavailable_venue(&venue);
        }
        let chain = SimulatedChain::new(7).with_native_balance(Chain::Base, OWNER_WALLET, dec!(0));
        let orchestrator = orchestrator_with_venues(chain, venues, store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let RunOutcome::FailedRetryable(pending) = outcome else {
            panic!("expected a retryable outcome, got {:?}", outcome);
        };
        assert!(pending.last_error.starts_with("Insufficient gas on base"));
        assert_eq!(pending.retry_not_before, now + chrono::Duration::seconds(60));
        assert!(pending.settled.is_empty());
    }

    #[tokio::test]
    async fn reverting_venue_switches_to_fallback() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(&store, Chain::Ethereum, Chain::Base, dec!(100), RECEIVER, now).await;

        let reference = RoutePlanner::new(
            Arc::new(SimulatedChain::new(7)),
            Arc::new(FeeScheduleVenues::new()),
            dec!(0.005),
        );
        let plan = reference
            .plan(Chain::Ethereum, Chain::Base, "USDC", "USDC", dec!(100), RECEIVER)
            .await
            .unwrap();
        let primary = plan.primary_venue().unwrap().to_string();

        let chain = SimulatedChain::new(7)
            .with_reverting_target(Chain::Ethereum, crate::routing::venue_router(&primary));
        let orchestrator = orchestrator(chain, store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let record = outcome.record().unwrap();
        assert!(record.is_success());
        assert!(record.fallback_used);
        assert_eq!(record.output_amount, Some(plan.fallbacks[0].expected_output));
    }

    #[tokio::test]
    async fn unavailable_chain_is_retryable_with_backoff() {
        let now = Utc::now();
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscribe(&store, Chain::Base, Chain::Base, dec!(10), RECEIVER, now).await;
        let chain = SimulatedChain::new(7).with_unavailable_chain(Chain::Base);
        let orchestrator = orchestrator(chain, store.clone());

        let outcome = orchestrator.run(&sub.id, now).await.unwrap().unwrap();
        let RunOutcome::FailedRetryable(pending) = outcome else {
            panic!("expected a retryable outcome, got {:?}", outcome);
        };
        assert_eq!(pending.attempts, 1);
        assert_eq!(pending.retry_not_before, now + chrono::Duration::seconds(60));
        assert!(store.executions(&sub.id, 10).await.unwrap().is_empty());
        assert!(!store.get(&sub.id).await.unwrap().is_due(now));
    }

    #[test]
    fn failure_reasons_follow_error_kind() {
        assert_eq!(
            failure_reason(&AutopayError::validation("amount", "bad")),
            FailureReason::InvalidSubscription
        );
        assert_eq!(
            failure_reason(&AutopayError::RouteUnavailable { reason: "none".to_string() }),
            FailureReason::RouteUnavailable
        );
        assert_eq!(
            failure_reason(&AutopayError::chain_unavailable(Chain::Base, "balance", anyhow::anyhow!("down"))),
            FailureReason::RetriesExhausted
        );
    }

    #[test]
    fn route_venue_ignores_approve_steps() {
        let steps = vec![
            RouteStep::Approve {
                chain: Chain::Base,
                token: "USDC".to_string(),
                spender: format!("{:#x}", address!("00000000000000000000000000000000000000aa")),
                venue: "Across".to_string(),
                amount_in: dec!(1),
                amount_out: dec!(1),
                gas_usd: dec!(0),
            },
            RouteStep::Bridge {
                chain: Chain::Base,
                to_chain: Chain::Arbitrum,
                venue: "Across".to_string(),
                token: "USDC".to_string(),
                amount_in: dec!(1),
                amount_out: dec!(0.9995),
                gas_usd: dec!(0),
            },
        ];
        assert_eq!(route_venue(&steps).as_deref(), Some("Across"));
        assert_eq!(route_venue(&steps[..1]), None);
    }
}
