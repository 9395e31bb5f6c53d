//! Periodic driver: scans due subscriptions and fans out one worker each

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use crate::config::Config;
use crate::errors::AutopayResult;
use crate::execution::{PaymentOrchestrator, RunOutcome};
use crate::storage::SubscriptionStore;
use crate::utils::print_execution_record;

/// Subscription ids with an execution in flight.
#[derive(Clone, Default)]
pub struct InFlightSet {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when `id` is already running.
    pub fn try_acquire(&self, id: &str) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !ids.insert(id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            id: id.to_string(),
            ids: self.ids.clone(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the subscription's slot when dropped, including on panic.
pub struct InFlightGuard {
    id: String,
    ids: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.id);
    }
}

pub type WorkerResult = (String, AutopayResult<Option<RunOutcome>>);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ticks: u64,
    pub due: usize,
    pub dispatched: usize,
    pub skipped_in_flight: usize,
    pub succeeded: usize,
    pub retrying: usize,
    pub failed: usize,
    pub not_due: usize,
    pub errors: HashMap<String, u32>,
}

impl TickReport {
    pub fn record(&mut self, result: Result<WorkerResult, JoinError>) {
        match result {
            Ok((_, Ok(Some(RunOutcome::Succeeded(_))))) => self.succeeded += 1,
            Ok((_, Ok(Some(RunOutcome::FailedRetryable(_))))) => self.retrying += 1,
            Ok((_, Ok(Some(RunOutcome::FailedTerminal(_))))) => self.failed += 1,
            Ok((_, Ok(None))) => self.not_due += 1,
            Ok((id, Err(e))) => {
                error!(subscription_id = %id, "Execution worker failed: {}", e);
                *self.errors.entry("worker".to_string()).or_insert(0) += 1;
            }
            Err(e) => {
                error!("Execution worker panicked: {}", e);
                *self.errors.entry("panic".to_string()).or_insert(0) += 1;
            }
        }
    }

    pub fn merge_dispatch(&mut self, other: &TickReport) {
        self.ticks += 1;
        self.due += other.due;
        self.dispatched += other.dispatched;
        self.skipped_in_flight += other.skipped_in_flight;
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.retrying + self.failed
    }
}

pub struct Scheduler {
    store: Arc<dyn SubscriptionStore>,
    orchestrator: Arc<PaymentOrchestrator>,
    in_flight: InFlightSet,
    permits: Arc<Semaphore>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        orchestrator: Arc<PaymentOrchestrator>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            orchestrator,
            in_flight: InFlightSet::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_executions.max(1))),
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
        }
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    /// Spawns one worker per due subscription that is not already running.
    /// Workers hold the in-flight guard for their whole lifetime.
    pub async fn dispatch_due(
        &self,
        now: DateTime<Utc>,
        workers: &mut JoinSet<WorkerResult>,
    ) -> AutopayResult<TickReport> {
        let due = self.store.due(now).await?;
        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        for subscription in due {
            let Some(guard) = self.in_flight.try_acquire(&subscription.id) else {
                debug!(subscription_id = %subscription.id, "Execution already in flight, skipping");
                report.skipped_in_flight += 1;
                continue;
            };

            let orchestrator = self.orchestrator.clone();
            let permits = self.permits.clone();
            let id = subscription.id;
            workers.spawn(async move {
                let _guard = guard;
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (id, Ok(None)),
                };
                let result = orchestrator.run(&id, now).await;
                (id, result)
            });
            report.dispatched += 1;
        }

        if report.due > 0 {
            info!(
                due = report.due,
                dispatched = report.dispatched,
                skipped = report.skipped_in_flight,
                "Dispatched due subscriptions"
            );
        }
        Ok(report)
    }

    /// One tick, waiting for every worker it started.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> AutopayResult<TickReport> {
        let mut workers = JoinSet::new();
        let mut report = self.dispatch_due(now, &mut workers).await?;
        report.ticks = 1;
        while let Some(joined) = workers.join_next().await {
            report.record(joined);
        }
        Ok(report)
    }

    /// Ticks until `shutdown` fires, then drains in-flight workers.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) -> TickReport {
        let mut interval = time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        let mut totals = TickReport::default();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(in_flight = workers.len(), "Shutdown requested, draining executions");
                    break;
                }
                _ = interval.tick() => {
                    match self.dispatch_due(Utc::now(), &mut workers).await {
                        Ok(report) => totals.merge_dispatch(&report),
                        Err(e) => {
                            warn!("Failed to scan due subscriptions: {}", e);
                            *totals.errors.entry("scan".to_string()).or_insert(0) += 1;
                        }
                    }
                }
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Ok((_, Ok(Some(outcome)))) = &joined {
                        if let Some(record) = outcome.record() {
                            print_execution_record(record);
                        }
                    }
                    totals.record(joined);
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            totals.record(joined);
        }
        totals
    }
}
