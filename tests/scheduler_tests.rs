mod common;

use autopay_router::chain::SimulatedChain;
use autopay_router::storage::{InMemorySubscriptionStore, SubscriptionStore};
use autopay_router::{Cadence, Chain, ExecutionStatus, FailureReason, RouteStep, resolve_token, steps_are_chained};
use chrono::{Duration, Months, Utc};
use common::*;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn successful_run_advances_from_the_scheduled_time() {
    let harness = Harness::simulated(11);
    let scheduled = Utc::now();
    let sub = harness
        .subscribe(Chain::Base, Chain::Base, dec!(25.50), Cadence::Monthly, scheduled)
        .await;

    let ran_at = scheduled + Duration::minutes(5);
    let report = harness.scheduler.run_tick(ran_at).await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.succeeded, 1);

    let records = harness.store.executions(&sub.id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ExecutionStatus::Success);
    assert_eq!(records[0].scheduled_for, scheduled);
    assert_eq!(records[0].output_amount, Some(dec!(25.50)));

    let updated = harness.store.get(&sub.id).await.unwrap();
    assert_eq!(updated.next_run_date, scheduled.checked_add_months(Months::new(1)).unwrap());
    assert!(updated.next_run_date > ran_at);
}

#[tokio::test]
async fn cross_chain_run_records_a_chained_route() {
    let harness = Harness::simulated(11);
    let now = Utc::now();
    let sub = harness
        .subscribe(Chain::Ethereum, Chain::Arbitrum, dec!(100), Cadence::Weekly, now)
        .await;

    harness.scheduler.run_tick(now).await.unwrap();

    let record = &harness.store.executions(&sub.id, 1).await.unwrap()[0];
    assert!(record.is_success());
    assert_eq!(record.steps.len(), 3);
    assert!(steps_are_chained(&record.steps));
    let delivered = record.output_amount.unwrap();
    assert!(delivered < dec!(100) && delivered > dec!(99));
    assert!(record.gas_cost_usd > dec!(0));
}

#[tokio::test]
async fn transient_failures_retry_then_end_terminal() {
    let harness = Harness::new(Arc::new(SimulatedChain::new(11).with_unavailable_chain(Chain::Base)));
    let t0 = Utc::now();
    let sub = harness
        .subscribe(Chain::Base, Chain::Base, dec!(10), Cadence::Daily, t0)
        .await;

    let first = harness.scheduler.run_tick(t0).await.unwrap();
    assert_eq!(first.retrying, 1);
    let pending = harness.store.get(&sub.id).await.unwrap().pending.unwrap();
    assert_eq!(pending.attempts, 1);
    assert_eq!(pending.retry_not_before, t0 + Duration::seconds(60));

    // Still backing off.
    let idle = harness.scheduler.run_tick(t0 + Duration::seconds(30)).await.unwrap();
    assert_eq!(idle.dispatched, 0);

    let t1 = t0 + Duration::seconds(61);
    let second = harness.scheduler.run_tick(t1).await.unwrap();
    assert_eq!(second.retrying, 1);
    let pending = harness.store.get(&sub.id).await.unwrap().pending.unwrap();
    assert_eq!(pending.attempts, 2);
    assert_eq!(pending.retry_not_before, t1 + Duration::seconds(120));

    let t2 = t1 + Duration::seconds(121);
    let third = harness.scheduler.run_tick(t2).await.unwrap();
    assert_eq!(third.failed, 1);

    let records = harness.store.executions(&sub.id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].failure_reason, Some(FailureReason::RetriesExhausted));
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].retry_count, 2);

    let updated = harness.store.get(&sub.id).await.unwrap();
    assert!(updated.pending.is_none());
    assert_eq!(updated.next_run_date, t0 + Duration::days(1));
    assert_eq!(updated.consecutive_failures, 1);
    assert!(updated.is_active);
}

#[tokio::test]
async fn failure_after_the_bridge_resumes_at_the_transfer() {
    let chain = Arc::new(SimulatedChain::new(11));
    let usdc_arbitrum = resolve_token(Chain::Arbitrum, "USDC").unwrap().address;
    chain.set_reverting(Chain::Arbitrum, usdc_arbitrum, true).await;
    let harness = Harness::new(chain.clone());
    let t0 = Utc::now();
    let sub = harness
        .subscribe(Chain::Ethereum, Chain::Arbitrum, dec!(100), Cadence::Weekly, t0)
        .await;

    let first = harness.scheduler.run_tick(t0).await.unwrap();
    assert_eq!(first.retrying, 1);
    let pending = harness.store.get(&sub.id).await.unwrap().pending.unwrap();
    assert_eq!(pending.settled.len(), 2);
    assert_eq!(pending.resume.as_ref().map(|r| r.next_index), Some(2));
    assert!(!pending.fallback_used);

    chain.set_reverting(Chain::Arbitrum, usdc_arbitrum, false).await;
    let second = harness.scheduler.run_tick(t0 + Duration::seconds(61)).await.unwrap();
    assert_eq!(second.succeeded, 1);

    let records = harness.store.executions(&sub.id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(record.is_success());
    assert_eq!(record.attempts, 2);
    assert_eq!(record.retry_count, 1);
    assert!(steps_are_chained(&record.steps));

    let bridges: Vec<&RouteStep> = record
        .steps
        .iter()
        .filter(|s| matches!(s, RouteStep::Bridge { .. }))
        .collect();
    assert_eq!(bridges.len(), 1);
    assert_eq!(record.output_amount, Some(bridges[0].amount_out()));
    assert!(matches!(record.steps.last(), Some(RouteStep::Transfer { .. })));

    // Only one bridge deposit ever reached the chain.
    let bridge_txs = chain
        .submitted()
        .await
        .iter()
        .filter(|tx| tx.label.starts_with("Bridge"))
        .count();
    assert_eq!(bridge_txs, 1);
}

#[tokio::test]
async fn cancelling_mid_run_stops_before_the_next_step() {
    let store = Arc::new(InMemorySubscriptionStore::new());
    let chain = Arc::new(CancelAfterFirstStep::new(SimulatedChain::new(11), store.clone()));
    let harness = Harness::with_store(chain.clone(), store.clone());
    let now = Utc::now();
    let sub = harness
        .subscribe(Chain::Ethereum, Chain::Arbitrum, dec!(100), Cadence::Weekly, now)
        .await;
    chain.watch(&sub.id).await;

    let report = harness.scheduler.run_tick(now).await.unwrap();
    assert_eq!(report.failed, 1);

    let records = store.executions(&sub.id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].failure_reason, Some(FailureReason::Cancelled));
    // The approve had settled; it is kept, never rolled back.
    assert_eq!(records[0].steps.len(), 1);

    let updated = store.get(&sub.id).await.unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.consecutive_failures, 0);

    let later = harness.scheduler.run_tick(now + Duration::weeks(2)).await.unwrap();
    assert_eq!(later.due, 0);
    assert_eq!(store.executions(&sub.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn repeated_terminal_failures_deactivate_the_subscription() {
    let harness = Harness::simulated(11);
    let mut next = Utc::now();
    let mut request = new_subscription(Chain::Base, Chain::Base, dec!(5), Cadence::Daily, next);
    request.receiver_address = "0xdead00000000000000000000000000000000beef".to_string();
    let sub = harness.store.create(request, next).await.unwrap();

    for _ in 0..3 {
        let report = harness.scheduler.run_tick(next).await.unwrap();
        assert_eq!(report.failed, 1);
        next = harness.store.get(&sub.id).await.unwrap().next_run_date;
    }

    let updated = harness.store.get(&sub.id).await.unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.consecutive_failures, 3);
    let records = harness.store.executions(&sub.id, 10).await.unwrap();
    assert!(records.iter().all(|r| r.failure_reason == Some(FailureReason::RiskBlocked)));
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn inactive_subscriptions_are_never_selected() {
    let harness = Harness::simulated(11);
    let now = Utc::now();
    let sub = harness
        .subscribe(Chain::Base, Chain::Base, dec!(10), Cadence::Daily, now)
        .await;
    harness.service.cancel_subscription(&sub.id).await.unwrap();

    let report = harness.scheduler.run_tick(now + Duration::days(30)).await.unwrap();
    assert_eq!(report.due, 0);
    assert_eq!(report.dispatched, 0);
    assert!(harness.store.executions(&sub.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn in_flight_subscription_is_not_dispatched_twice() {
    let harness = Harness::simulated(11);
    let now = Utc::now();
    let sub = harness
        .subscribe(Chain::Base, Chain::Base, dec!(10), Cadence::Daily, now)
        .await;

    let guard = harness.scheduler.in_flight().try_acquire(&sub.id).unwrap();
    let report = harness.scheduler.run_tick(now).await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.skipped_in_flight, 1);
    assert_eq!(report.dispatched, 0);
    assert!(harness.store.executions(&sub.id, 10).await.unwrap().is_empty());

    drop(guard);
    let report = harness.scheduler.run_tick(now).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(harness.scheduler.in_flight().is_empty());
}

#[tokio::test]
async fn due_subscriptions_fan_out_in_one_tick() {
    let harness = Harness::simulated(11);
    let now = Utc::now();
    for amount in [dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)] {
        harness
            .subscribe(Chain::Optimism, Chain::Optimism, amount, Cadence::Weekly, now)
            .await;
    }

    let report = harness.scheduler.run_tick(now).await.unwrap();
    assert_eq!(report.dispatched, 5);
    assert_eq!(report.succeeded, 5);

    let again = harness.scheduler.run_tick(now).await.unwrap();
    assert_eq!(again.due, 0);
}
