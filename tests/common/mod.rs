//! Shared fixtures for the scheduler and tool integration tests

#![allow(dead_code)]

use alloy::primitives::Address;
use async_trait::async_trait;
use autopay_router::api::AutopayService;
use autopay_router::chain::{ChainAdapter, SimulatedChain, SimulationOutcome, TokenMetadata, TxRequest};
use autopay_router::execution::{OrchestratorSettings, PaymentOrchestrator};
use autopay_router::risk::StaticBlocklist;
use autopay_router::routing::FeeScheduleVenues;
use autopay_router::scheduler::Scheduler;
use autopay_router::storage::{InMemorySubscriptionStore, SubscriptionStore};
use autopay_router::{AutopayResult, Cadence, Chain, Config, NativeBalance, NewSubscription, Subscription};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const OWNER: &str = "0x1234567890abcdef1234567890abcdef12345678";
pub const RECEIVER: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb1";

pub fn test_config() -> Config {
    Config {
        retry_backoff_secs: 60,
        max_retry_backoff_secs: 3600,
        max_execution_attempts: 3,
        max_consecutive_failures: 3,
        ..Config::default()
    }
}

pub struct Harness {
    pub store: Arc<InMemorySubscriptionStore>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub scheduler: Scheduler,
    pub service: Arc<AutopayService>,
}

impl Harness {
    pub fn new(chain: Arc<dyn ChainAdapter>) -> Self {
        Self::with_store(chain, Arc::new(InMemorySubscriptionStore::new()))
    }

    pub fn with_store(chain: Arc<dyn ChainAdapter>, store: Arc<InMemorySubscriptionStore>) -> Self {
        let config = test_config();
        let venues = Arc::new(FeeScheduleVenues::new());
        let signals = Arc::new(StaticBlocklist::new(HashSet::new()));
        let orchestrator = Arc::new(PaymentOrchestrator::new(
            chain.clone(),
            venues.clone(),
            signals.clone(),
            store.clone(),
            OrchestratorSettings::from_config(&config),
        ));
        let scheduler = Scheduler::new(store.clone(), orchestrator.clone(), &config);
        let service = Arc::new(AutopayService::new(chain, venues, signals, store.clone(), &config));
        Self {
            store,
            orchestrator,
            scheduler,
            service,
        }
    }

    pub fn simulated(seed: u64) -> Self {
        Self::new(Arc::new(SimulatedChain::new(seed)))
    }

    pub async fn subscribe(
        &self,
        from: Chain,
        to: Chain,
        amount: Decimal,
        cadence: Cadence,
        next_run_date: DateTime<Utc>,
    ) -> Subscription {
        self.store
            .create(new_subscription(from, to, amount, cadence, next_run_date), next_run_date)
            .await
            .unwrap()
    }
}

pub fn new_subscription(
    from: Chain,
    to: Chain,
    amount: Decimal,
    cadence: Cadence,
    next_run_date: DateTime<Utc>,
) -> NewSubscription {
    NewSubscription {
        name: format!("{} → {}", from, to),
        description: None,
        owner: OWNER.to_string(),
        token_symbol: "USDC".to_string(),
        token_address: autopay_router::resolve_token(from, "USDC")
            .map(|t| format!("{:#x}", t.address))
            .unwrap_or_default(),
        amount,
        receiver_address: RECEIVER.to_string(),
        from_chain: from,
        to_chain: to,
        cadence,
        next_run_date,
    }
}

/// Deactivates the watched subscription right after the first step settles,
/// the way a user cancelling mid-run would.
pub struct CancelAfterFirstStep {
    inner: SimulatedChain,
    store: Arc<InMemorySubscriptionStore>,
    watched: RwLock<Option<String>>,
}

impl CancelAfterFirstStep {
    pub fn new(inner: SimulatedChain, store: Arc<InMemorySubscriptionStore>) -> Self {
        Self {
            inner,
            store,
            watched: RwLock::new(None),
        }
    }

    pub async fn watch(&self, subscription_id: &str) {
        *self.watched.write().await = Some(subscription_id.to_string());
    }
}

#[async_trait]
impl ChainAdapter for CancelAfterFirstStep {
    async fn native_balance(&self, chain: Chain, wallet: Address) -> AutopayResult<NativeBalance> {
        self.inner.native_balance(chain, wallet).await
    }

    async fn gas_price_gwei(&self, chain: Chain) -> AutopayResult<Decimal> {
        self.inner.gas_price_gwei(chain).await
    }

    async fn has_code(&self, chain: Chain, address: Address) -> AutopayResult<bool> {
        self.inner.has_code(chain, address).await
    }

    async fn token_metadata(&self, chain: Chain, token: Address) -> AutopayResult<Option<TokenMetadata>> {
        self.inner.token_metadata(chain, token).await
    }

    async fn simulate(&self, tx: &TxRequest) -> AutopayResult<SimulationOutcome> {
        let outcome = self.inner.simulate(tx).await?;
        if let Some(id) = self.watched.write().await.take() {
            self.store
                .update_with(&id, Box::new(|s| s.is_active = false))
                .await?;
        }
        Ok(outcome)
    }
}
