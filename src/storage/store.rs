//! Subscription store collaborator and its in-memory implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use crate::errors::{AutopayError, AutopayResult};
use crate::types::{ExecutionRecord, NewSubscription, Subscription};

/// Mutation applied atomically under the store's write lock.
pub type SubscriptionUpdate = Box<dyn FnOnce(&mut Subscription) + Send>;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn create(&self, new: NewSubscription, now: DateTime<Utc>) -> AutopayResult<Subscription>;

    async fn get(&self, id: &str) -> AutopayResult<Subscription>;

    async fn list(&self) -> AutopayResult<Vec<Subscription>>;

    /// Read-modify-write without interleaving; returns the updated row.
    async fn update_with(&self, id: &str, update: SubscriptionUpdate) -> AutopayResult<Subscription>;

    async fn append_execution(&self, record: ExecutionRecord) -> AutopayResult<()>;

    /// Newest first.
    async fn executions(&self, subscription_id: &str, limit: usize) -> AutopayResult<Vec<ExecutionRecord>>;

    async fn due(&self, now: DateTime<Utc>) -> AutopayResult<Vec<Subscription>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| s.is_due(now))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<HashMap<String, Subscription>>,
    executions: RwLock<Vec<ExecutionRecord>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn create(&self, new: NewSubscription, now: DateTime<Utc>) -> AutopayResult<Subscription> {
        let subscription = Subscription {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            owner: new.owner,
            token_symbol: new.token_symbol,
            token_address: new.token_address,
            amount: new.amount,
            receiver_address: new.receiver_address,
            from_chain: new.from_chain,
            to_chain: new.to_chain,
            cadence: new.cadence,
            next_run_date: new.next_run_date,
            is_active: true,
            created_at: now,
            consecutive_failures: 0,
            pending: None,
        };
        self.subscriptions
            .write()
            .await
            .insert(subscription.id.clone(), subscription.clone());

        info!(
            subscription_id = %subscription.id,
            name = %subscription.name,
            cadence = %subscription.cadence,
            next_run = %subscription.next_run_date,
            "Subscription created"
        );
        Ok(subscription)
    }

    async fn get(&self, id: &str) -> AutopayResult<Subscription> {
        self.subscriptions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AutopayError::NotFound { id: id.to_string() })
    }

    async fn list(&self) -> AutopayResult<Vec<Subscription>> {
        let mut all: Vec<Subscription> = self.subscriptions.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn update_with(&self, id: &str, update: SubscriptionUpdate) -> AutopayResult<Subscription> {
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(id)
            .ok_or_else(|| AutopayError::NotFound { id: id.to_string() })?;
        update(subscription);
        debug!(subscription_id = %id, active = subscription.is_active, "Subscription updated");
        Ok(subscription.clone())
    }

    async fn append_execution(&self, record: ExecutionRecord) -> AutopayResult<()> {
        self.executions.write().await.push(record);
        Ok(())
    }

    async fn executions(&self, subscription_id: &str, limit: usize) -> AutopayResult<Vec<ExecutionRecord>> {
        Ok(self
            .executions
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.subscription_id == subscription_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
