//! Demo subscriptions for local runs

use chrono::{DateTime, Utc};
use tracing::info;
use super::AutopayService;
use crate::errors::AutopayResult;
use crate::types::{CreateSubscriptionRequest, Subscription};

pub const DEMO_OWNER: &str = "0x1234567890abcdef1234567890abcdef12345678";

pub fn demo_requests() -> Vec<CreateSubscriptionRequest> {
    let request = |name: &str, token: &str, amount: &str, receiver: &str, from: &str, to: &str, frequency: &str| {
        CreateSubscriptionRequest {
            name: name.to_string(),
            description: None,
            token_symbol: token.to_string(),
            token_address: None,
            amount: amount.to_string(),
            receiver_address: receiver.to_string(),
            owner_address: DEMO_OWNER.to_string(),
            from_chain: from.to_string(),
            to_chain: to.to_string(),
            frequency: frequency.to_string(),
        }
    };

    vec![
        request(
            "Team payroll",
            "USDC",
            "100.00",
            "0x742d35Cc6634C0532925a3b8D4C9db96590c6C87",
            "ethereum",
            "arbitrum",
            "monthly",
        ),
        request(
            "Design retainer",
            "USDT",
            "50.00",
            "0x8ba1f109551bd432803012645ac136ddd22c57b9",
            "polygon",
            "base",
            "weekly",
        ),
        request(
            "Hosting",
            "USDC",
            "25.50",
            "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984",
            "base",
            "base",
            "daily",
        ),
    ]
}

/// Creates the demo subscriptions and makes them due immediately.
pub async fn seed_demo(service: &AutopayService, now: DateTime<Utc>) -> AutopayResult<Vec<Subscription>> {
    let mut seeded = Vec::new();
    for request in demo_requests() {
        let created = service.create_subscription(request, now).await?;
        let due = service
            .store()
            .update_with(&created.id, Box::new(move |s| s.next_run_date = now))
            .await?;
        seeded.push(due);
    }
    info!(count = seeded.len(), "🌱 Seeded demo subscriptions");
    Ok(seeded)
}
