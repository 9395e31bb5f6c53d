mod common;

use autopay_router::storage::SubscriptionStore;
use autopay_router::tools::{ToolCall, ToolResponse, ToolRouter};
use chrono::Utc;
use common::*;
use serde_json::{Value, json};

fn router() -> (Harness, ToolRouter) {
    let harness = Harness::simulated(7);
    let router = ToolRouter::new(harness.service.clone());
    (harness, router)
}

fn call(tool: &str, arguments: Value) -> ToolCall {
    ToolCall {
        tool_name: tool.to_string(),
        arguments,
    }
}

fn create_args(name: &str) -> Value {
    json!({
        "name": name,
        "tokenSymbol": "USDC",
        "amount": "25.50",
        "receiverAddress": RECEIVER,
        "ownerAddress": OWNER,
        "fromChain": "base",
        "toChain": "arbitrum",
        "frequency": "monthly"
    })
}

#[tokio::test]
async fn create_list_cancel_through_the_envelope() {
    let (harness, router) = router();
    let now = Utc::now();

    let created = router.call(call("subscription.create", create_args("Design tools")), now).await;
    assert!(!created.is_error());
    let text = created.joined_text();
    assert!(text.contains("Subscription \"Design tools\" created successfully"));
    assert!(text.contains("• Amount: 25.50 USDC"));
    assert!(text.contains("• Route: base → arbitrum"));
    assert!(text.contains("0x742d...beb1"));

    let id = harness.store.list().await.unwrap()[0].id.clone();
    assert!(text.contains(&id));

    let listed = router.call(call("subscription.list", Value::Null), now).await;
    assert!(listed.joined_text().contains("• Active subscriptions: 1/1"));

    let cancelled = router.call(call("subscription.cancel", json!({"id": id})), now).await;
    assert!(!cancelled.is_error());
    assert!(cancelled.joined_text().contains("has been cancelled"));

    let listed = router.call(call("subscription.list", json!({})), now).await;
    assert!(listed.joined_text().contains("• Active subscriptions: 0/1"));
    assert!(!harness.store.get(&id).await.unwrap().is_active);
}

#[tokio::test]
async fn invalid_and_unknown_calls_are_error_responses() {
    let (_harness, router) = router();
    let now = Utc::now();

    let unknown = router.call(call("wallet.drain", json!({})), now).await;
    assert!(unknown.is_error());
    assert!(unknown.joined_text().contains("Unknown tool 'wallet.drain'"));
    assert!(unknown.joined_text().contains("subscription.create"));

    let mut args = create_args("Bad chain");
    args["fromChain"] = json!("solana");
    let bad = router.call(call("subscription.create", args), now).await;
    assert!(bad.is_error());
    assert!(bad.joined_text().contains("fromChain"));

    let missing = router.call(call("subscription.cancel", json!({"id": "nope"})), now).await;
    assert!(missing.is_error());

    let malformed = router.call(call("route.quote", json!({"fromChain": "base"})), now).await;
    assert!(malformed.is_error());
    assert!(malformed.joined_text().contains("Invalid arguments for route.quote"));
}

#[tokio::test]
async fn high_value_payment_quotes_a_transfer_and_flags_risk() {
    let (_harness, router) = router();
    let now = Utc::now();

    let quote = router
        .call(
            call(
                "route.quote",
                json!({
                    "fromChain": "base",
                    "toChain": "base",
                    "tokenIn": "USDC",
                    "tokenOut": "USDC",
                    "amountIn": "1500",
                    "receiverAddress": RECEIVER
                }),
            ),
            now,
        )
        .await;
    assert!(!quote.is_error());
    let text = quote.joined_text();
    assert!(text.contains("1. Transfer 1500 USDC to 0x742d...beb1 on base"));
    assert!(!text.contains("2."));
    assert!(text.contains("📉 Slippage: 0.00%"));

    let risk = router
        .call(
            call(
                "risk.scan",
                json!({
                    "tokenAddress": "USDC",
                    "receiverAddress": RECEIVER,
                    "chain": "base",
                    "amount": "1500"
                }),
            ),
            now,
        )
        .await;
    let text = risk.joined_text();
    assert!(text.contains("High value transaction"));
    assert!(!text.contains("Risk level: low"));
}

#[tokio::test]
async fn gas_check_reports_sufficient_balance() {
    let (_harness, router) = router();
    let response = router
        .call(
            call(
                "gas.ensure",
                json!({"chain": "base", "userAddress": OWNER, "estimatedGasUSD": "0.05"}),
            ),
            Utc::now(),
        )
        .await;
    assert!(!response.is_error());
    let text = response.joined_text();
    assert!(text.starts_with("⛽ Gas on base"));
    assert!(text.contains("Sufficient gas"));
}

#[tokio::test]
async fn raw_json_round_trip() {
    let (_harness, router) = router();
    let now = Utc::now();

    let raw = router
        .handle_json(r#"{"toolName":"subscription.list","arguments":{}}"#, now)
        .await;
    let response: ToolResponse = serde_json::from_str(&raw).unwrap();
    assert!(!response.is_error());
    assert_eq!(response.content[0].kind, "text");
    assert!(response.joined_text().contains("No subscriptions found"));

    let raw = router.handle_json("{not json", now).await;
    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["isError"], json!(true));
    assert!(value["content"][0]["text"].as_str().unwrap().contains("Malformed tool call"));
}

#[tokio::test]
async fn demo_seed_is_listed_and_due_immediately() {
    let (harness, router) = router();
    let now = Utc::now();
    autopay_router::api::seed_demo(&harness.service, now).await.unwrap();

    let listed = router.call(call("subscription.list", Value::Null), now).await;
    assert!(listed.joined_text().contains("• Active subscriptions: 3/3"));

    let report = harness.scheduler.run_tick(now).await.unwrap();
    assert_eq!(report.due, 3);
    assert_eq!(report.dispatched, 3);
}
