//! Tool invocation surface: `{toolName, arguments}` in, text content out

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};
use super::render;
use crate::api::AutopayService;
use crate::errors::AutopayError;
use crate::types::{CreateSubscriptionRequest, GasEnsureRequest, RiskScanRequest, RouteQuoteRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text".to_string(),
                text: text.into(),
            }],
            is_error: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(text)
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// All text content joined with newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub fn manifest() -> Vec<ToolDescriptor> {
    let tool = |name: &str, description: &str, schema: Value| ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: schema,
    };

    vec![
        tool(
            "subscription.create",
            "Create a recurring cross-chain payment subscription",
            object_schema(
                json!({
                    "name": {"type": "string"},
                    "description": {"type": "string"},
                    "tokenSymbol": {"type": "string"},
                    "tokenAddress": {"type": "string"},
                    "amount": {"type": "string", "description": "Decimal amount per payment"},
                    "receiverAddress": {"type": "string"},
                    "ownerAddress": {"type": "string", "description": "Payer wallet"},
                    "fromChain": {"type": "string", "enum": ["ethereum", "base", "arbitrum", "polygon", "optimism"]},
                    "toChain": {"type": "string", "enum": ["ethereum", "base", "arbitrum", "polygon", "optimism"]},
                    "frequency": {"type": "string", "enum": ["daily", "weekly", "monthly"]}
                }),
                &["name", "tokenSymbol", "amount", "receiverAddress", "ownerAddress", "fromChain", "toChain", "frequency"],
            ),
        ),
        tool(
            "subscription.list",
            "List subscriptions with their latest execution",
            object_schema(json!({}), &[]),
        ),
        tool(
            "subscription.cancel",
            "Deactivate a subscription; no further payments are made",
            object_schema(json!({"id": {"type": "string"}}), &["id"]),
        ),
        tool(
            "route.quote",
            "Quote the swap/bridge/transfer route for a payment, with fallbacks",
            object_schema(
                json!({
                    "fromChain": {"type": "string"},
                    "toChain": {"type": "string"},
                    "tokenIn": {"type": "string"},
                    "tokenOut": {"type": "string"},
                    "amountIn": {"type": "string"},
                    "receiverAddress": {"type": "string"}
                }),
                &["fromChain", "toChain", "tokenIn", "tokenOut", "amountIn", "receiverAddress"],
            ),
        ),
        tool(
            "gas.ensure",
            "Check a wallet's native gas balance and plan a top-up if needed",
            object_schema(
                json!({
                    "chain": {"type": "string"},
                    "userAddress": {"type": "string"},
                    "estimatedGasUSD": {"type": "string"}
                }),
                &["chain", "userAddress", "estimatedGasUSD"],
            ),
        ),
        tool(
            "risk.scan",
            "Screen a transfer for risk before it is sent",
            object_schema(
                json!({
                    "tokenAddress": {"type": "string"},
                    "receiverAddress": {"type": "string"},
                    "chain": {"type": "string"},
                    "amount": {"type": "string"}
                }),
                &["tokenAddress", "receiverAddress", "chain", "amount"],
            ),
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct CancelArgs {
    id: String,
}

pub struct ToolRouter {
    service: Arc<AutopayService>,
}

impl ToolRouter {
    pub fn new(service: Arc<AutopayService>) -> Self {
        Self { service }
    }

    pub fn manifest(&self) -> Vec<ToolDescriptor> {
        manifest()
    }

    /// Never fails: every error becomes an `isError` response.
    pub async fn call(&self, call: ToolCall, now: DateTime<Utc>) -> ToolResponse {
        info!(tool = %call.tool_name, "Tool call");
        match call.tool_name.as_str() {
            "subscription.create" => match arguments::<CreateSubscriptionRequest>(&call) {
                Ok(request) => match self.service.create_subscription(request, now).await {
                    Ok(subscription) => ToolResponse::text(render::subscription_created(&subscription)),
                    Err(e) => failure("create subscription", &e),
                },
                Err(response) => response,
            },
            "subscription.list" => match self.service.list_subscriptions().await {
                Ok(summaries) => ToolResponse::text(render::subscription_list(&summaries)),
                Err(e) => failure("list subscriptions", &e),
            },
            "subscription.cancel" => match arguments::<CancelArgs>(&call) {
                Ok(args) => match self.service.cancel_subscription(&args.id).await {
                    Ok(subscription) => ToolResponse::text(render::subscription_cancelled(&subscription)),
                    Err(e) => failure("cancel subscription", &e),
                },
                Err(response) => response,
            },
            "route.quote" => match arguments::<RouteQuoteRequest>(&call) {
                Ok(request) => match self.service.quote_route(request, now).await {
                    Ok(quote) => ToolResponse::text(render::route_quote(&quote)),
                    Err(e) => failure("quote route", &e),
                },
                Err(response) => response,
            },
            "gas.ensure" => match arguments::<GasEnsureRequest>(&call) {
                Ok(request) => {
                    let chain = request.chain.clone();
                    match self.service.ensure_gas(request).await {
                        Ok(gas) => ToolResponse::text(render::gas_check(&chain, &gas)),
                        Err(e) => failure("check gas", &e),
                    }
                }
                Err(response) => response,
            },
            "risk.scan" => match arguments::<RiskScanRequest>(&call) {
                Ok(request) => match self.service.scan_risk(request).await {
                    Ok(assessment) => ToolResponse::text(render::risk_assessment(&assessment)),
                    Err(e) => failure("scan risk", &e),
                },
                Err(response) => response,
            },
            other => {
                warn!(tool = %other, "Unknown tool");
                let known: Vec<String> = manifest().into_iter().map(|t| t.name).collect();
                ToolResponse::error(format!("❌ Unknown tool '{}'. Available tools: {}", other, known.join(", ")))
            }
        }
    }

    /// Decodes a raw JSON envelope, dispatches it and encodes the response.
    pub async fn handle_json(&self, raw: &str, now: DateTime<Utc>) -> String {
        let response = match serde_json::from_str::<ToolCall>(raw) {
            Ok(call) => self.call(call, now).await,
            Err(e) => ToolResponse::error(format!("❌ Malformed tool call: {}", e)),
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"content":[{{"type":"text","text":"{}"}}],"isError":true}}"#, e))
    }
}

fn arguments<T: DeserializeOwned>(call: &ToolCall) -> Result<T, ToolResponse> {
    let args = if call.arguments.is_null() { json!({}) } else { call.arguments.clone() };
    serde_json::from_value(args).map_err(|e| {
        ToolResponse::error(format!("❌ Invalid arguments for {}: {}", call.tool_name, e))
    })
}

fn failure(action: &str, error: &AutopayError) -> ToolResponse {
    ToolResponse::error(format!("❌ Failed to {}: {}", action, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_the_six_tools_with_schemas() {
        let names: Vec<String> = manifest().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "subscription.create",
                "subscription.list",
                "subscription.cancel",
                "route.quote",
                "gas.ensure",
                "risk.scan"
            ]
        );
        assert!(manifest().iter().all(|t| t.input_schema["type"] == "object"));
    }

    #[test]
    fn envelope_serializes_in_wire_shape() {
        let ok = serde_json::to_value(ToolResponse::text("hi")).unwrap();
        assert_eq!(ok, json!({"content": [{"type": "text", "text": "hi"}]}));

        let err = serde_json::to_value(ToolResponse::error("nope")).unwrap();
        assert_eq!(err["isError"], json!(true));

        let call: ToolCall = serde_json::from_str(r#"{"toolName":"subscription.list"}"#).unwrap();
        assert_eq!(call.tool_name, "subscription.list");
        assert!(call.arguments.is_null());
    }
}
