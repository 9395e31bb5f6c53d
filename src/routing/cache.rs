//! Short-lived cache of route quotes

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use crate::types::{Chain, RouteQuoteResponse};

/// `"{from}-{to}-{tokenIn}-{amountIn}"`
pub fn route_key(from: Chain, to: Chain, token_in: &str, amount_in: Decimal) -> String {
    format!("{}-{}-{}-{}", from, to, token_in.to_ascii_uppercase(), amount_in.normalize())
}

#[derive(Debug, Clone)]
struct CachedQuote {
    token_out: String,
    receiver: String,
    response: RouteQuoteResponse,
    cached_at: DateTime<Utc>,
}

pub struct RouteQuoteCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedQuote>>,
}

impl RouteQuoteCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// A hit must also agree on output token and receiver; otherwise it is a miss.
    pub async fn get(
        &self,
        key: &str,
        token_out: &str,
        receiver: &str,
        now: DateTime<Utc>,
    ) -> Option<RouteQuoteResponse> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if now - entry.cached_at >= self.ttl {
            debug!(key, "Route quote expired");
            return None;
        }
        if !entry.token_out.eq_ignore_ascii_case(token_out) || !entry.receiver.eq_ignore_ascii_case(receiver) {
            debug!(key, "Cached route quote is for a different output or receiver");
            return None;
        }
        Some(entry.response.clone())
    }

    /// Lookup by route key alone, as exposed to clients.
    pub async fn get_by_key(&self, key: &str, now: DateTime<Utc>) -> Option<RouteQuoteResponse> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| now - entry.cached_at < self.ttl)
            .map(|entry| entry.response.clone())
    }

    pub async fn insert(
        &self,
        key: String,
        token_out: &str,
        receiver: &str,
        response: RouteQuoteResponse,
        now: DateTime<Utc>,
    ) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| now - entry.cached_at < self.ttl);
        entries.insert(
            key,
            CachedQuote {
                token_out: token_out.to_string(),
                receiver: receiver.to_string(),
                response,
                cached_at: now,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
