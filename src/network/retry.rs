//! Retry logic with exponential backoff

use std::time::Duration;
use anyhow::Result;
use tracing::warn;
use crate::errors::{AutopayError, AutopayResult};
use crate::types::Chain;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            exponential_base: 2.0,
        }
    }
}

/// Retries an RPC operation in place. Used for connection checks, never for
/// route steps: those go through the orchestrator's attempt accounting.
pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    config: &RetryConfig,
    chain: Chain,
    context: &str,
) -> AutopayResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= config.max_attempts => {
                return Err(AutopayError::ChainUnavailable {
                    chain,
                    operation: format!("{} failed after {} attempts", context, attempt),
                    source: Some(e),
                });
            }
            Err(e) => {
                warn!(
                    "Attempt {}/{} failed for {} on {}: {}. Retrying in {}ms...",
                    attempt, config.max_attempts, context, chain, e, delay
                );

                tokio::time::sleep(Duration::from_millis(delay)).await;

                delay = (delay as f64 * config.exponential_base) as u64;
                delay = delay.min(config.max_delay_ms);
                let jitter = (delay as f64 * 0.1 * (rand::random::<f64>() - 0.5)) as u64;
                delay = delay.saturating_add(jitter);
            }
        }
    }
}

/// `base × 2^(attempt−1)`, capped at `cap`. `attempt` is 1-based.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent)
        .unwrap_or(cap)
        .min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_until_capped() {
        let base = Duration::from_secs(60);
        let cap = Duration::from_secs(300);
        assert_eq!(backoff_delay(1, base, cap), Duration::from_secs(60));
        assert_eq!(backoff_delay(2, base, cap), Duration::from_secs(120));
        assert_eq!(backoff_delay(3, base, cap), Duration::from_secs(240));
        assert_eq!(backoff_delay(4, base, cap), cap);
        assert_eq!(backoff_delay(40, base, cap), cap);
    }

    #[tokio::test]
    async fn gives_up_with_chain_unavailable() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            exponential_base: 2.0,
        };
        let result: AutopayResult<()> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("timeout"))
            },
            &config,
            Chain::Optimism,
            "block number",
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(result, Err(AutopayError::ChainUnavailable { chain: Chain::Optimism, .. })));
    }
}
