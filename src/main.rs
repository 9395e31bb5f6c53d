//! AutoPay Router - Main Entry Point
//!
//! Runs the subscription scheduler until Ctrl+C

use anyhow::{Context, Result};
use autopay_router::*;
use autopay_router::api::AutopayService;
use autopay_router::chain::{ChainAdapter, SimulatedChain, TimeoutChainAdapter};
use autopay_router::execution::{OrchestratorSettings, PaymentOrchestrator};
use autopay_router::risk::StaticBlocklist;
use autopay_router::routing::FeeScheduleVenues;
use autopay_router::scheduler::Scheduler;
use autopay_router::storage::{ExecutionJournal, InMemorySubscriptionStore, SubscriptionStore};
use autopay_router::tools::ToolRouter;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    let _logging_guard = utils::setup_logging()?;
    utils::setup_output_directories()?;

    // Load configuration
    let config = CONFIG.clone();

    info!("💸 AutoPay Router v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Tick interval: {}s", config.tick_interval_secs);
    info!("   Chain call timeout: {}ms", config.chain_call_timeout_ms);
    info!("   Max attempts per run: {}", config.max_execution_attempts);
    info!("   Retry backoff: {}s (max {}s)", config.retry_backoff_secs, config.max_retry_backoff_secs);
    info!("   Max concurrent executions: {}", config.max_concurrent_executions);
    info!("   Gas funding chain: {}", config.gas_funding_chain);
    info!("   Slippage tolerance: {} bps", config.slippage_tolerance_bps);
    info!("   Risk blocklist entries: {}", config.risk_blocklist.len());

    let adapter: Arc<dyn ChainAdapter> = if config.use_rpc_adapter {
        let rpc = network::RpcChainAdapter::new(&config).context("Failed to build RPC providers")?;
        for (chain, head) in rpc.check_connections().await {
            match head {
                Ok(block) => info!("✅ Connected to {} at block {}", chain, block),
                Err(e) => warn!("⚠️  {} unreachable at startup: {}", chain, e),
            }
        }
        info!("   Chain adapter: RPC (read-only simulation)");
        Arc::new(rpc)
    } else {
        info!(
            "   Chain adapter: simulated (seed {}, failure rate {} bps)",
            config.simulation_seed, config.simulated_failure_rate_bps
        );
        Arc::new(
            SimulatedChain::new(config.simulation_seed)
                .with_failure_rate_bps(config.simulated_failure_rate_bps),
        )
    };
    let chain: Arc<dyn ChainAdapter> = Arc::new(TimeoutChainAdapter::new(
        adapter,
        Duration::from_millis(config.chain_call_timeout_ms),
    ));

    let venues = Arc::new(FeeScheduleVenues::new());
    let signals = Arc::new(StaticBlocklist::new(config.risk_blocklist.clone()));
    let store: Arc<dyn SubscriptionStore> = Arc::new(InMemorySubscriptionStore::new());

    let service = Arc::new(AutopayService::new(
        chain.clone(),
        venues.clone(),
        signals.clone(),
        store.clone(),
        &config,
    ));
    let tools = ToolRouter::new(service.clone());
    let tool_names: Vec<String> = tools.manifest().into_iter().map(|t| t.name).collect();
    info!("🧰 Tools: {}", tool_names.join(", "));

    if config.seed_demo_subscriptions {
        api::seed_demo(&service, Utc::now())
            .await
            .context("Failed to seed demo subscriptions")?;
    }

    let mut orchestrator = PaymentOrchestrator::new(
        chain,
        venues,
        signals,
        store.clone(),
        OrchestratorSettings::from_config(&config),
    );
    if config.enable_execution_journal {
        orchestrator = orchestrator.with_journal(ExecutionJournal::new(utils::EXECUTIONS_DIR));
    }
    let orchestrator = Arc::new(orchestrator);
    let scheduler = Scheduler::new(store.clone(), orchestrator.clone(), &config);

    // Setup shutdown handler
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("\n📛 Received shutdown signal (Ctrl+C)...");
        let _ = shutdown_tx.send(());
    });

    info!("\n🚀 Starting scheduler...\n");
    let start_time = Instant::now();
    let totals = scheduler.run(shutdown_rx).await;

    for subscription in store.list().await? {
        let status = if subscription.is_active { "active" } else { "inactive" };
        info!(
            "   {} [{}] next run {} ({} consecutive failures)",
            subscription.name, status, subscription.next_run_date, subscription.consecutive_failures
        );
    }
    utils::print_session_stats(start_time, &totals, &orchestrator.recovery().snapshot().await);

    Ok(())
}
