//! Display and printing utilities

use std::collections::HashMap;
use std::time::Instant;
use tracing::{error, info, warn};
use crate::scheduler::TickReport;
use crate::types::{ExecutionRecord, ExecutionStatus};

pub fn print_session_stats(start_time: Instant, report: &TickReport, error_counts: &HashMap<&'static str, u32>) {
    let runtime = start_time.elapsed().as_secs() / 60;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   ⏱️  SCHEDULER:");
    info!("     Ticks: {}", report.ticks);
    info!("     Due subscriptions seen: {}", report.due);
    info!("     Dispatched: {}", report.dispatched);
    info!("     Skipped (already in flight): {}", report.skipped_in_flight);

    info!("   💸 EXECUTIONS:");
    info!("     Succeeded: {}", report.succeeded);
    info!("     Awaiting retry: {}", report.retrying);
    info!("     Failed terminally: {}", report.failed);
    info!("     Success rate: {:.1}%",
        if report.completed() > 0 {
            (report.succeeded as f64 / report.completed() as f64) * 100.0
        } else {
            0.0
        }
    );

    if !error_counts.is_empty() || !report.errors.is_empty() {
        info!("     Error summary:");
        for (error_type, count) in error_counts.iter() {
            info!("       {}: {}", error_type, count);
        }
        for (error_type, count) in report.errors.iter() {
            info!("       {}: {}", error_type, count);
        }
    }

    info!("");
}

pub fn print_execution_record(record: &ExecutionRecord) {
    match record.status {
        ExecutionStatus::Success => {
            warn!("\n✅ PAYMENT EXECUTED #{}", record.id);
            warn!("📍 Subscription: {}", record.subscription_id);
            warn!("💰 Execution Details:");
            warn!("   Scheduled for: {}", record.scheduled_for);
            warn!("   Delivered: {}", record.output_amount.unwrap_or_default());
            warn!("   Gas cost: ${:.4}", record.gas_cost_usd);
            warn!("   Fallback used: {}", record.fallback_used);
            warn!("   Attempts: {}", record.attempts);
            for (index, step) in record.steps.iter().enumerate() {
                warn!("   {}. {} ({} → {})", index + 1, step.label(), step.amount_in(), step.amount_out());
            }
        }
        ExecutionStatus::Failed => {
            error!("\n❌ PAYMENT FAILED #{}", record.id);
            error!("   Subscription: {}", record.subscription_id);
            error!("   {}", record.status_line());
            if !record.steps.is_empty() {
                error!("   Settled before failure: {} step(s)", record.steps.len());
            }
        }
    }
}
