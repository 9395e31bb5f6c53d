//! Plain-text rendering of tool results

use rust_decimal::Decimal;
use std::fmt::Write;
use crate::types::{
    ExecutionStatus, GasEnsureResponse, RiskAssessment, RiskLevel, RouteQuoteResponse, RouteStep, Subscription,
    SubscriptionSummary,
};

/// `0x742d...beb1` style short form.
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

pub fn subscription_created(subscription: &Subscription) -> String {
    format!(
        "✅ Subscription \"{}\" created successfully!\n\n\
         📋 Details:\n\
         • ID: {}\n\
         • Amount: {} {}\n\
         • Route: {} → {}\n\
         • Frequency: {}\n\
         • Next payment: {}\n\
         • Receiver: {}",
        subscription.name,
        subscription.id,
        subscription.amount,
        subscription.token_symbol,
        subscription.from_chain,
        subscription.to_chain,
        subscription.cadence,
        subscription.next_run_date.format("%Y-%m-%d %H:%M UTC"),
        short_address(&subscription.receiver_address),
    )
}

pub fn subscription_list(summaries: &[SubscriptionSummary]) -> String {
    if summaries.is_empty() {
        return "📋 No subscriptions found.\n\nCreate one with the \"subscription.create\" tool.".to_string();
    }

    let active: Vec<&Subscription> = summaries
        .iter()
        .map(|s| &s.subscription)
        .filter(|s| s.is_active)
        .collect();
    let monthly_volume: Decimal = active
        .iter()
        .map(|s| s.amount * Decimal::from(s.cadence.runs_per_month()))
        .sum();

    let mut out = String::new();
    let _ = writeln!(out, "📊 Subscription Overview\n");
    let _ = writeln!(out, "• Active subscriptions: {}/{}", active.len(), summaries.len());
    let _ = writeln!(out, "• Estimated monthly volume: {:.2}\n", monthly_volume.round_dp(2));

    for (index, summary) in summaries.iter().enumerate() {
        let sub = &summary.subscription;
        let status = if sub.is_active { "🟢 Active" } else { "⏸️ Paused" };
        let last = match &summary.last_execution {
            Some(record) if record.status == ExecutionStatus::Success => "✅",
            Some(_) => "❌",
            None => "⚪",
        };
        let _ = writeln!(out, "{}. {} {}", index + 1, sub.name, status);
        let _ = writeln!(out, "   • Amount: {} {}", sub.amount, sub.token_symbol);
        let _ = writeln!(out, "   • Route: {} → {}", sub.from_chain, sub.to_chain);
        let _ = writeln!(out, "   • Frequency: {}", sub.cadence);
        let _ = writeln!(out, "   • Next run: {}", sub.next_run_date.format("%Y-%m-%d"));
        let _ = writeln!(out, "   • Last execution: {}", last);
        let _ = writeln!(out, "   • ID: {}\n", sub.id);
    }
    out.trim_end().to_string()
}

pub fn subscription_cancelled(subscription: &Subscription) -> String {
    format!(
        "✅ Subscription \"{}\" has been cancelled.\n\nNo further payments will be processed.",
        subscription.name
    )
}

fn step_line(step: &RouteStep) -> String {
    match step {
        RouteStep::Approve { token, venue, amount_in, .. } => {
            format!("Approve {} {} for {}", amount_in, token, venue)
        }
        RouteStep::Swap { venue, token_in, token_out, amount_in, amount_out, .. } => {
            format!("Swap {} {} → {} {} via {}", amount_in, token_in, amount_out, token_out, venue)
        }
        RouteStep::Bridge { chain, to_chain, venue, token, amount_in, amount_out, .. } => format!(
            "Bridge {} {} {} → {} via {} (receive {})",
            amount_in, token, chain, to_chain, venue, amount_out
        ),
        RouteStep::Transfer { chain, token, to, amount_out, .. } => {
            format!("Transfer {} {} to {} on {}", amount_out, token, short_address(to), chain)
        }
    }
}

pub fn route_quote(quote: &RouteQuoteResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "🛣️ Route: {} {} ({}) → {} ({})\n",
        quote.amount_in, quote.token_in, quote.from_chain, quote.token_out, quote.to_chain
    );
    let _ = writeln!(out, "Steps:");
    for (index, step) in quote.steps.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", index + 1, step_line(step));
    }
    let _ = writeln!(out, "\n⛽ Estimated gas: ${}", quote.gas_estimate_usd);
    let _ = writeln!(out, "📉 Slippage: {}", quote.risk.slippage);
    for flag in &quote.risk.flags {
        let _ = writeln!(out, "⚠️ {}", flag);
    }
    if !quote.fallback_routes.is_empty() {
        let _ = writeln!(out, "\nFallbacks:");
        for fallback in &quote.fallback_routes {
            let _ = writeln!(out, "• {} → {}", fallback.via, fallback.expected_output);
        }
    }
    out.trim_end().to_string()
}

pub fn gas_check(chain: &str, gas: &GasEnsureResponse) -> String {
    let mut out = format!(
        "⛽ Gas on {}: balance ${}, required ${}",
        chain, gas.current_balance_usd, gas.required_usd
    );
    if !gas.needed {
        out.push_str("\n✅ Sufficient gas, no top-up needed.");
        return out;
    }
    match &gas.top_up_steps {
        Some(steps) => {
            out.push_str("\n⚠️ Top-up needed:");
            for (index, step) in steps.iter().enumerate() {
                let _ = write!(out, "\n{}. {}", index + 1, step_line(step));
            }
        }
        None => out.push_str("\n⚠️ Top-up needed but no funding route is available."),
    }
    out
}

pub fn risk_assessment(assessment: &RiskAssessment) -> String {
    let icon = match assessment.risk_level {
        RiskLevel::Low => "🟢",
        RiskLevel::Medium => "🟡",
        RiskLevel::High => "🔴",
    };
    let mut out = format!(
        "{} Risk level: {} (confidence {:.2})",
        icon, assessment.risk_level, assessment.confidence
    );
    if !assessment.flags.is_empty() {
        out.push_str("\n\nFlags:");
        for flag in &assessment.flags {
            let _ = write!(out, "\n• {}", flag);
        }
    }
    if !assessment.recommendations.is_empty() {
        out.push_str("\n\nRecommendations:");
        for recommendation in &assessment.recommendations {
            let _ = write!(out, "\n• {}", recommendation);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_shortened() {
        assert_eq!(short_address("0x742d35cc6634c0532925a3b844bc9e7595f0beb1"), "0x742d...beb1");
        assert_eq!(short_address("0x1234"), "0x1234");
    }

    #[test]
    fn risk_text_lists_flags() {
        let text = risk_assessment(&RiskAssessment {
            risk_level: RiskLevel::High,
            flags: vec!["Suspicious receiver address pattern".to_string()],
            recommendations: vec!["Reject this transfer".to_string()],
            confidence: 0.95,
            degraded: false,
            awaiting_chain_facts: false,
        });
        assert!(text.starts_with("🔴 Risk level: high (confidence 0.95)"));
        assert!(text.contains("• Suspicious receiver address pattern"));
    }
}
