//! Subscription types and cadence arithmetic

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use super::{Chain, RoutePlan, RouteStep, StepKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    /// One period after `from`. Monthly clamps to the end of shorter months.
    pub fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Daily => from + Duration::days(1),
            Cadence::Weekly => from + Duration::weeks(1),
            Cadence::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or(from + Duration::days(30)),
        }
    }

    /// First occurrence strictly after `now`, stepping from the scheduled
    /// time so completion latency never shifts the schedule.
    pub fn next_after(&self, scheduled: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut next = self.advance(scheduled);
        while next <= now {
            next = self.advance(next);
        }
        next
    }

    /// Rough number of runs per month, used for volume summaries.
    pub fn runs_per_month(&self) -> u32 {
        match self {
            Cadence::Daily => 30,
            Cadence::Weekly => 4,
            Cadence::Monthly => 1,
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        })
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            other => Err(format!("unsupported frequency '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Payer wallet; gas is checked against this address.
    pub owner: String,
    pub token_symbol: String,
    pub token_address: String,
    pub amount: Decimal,
    pub receiver_address: String,
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub cadence: Cadence,
    pub next_run_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub pending: Option<PendingRun>,
}

impl Subscription {
    /// Due when active and either the schedule has arrived or a retry
    /// backoff has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match &self.pending {
            Some(pending) => pending.retry_not_before <= now,
            None => self.next_run_date <= now,
        }
    }

    pub fn attempts_so_far(&self) -> u32 {
        self.pending.as_ref().map(|p| p.attempts).unwrap_or(0)
    }

    /// The run this execution belongs to.
    pub fn scheduled_for(&self) -> DateTime<Utc> {
        self.pending
            .as_ref()
            .map(|p| p.scheduled_for)
            .unwrap_or(self.next_run_date)
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub token_symbol: String,
    pub token_address: String,
    pub amount: Decimal,
    pub receiver_address: String,
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub cadence: Cadence,
    pub next_run_date: DateTime<Utc>,
}

/// A scheduled run that failed transiently and is waiting for its next attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRun {
    pub scheduled_for: DateTime<Utc>,
    pub attempts: u32,
    pub retry_not_before: DateTime<Utc>,
    pub fallback_used: bool,
    pub last_error: String,
    /// Steps already settled for this run, kept for the final record.
    #[serde(default)]
    pub settled: Vec<RouteStep>,
    pub resume: Option<ResumePoint>,
}

/// Where an interrupted route picks up; settled steps are never replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePoint {
    pub plan: RoutePlan,
    /// Steps currently being followed (primary or a fallback's).
    pub route: Vec<RouteStep>,
    pub next_index: usize,
    pub running_amount: Decimal,
}

impl ResumePoint {
    /// True once a swap or bridge has settled: the funds have moved and the
    /// route must continue from `next_index` rather than be re-planned.
    pub fn has_moved_value(&self) -> bool {
        self.route
            .iter()
            .take(self.next_index)
            .any(|s| matches!(s.kind(), StepKind::Swap | StepKind::Bridge))
    }
}
