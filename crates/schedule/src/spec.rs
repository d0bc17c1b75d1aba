//! Parsed schedule model.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Periods
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Unit of a schedule period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
}

impl PeriodUnit {
    /// Day/week/month advance by calendar rules, not a fixed number of
    /// seconds.
    pub fn is_calendar(self) -> bool {
        matches!(self, PeriodUnit::Days | PeriodUnit::Weeks | PeriodUnit::Months)
    }
}

/// Amount plus unit: `PT12H` is 12 hours, `P1M` is one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub amount: i64,
    pub unit: PeriodUnit,
}

impl Period {
    pub fn new(amount: i64, unit: PeriodUnit) -> Self {
        Self { amount, unit }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Anchors and repeat bounds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where an interval's recurrence is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Anchor {
    /// The instant the task is registered.
    Registration,
    /// Bare time-of-day; combined with "today" relative to the reference
    /// instant, in the offset the schedule named (`Z` gives 0).
    TimeOfDay { time: NaiveTime, offset_secs: i32 },
    /// Full timestamp, used literally.
    Instant { at: DateTime<Utc> },
}

/// How many times an interval fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepeatBound {
    Unbounded,
    /// `R<n>`: n additional recurrences beyond the first, n+1 firings
    /// total (`R0` fires once and stops).
    Count { n: u32 },
}

impl RepeatBound {
    /// Total number of firings, `None` when unbounded.
    pub fn total_firings(self) -> Option<u64> {
        match self {
            RepeatBound::Unbounded => None,
            RepeatBound::Count { n } => Some(u64::from(n) + 1),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schedule spec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One recurrence rule: anchor + period + repeat bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSpec {
    pub anchor: Anchor,
    pub period: Period,
    pub repeat: RepeatBound,
}

/// Ordered union of intervals parsed from one schedule string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub intervals: Vec<IntervalSpec>,
}
