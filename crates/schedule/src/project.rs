//! Future-run projection.
//!
//! Turns a parsed schedule into ordered fire instants. Pure: nothing
//! here arms a timer or touches live scheduler state, so the same code
//! backs both the live calendar and the read-only "what runs next"
//! query.

use chrono::{DateTime, Datelike, Days, Months, TimeDelta, Utc};

use crate::spec::{Anchor, IntervalSpec, Period, PeriodUnit, ScheduleSpec};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-interval candidate stream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lazy candidate stream for one interval: the anchor advanced by `k`
/// whole periods, bounded by the interval's repeat count.
///
/// Every candidate is computed from the anchor, not from the previous
/// candidate, so calendar periods never accumulate clamp drift (a
/// monthly anchor on the 31st shortens to Feb 28 and returns to
/// Mar 31).
#[derive(Debug, Clone)]
pub struct IntervalRuns {
    anchor: DateTime<Utc>,
    period: Period,
    k: u64,
    limit: Option<u64>,
}

/// Candidate stream for `interval`, with relative anchors resolved
/// against `registered_at`.
pub fn interval_runs(interval: &IntervalSpec, registered_at: DateTime<Utc>) -> IntervalRuns {
    IntervalRuns {
        anchor: resolve_anchor(&interval.anchor, registered_at),
        period: interval.period,
        k: 0,
        limit: interval.repeat.total_firings(),
    }
}

impl IntervalRuns {
    /// Next candidate without consuming it. `None` once the repeat
    /// bound or the representable calendar range is exhausted.
    pub fn peek(&self) -> Option<DateTime<Utc>> {
        if self.limit.is_some_and(|limit| self.k >= limit) {
            return None;
        }
        self.candidate(self.k)
    }

    pub fn pop(&mut self) -> Option<DateTime<Utc>> {
        let next = self.peek()?;
        self.k += 1;
        Some(next)
    }

    /// Skip every candidate strictly before `from`. Skipped candidates
    /// still count against the repeat bound.
    pub fn seek_at_or_after(&mut self, from: DateTime<Utc>) {
        self.fast_forward(from);
        while let Some(at) = self.peek() {
            if at >= from {
                break;
            }
            self.k += 1;
        }
    }

    /// Skip every candidate at or before `from`. Used when arming live
    /// timers: the instant of registration itself belongs to the
    /// immediate run, not to the interval.
    pub fn seek_after(&mut self, from: DateTime<Utc>) {
        self.seek_at_or_after(from);
        while let Some(at) = self.peek() {
            if at > from {
                break;
            }
            self.k += 1;
        }
    }

    /// Closed-form jump to just below `from`, leaving the settle loop
    /// in [`Self::seek_at_or_after`] at most a couple of steps. The
    /// estimate under-shoots on purpose.
    fn fast_forward(&mut self, from: DateTime<Utc>) {
        if from <= self.anchor {
            return;
        }
        let steps = match self.period.unit {
            PeriodUnit::Months => {
                let months = (i64::from(from.year()) - i64::from(self.anchor.year())) * 12
                    + (i64::from(from.month()) - i64::from(self.anchor.month()));
                months / self.period.amount
            }
            _ => match step_seconds(self.period) {
                Some(step) => (from - self.anchor).num_seconds() / step,
                None => return,
            },
        };
        let jump = (steps - 1).max(0) as u64;
        if jump > self.k {
            self.k = jump;
        }
    }

    fn candidate(&self, k: u64) -> Option<DateTime<Utc>> {
        match self.period.unit {
            PeriodUnit::Seconds | PeriodUnit::Minutes | PeriodUnit::Hours => {
                let step = step_seconds(self.period)?;
                let total = step.checked_mul(i64::try_from(k).ok()?)?;
                self.anchor.checked_add_signed(TimeDelta::try_seconds(total)?)
            }
            PeriodUnit::Days => {
                let days = (self.period.amount as u64).checked_mul(k)?;
                self.anchor.checked_add_days(Days::new(days))
            }
            PeriodUnit::Weeks => {
                let days = (self.period.amount as u64).checked_mul(k)?.checked_mul(7)?;
                self.anchor.checked_add_days(Days::new(days))
            }
            PeriodUnit::Months => {
                let months = (self.period.amount as u64).checked_mul(k)?;
                self.anchor
                    .checked_add_months(Months::new(u32::try_from(months).ok()?))
            }
        }
    }
}

impl Iterator for IntervalRuns {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }
}

fn step_seconds(period: Period) -> Option<i64> {
    let unit = match period.unit {
        PeriodUnit::Seconds => 1,
        PeriodUnit::Minutes => 60,
        PeriodUnit::Hours => 3_600,
        PeriodUnit::Days => 86_400,
        PeriodUnit::Weeks => 604_800,
        PeriodUnit::Months => return None,
    };
    period.amount.checked_mul(unit)
}

fn resolve_anchor(anchor: &Anchor, reference: DateTime<Utc>) -> DateTime<Utc> {
    match anchor {
        Anchor::Registration => reference,
        Anchor::Instant { at } => *at,
        Anchor::TimeOfDay { time, offset_secs } => {
            // "Today" is the reference date as seen in the anchor's
            // own zone; the stream seeks forward from there.
            let shift = TimeDelta::seconds(i64::from(*offset_secs));
            let local_day = reference
                .naive_utc()
                .checked_add_signed(shift)
                .unwrap_or_else(|| reference.naive_utc())
                .date();
            let wall = local_day.and_time(*time);
            let naive = wall.checked_sub_signed(shift).unwrap_or(wall);
            DateTime::from_naive_utc_and_offset(naive, Utc)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Merged projection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// First `count` fire instants at or after `from`, merged across the
/// schedule's intervals in time order. Instants projected by more than
/// one interval appear once.
pub fn future_runs(spec: &ScheduleSpec, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    let mut streams: Vec<IntervalRuns> = spec
        .intervals
        .iter()
        .map(|interval| {
            let mut runs = interval_runs(interval, from);
            runs.seek_at_or_after(from);
            runs
        })
        .collect();

    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let Some(next) = streams.iter().filter_map(IntervalRuns::peek).min() else {
            break;
        };
        for stream in &mut streams {
            if stream.peek() == Some(next) {
                stream.pop();
            }
        }
        out.push(next);
    }
    out
}
