//! Strict parser for the schedule grammar.
//!
//! Accepted: `PT1H`, `R2/PT1S`, `06:00:00Z/PT12H`,
//! `2018-11-14T06:00:00Z/P1M`, `/P1D`, and bracketed unions of the
//! same. Anything else is rejected with a message naming the full
//! schedule string.

use std::sync::OnceLock;

use bw_domain::{Error, Result};
use chrono::{DateTime, NaiveTime, Utc};
use regex::Regex;

use crate::spec::{Anchor, IntervalSpec, Period, PeriodUnit, RepeatBound, ScheduleSpec};

// Exactly one amount+unit per token: `P<n>[DWM]` or `PT<n>[HMS]`.
fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:P(\d+)([DWM])|PT(\d+)([HMS]))$").expect("hard-coded pattern")
    })
}

fn repeat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^R(\d+)$").expect("hard-coded pattern"))
}

fn duration_error(schedule: &str) -> Error {
    Error::ScheduleDuration {
        schedule: schedule.to_string(),
    }
}

fn start_error(schedule: &str) -> Error {
    Error::ScheduleStart {
        schedule: schedule.to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a schedule string into a [`ScheduleSpec`].
///
/// Errors always carry the full original schedule string so the
/// embedder can surface them verbatim.
pub fn parse(schedule: &str) -> Result<ScheduleSpec> {
    let trimmed = schedule.trim();
    let tokens: Vec<&str> = match trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    {
        Some(inner) => inner.split(',').map(str::trim).collect(),
        None => vec![trimmed],
    };

    let mut intervals = Vec::with_capacity(tokens.len());
    for token in tokens {
        intervals.push(parse_interval(schedule, token)?);
    }
    Ok(ScheduleSpec { intervals })
}

fn parse_interval(schedule: &str, token: &str) -> Result<IntervalSpec> {
    // `[anchor/]["R"N"/"]period`; anchors never contain `/`, so a
    // plain split is unambiguous.
    let parts: Vec<&str> = token.split('/').collect();
    let (anchor_raw, repeat_raw, period_raw) = match parts.as_slice() {
        [period] => (None, None, *period),
        [prefix, period] => {
            if repeat_re().is_match(prefix) {
                (None, Some(*prefix), *period)
            } else {
                (Some(*prefix), None, *period)
            }
        }
        [anchor, repeat, period] => (Some(*anchor), Some(*repeat), *period),
        _ => return Err(duration_error(schedule)),
    };

    let anchor = match anchor_raw {
        Some(raw) => parse_anchor(schedule, raw)?,
        None => Anchor::Registration,
    };
    let repeat = match repeat_raw {
        Some(raw) => parse_repeat(schedule, raw)?,
        None => RepeatBound::Unbounded,
    };
    let period = parse_period(schedule, period_raw)?;

    Ok(IntervalSpec {
        anchor,
        period,
        repeat,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pieces
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_anchor(schedule: &str, raw: &str) -> Result<Anchor> {
    if raw.is_empty() {
        // A leading `/` with nothing before it anchors at registration.
        return Ok(Anchor::Registration);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Anchor::Instant {
            at: at.with_timezone(&Utc),
        });
    }
    parse_time_of_day(raw).ok_or_else(|| start_error(schedule))
}

/// `06:00:00Z` or `06:00:00+02:00`: a time with a mandatory zone
/// designator.
fn parse_time_of_day(raw: &str) -> Option<Anchor> {
    if !raw.is_ascii() {
        return None;
    }
    if let Some(body) = raw.strip_suffix('Z') {
        let time = NaiveTime::parse_from_str(body, "%H:%M:%S").ok()?;
        return Some(Anchor::TimeOfDay {
            time,
            offset_secs: 0,
        });
    }
    if raw.len() <= 6 {
        return None;
    }
    let (body, off) = raw.split_at(raw.len() - 6);
    let sign = match off.as_bytes()[0] {
        b'+' => 1i32,
        b'-' => -1i32,
        _ => return None,
    };
    if off.as_bytes()[3] != b':' {
        return None;
    }
    let hh = off[1..3].parse::<u32>().ok()?;
    let mm = off[4..6].parse::<u32>().ok()?;
    if hh > 23 || mm > 59 {
        return None;
    }
    let time = NaiveTime::parse_from_str(body, "%H:%M:%S").ok()?;
    Some(Anchor::TimeOfDay {
        time,
        offset_secs: sign * (hh * 3600 + mm * 60) as i32,
    })
}

fn parse_repeat(schedule: &str, raw: &str) -> Result<RepeatBound> {
    let caps = repeat_re()
        .captures(raw)
        .ok_or_else(|| duration_error(schedule))?;
    let n: u32 = caps[1].parse().map_err(|_| duration_error(schedule))?;
    Ok(RepeatBound::Count { n })
}

fn parse_period(schedule: &str, raw: &str) -> Result<Period> {
    let caps = duration_re()
        .captures(raw)
        .ok_or_else(|| duration_error(schedule))?;

    let (digits, unit) = if let (Some(n), Some(u)) = (caps.get(1), caps.get(2)) {
        let unit = match u.as_str() {
            "D" => PeriodUnit::Days,
            "W" => PeriodUnit::Weeks,
            _ => PeriodUnit::Months,
        };
        (n.as_str(), unit)
    } else if let (Some(n), Some(u)) = (caps.get(3), caps.get(4)) {
        let unit = match u.as_str() {
            "H" => PeriodUnit::Hours,
            "M" => PeriodUnit::Minutes,
            _ => PeriodUnit::Seconds,
        };
        (n.as_str(), unit)
    } else {
        return Err(duration_error(schedule));
    };

    let amount: i64 = digits.parse().map_err(|_| duration_error(schedule))?;
    if amount < 1 {
        // A zero period would fire forever at one instant.
        return Err(duration_error(schedule));
    }
    Ok(Period { amount, unit })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(schedule: &str) -> IntervalSpec {
        let spec = parse(schedule).unwrap();
        assert_eq!(spec.intervals.len(), 1, "schedule {schedule}");
        spec.intervals[0]
    }

    #[test]
    fn bare_fixed_durations() {
        let i = single("PT1H");
        assert_eq!(i.anchor, Anchor::Registration);
        assert_eq!(i.period, Period::new(1, PeriodUnit::Hours));
        assert_eq!(i.repeat, RepeatBound::Unbounded);

        assert_eq!(single("PT10S").period, Period::new(10, PeriodUnit::Seconds));
        assert_eq!(single("PT5M").period, Period::new(5, PeriodUnit::Minutes));
        assert_eq!(single("PT12H").period, Period::new(12, PeriodUnit::Hours));
    }

    #[test]
    fn bare_calendar_durations() {
        assert_eq!(single("P1D").period, Period::new(1, PeriodUnit::Days));
        assert_eq!(single("P1W").period, Period::new(1, PeriodUnit::Weeks));
        assert_eq!(single("P1M").period, Period::new(1, PeriodUnit::Months));
        assert_eq!(single("P2M").period, Period::new(2, PeriodUnit::Months));
    }

    #[test]
    fn p_and_pt_prefixes_pick_the_unit_family() {
        // P1M is a month, PT1M is a minute.
        assert_eq!(single("P1M").period.unit, PeriodUnit::Months);
        assert_eq!(single("PT1M").period.unit, PeriodUnit::Minutes);
    }

    #[test]
    fn repeat_prefix() {
        let i = single("R2/PT1S");
        assert_eq!(i.repeat, RepeatBound::Count { n: 2 });
        assert_eq!(i.period, Period::new(1, PeriodUnit::Seconds));
        assert_eq!(single("R0/PT1H").repeat, RepeatBound::Count { n: 0 });
    }

    #[test]
    fn timestamp_anchor() {
        let i = single("2018-11-14T06:00:00Z/P1M");
        assert_eq!(
            i.anchor,
            Anchor::Instant {
                at: "2018-11-14T06:00:00Z".parse().unwrap()
            }
        );
        assert_eq!(i.period.unit, PeriodUnit::Months);
    }

    #[test]
    fn timestamp_anchor_with_offset_normalizes_to_utc() {
        let i = single("2018-11-14T08:00:00+02:00/P1D");
        assert_eq!(
            i.anchor,
            Anchor::Instant {
                at: "2018-11-14T06:00:00Z".parse().unwrap()
            }
        );
    }

    #[test]
    fn time_of_day_anchor() {
        let i = single("06:00:00Z/PT12H");
        assert_eq!(
            i.anchor,
            Anchor::TimeOfDay {
                time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                offset_secs: 0,
            }
        );
    }

    #[test]
    fn time_of_day_anchor_with_offset() {
        let i = single("06:00:00+02:00/P1D");
        assert_eq!(
            i.anchor,
            Anchor::TimeOfDay {
                time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                offset_secs: 7200,
            }
        );
        let j = single("06:00:00-05:00/P1D");
        assert_eq!(
            j.anchor,
            Anchor::TimeOfDay {
                time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                offset_secs: -18_000,
            }
        );
    }

    #[test]
    fn empty_anchor_means_registration() {
        assert_eq!(single("/P1D").anchor, Anchor::Registration);
    }

    #[test]
    fn anchor_plus_repeat_plus_period() {
        let i = single("2018-11-14T06:00:00Z/R5/P1D");
        assert!(matches!(i.anchor, Anchor::Instant { .. }));
        assert_eq!(i.repeat, RepeatBound::Count { n: 5 });
        assert_eq!(i.period, Period::new(1, PeriodUnit::Days));
    }

    #[test]
    fn bracketed_union_trims_whitespace() {
        let spec = parse("[R1/PT1S, PT1H]").unwrap();
        assert_eq!(spec.intervals.len(), 2);
        assert_eq!(spec.intervals[0].repeat, RepeatBound::Count { n: 1 });
        assert_eq!(spec.intervals[1].period, Period::new(1, PeriodUnit::Hours));
        assert_eq!(spec.intervals[1].repeat, RepeatBound::Unbounded);
    }

    #[test]
    fn bracketed_union_of_bounded_intervals() {
        let spec = parse("[R1/PT1S, R1/PT2S]").unwrap();
        assert_eq!(spec.intervals.len(), 2);
        assert_eq!(spec.intervals[1].period, Period::new(2, PeriodUnit::Seconds));
    }

    // ── Rejections ──────────────────────────────────────────────────

    fn expect_duration_error(schedule: &str) {
        let err = parse(schedule).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Could not parse duration from schedule {schedule}: \
                 did not match expected pattern"
            ),
            "schedule {schedule}"
        );
    }

    #[test]
    fn free_text_rejected() {
        expect_duration_error("not-a-real-schedule");
    }

    #[test]
    fn garbage_prefix_rejected() {
        expect_duration_error("junkPT1H");
    }

    #[test]
    fn negative_duration_rejected() {
        expect_duration_error("PT-1H");
    }

    #[test]
    fn mixed_units_rejected() {
        expect_duration_error("PT1K1M");
        expect_duration_error("PT1H30M");
    }

    #[test]
    fn wrong_prefix_for_unit_rejected() {
        // Calendar units need `P`, fixed units need `PT`.
        expect_duration_error("P1H");
        expect_duration_error("PT1D");
    }

    #[test]
    fn lowercase_rejected() {
        expect_duration_error("pt1h");
    }

    #[test]
    fn zero_period_rejected() {
        expect_duration_error("PT0S");
        expect_duration_error("P0D");
    }

    #[test]
    fn empty_and_bracket_garbage_rejected() {
        expect_duration_error("");
        expect_duration_error("[]");
        expect_duration_error("[PT1H");
        expect_duration_error("[PT1H, junk]");
    }

    #[test]
    fn too_many_segments_rejected() {
        expect_duration_error("2018-11-14T06:00:00Z/R2/PT1H/extra");
    }

    #[test]
    fn bad_anchor_reports_start_time() {
        let err = parse("99:99:99Z/PT1H").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not parse start time from schedule 99:99:99Z/PT1H: \
             did not match expected pattern"
        );
    }

    #[test]
    fn dateless_zoneless_anchor_rejected() {
        let err = parse("2018-11-14T06:00:00/P1D").unwrap_err();
        assert!(matches!(err, Error::ScheduleStart { .. }));
    }
}
