//! Schedule grammar and future-run projection.
//!
//! A schedule string is one interval token or a bracketed union of
//! tokens (`[R1/PT1S, PT1H]`). Each token is `[anchor/]["R"N"/"]period`.
//! `parse` turns the string into a [`ScheduleSpec`]; `future_runs`
//! projects the spec into absolute fire instants without side effects.

pub mod parse;
pub mod project;
pub mod spec;

pub use parse::parse;
pub use project::{future_runs, interval_runs, IntervalRuns};
pub use spec::{Anchor, IntervalSpec, Period, PeriodUnit, RepeatBound, ScheduleSpec};
