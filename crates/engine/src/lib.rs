//! Task calendar and execution engine.
//!
//! The engine takes a set of task definitions, projects their schedules
//! into fire instants, runs the bound check module at most once at a
//! time per task, and streams results, events, schedule errors, and a
//! telemetry counter back to the embedder.
//!
//! Transport, process sandboxing, and metric shipping stay outside:
//! modules run behind [`bw_runner::ModuleRunner`], metrics behind
//! [`MetricSink`], and output is drained from [`OutputStreams`].

pub mod calendar;
pub mod dispatcher;
pub mod engine;
pub mod gate;
pub mod sinks;
pub mod telemetry;

pub use engine::Engine;
pub use sinks::OutputStreams;
pub use telemetry::{ChannelMetrics, MetricSink};
