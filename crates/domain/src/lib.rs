//! Shared domain types for benchwarden: task definitions, run output
//! records, configuration, and the crate-wide error type.

pub mod config;
pub mod error;
pub mod report;
pub mod task;

pub use config::{AgentIdentity, EngineConfig, RunnerConfig};
pub use error::{Error, Result};
pub use report::{Metric, RunEvent, RunResult, ScheduleError};
pub use task::{TaskDefinition, TaskParam};
