//! Output records streamed back to the embedder: run results, run
//! events, schedule errors, and telemetry counters.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AgentIdentity;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RunResult
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of one module run.
///
/// Exactly one of `ext_result` / `failure_details` is set. The agent
/// identity is stamped on by the engine so downstream consumers can
/// attribute results without extra context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub task_name: String,
    pub task_id: u64,
    pub success: bool,
    /// Module report with `id`/`taskName` merged in; absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext_result: Option<serde_json::Value>,
    /// Stable, greppable failure description; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_details: Option<String>,
    #[serde(default)]
    pub machine_id: String,
    #[serde(default)]
    pub customer_id: String,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn success(task_id: u64, task_name: impl Into<String>, ext_result: serde_json::Value) -> Self {
        Self {
            task_name: task_name.into(),
            task_id,
            success: true,
            ext_result: Some(ext_result),
            failure_details: None,
            machine_id: String::new(),
            customer_id: String::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn failure(task_id: u64, task_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            task_id,
            success: false,
            ext_result: None,
            failure_details: Some(details.into()),
            machine_id: String::new(),
            customer_id: String::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn stamped(mut self, identity: &AgentIdentity) -> Self {
        self.machine_id = identity.machine_id.clone();
        self.customer_id = identity.customer_id.clone();
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RunEvent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Human-facing record of one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub task_name: String,
    /// Container or host the finding came from; the module name when the
    /// module does not say.
    pub source_id: String,
    pub output: String,
    /// Named fields echoing the summary (task name plus parameters).
    #[serde(default)]
    pub output_fields: BTreeMap<String, String>,
}

impl RunEvent {
    pub fn new(
        task_name: impl Into<String>,
        source_id: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            source_id: source_id.into(),
            output: output.into(),
            output_fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.output_fields.insert(key.into(), value.into());
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ScheduleError
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Emitted instead of a `RunResult` when a task could not be scheduled
/// at all (bad schedule string, unknown module, duplicate id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleError {
    pub task_name: String,
    pub message: String,
}

impl ScheduleError {
    pub fn new(task_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            message: message.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Metric
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One telemetry counter. `Display` renders the statsd-style gauge line
/// (`name:value|g`); the transport lives behind the telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: u64,
}

impl Metric {
    /// The per-run pass counter, named deterministically from the task.
    pub fn tests_pass(task_name: &str, value: u64) -> Self {
        Self {
            name: format!("compliance.{task_name}.tests_pass"),
            value,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}|g", self.name, self.value)
    }
}
