//! Check task definitions as submitted by the embedder.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One key/value parameter for a check module.
///
/// Parameters are ordered: the process runner passes the values to the
/// module as positional arguments in declaration order, and exports the
/// pairs as `key=value` environment entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParam {
    pub key: String,
    pub value: String,
}

impl TaskParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task definition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named check task bound to a module and a raw schedule string.
///
/// Immutable once accepted by the calendar; changing a task means
/// submitting a whole new task set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique within one submitted task set. Reuse across task sets is fine.
    pub id: u64,
    pub name: String,
    /// Check module identifier, resolved by the module runner's registry.
    pub module: String,
    /// Raw schedule string, e.g. `PT1H` or `[R1/PT1S, PT1H]`.
    pub schedule: String,
    /// Disabled tasks are accepted but never scheduled.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Ordered key/value pairs handed to the module.
    #[serde(default)]
    pub params: Vec<TaskParam>,
}

impl TaskDefinition {
    pub fn new(
        id: u64,
        name: impl Into<String>,
        module: impl Into<String>,
        schedule: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            module: module.into(),
            schedule: schedule.into(),
            enabled: true,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(TaskParam::new(key, value));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Parameter values in declaration order (the module's argv).
    pub fn param_values(&self) -> Vec<String> {
        self.params.iter().map(|p| p.value.clone()).collect()
    }
}

fn d_true() -> bool {
    true
}
