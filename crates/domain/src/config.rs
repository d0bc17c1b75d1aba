//! Engine and runner configuration types.
//!
//! Loading (files, flags, env) belongs to the embedder; everything here
//! is serde-deserializable with defaults that work out of the box.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub identity: AgentIdentity,
    /// Emit failing results. When off they are logged and dropped;
    /// successful results are always emitted.
    #[serde(default = "d_true")]
    pub send_failed_results: bool,
    /// Clamp on the number of instants a future-runs query may request.
    #[serde(default = "d_128")]
    pub max_future_runs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity: AgentIdentity::default(),
            send_failed_results: true,
            max_future_runs: 128,
        }
    }
}

/// Identity stamped onto every `RunResult`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentIdentity {
    #[serde(default)]
    pub machine_id: String,
    #[serde(default)]
    pub customer_id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Process runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory scanned for check modules, one subdirectory per module.
    #[serde(default = "d_modules_dir")]
    pub modules_dir: PathBuf,
    /// Entry file used when a module ships no descriptor.
    #[serde(default = "d_entry")]
    pub default_entry: String,
    /// Per-stream cap on captured stdout/stderr bytes.
    #[serde(default = "d_16384")]
    pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            modules_dir: PathBuf::from("./modules"),
            default_entry: "run.sh".into(),
            max_output_bytes: 16_384,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Default value helpers (serde)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_true() -> bool {
    true
}
fn d_128() -> usize {
    128
}
fn d_modules_dir() -> PathBuf {
    PathBuf::from("./modules")
}
fn d_entry() -> String {
    "run.sh".into()
}
fn d_16384() -> usize {
    16_384
}
